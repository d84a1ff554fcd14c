//! Shared mock-backed fixtures for render graph and renderer tests.

use std::sync::{Arc, Mutex};
use crate::graphics_device::mock_graphics_device::{MockCommandList, MockGraphicsDevice, MockPipeline};
use crate::graphics_device::{
    BindingKind, BindingLayout, BindingLayoutDesc, GraphicsDevice, IndexType, Pipeline, ShaderStageFlags,
    VertexLayout,
};
use crate::resource::{ConstantBuffer, ConstantBufferDesc, MeshCollection, MeshCollectionDesc, SubmeshDesc};

/// Mock device shared both as itself and as the trait object
pub struct Fixture {
    pub mock: Arc<Mutex<MockGraphicsDevice>>,
    pub device: Arc<Mutex<dyn GraphicsDevice>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_device(MockGraphicsDevice::new())
    }

    pub fn with_device(device: MockGraphicsDevice) -> Self {
        let mock = Arc::new(Mutex::new(device));
        let device: Arc<Mutex<dyn GraphicsDevice>> = mock.clone();
        Self { mock, device }
    }

    /// Slot 0: constants, slot 1: storage, slot 2: constants
    pub fn layout(&self) -> Arc<dyn BindingLayout> {
        self.device
            .lock()
            .unwrap()
            .create_binding_layout(
                BindingLayoutDesc::default()
                    .with_slot(0, BindingKind::Constants, ShaderStageFlags::ALL)
                    .with_slot(1, BindingKind::Storage, ShaderStageFlags::ALL)
                    .with_slot(2, BindingKind::Constants, ShaderStageFlags::VERTEX_FRAGMENT),
            )
            .unwrap()
    }

    /// Indexed collection: "sphere" (index 0..36, base 0) and "box" (36..60, base 8)
    pub fn mesh(&self, name: &str) -> Arc<MeshCollection> {
        let submeshes = vec![
            SubmeshDesc { name: "sphere".to_string(), base_vertex: 0, vertex_count: 8, first_index: 0, index_count: 36 },
            SubmeshDesc { name: "box".to_string(), base_vertex: 8, vertex_count: 8, first_index: 36, index_count: 24 },
        ];
        Arc::new(
            MeshCollection::new(MeshCollectionDesc {
                name: name.to_string(),
                device: Arc::clone(&self.device),
                vertex_data: vec![0u8; 16 * 12],
                vertex_layout: VertexLayout::position_only(),
                index_data: Some(vec![0u8; 60 * 2]),
                index_type: IndexType::U16,
                submeshes,
            })
            .unwrap(),
        )
    }

    /// Non-indexed collection with a single 6-vertex "quad"
    pub fn quad_mesh(&self) -> Arc<MeshCollection> {
        Arc::new(
            MeshCollection::new(MeshCollectionDesc {
                name: "quad".to_string(),
                device: Arc::clone(&self.device),
                vertex_data: vec![0u8; 6 * 12],
                vertex_layout: VertexLayout::position_only(),
                index_data: None,
                index_type: IndexType::U16,
                submeshes: vec![SubmeshDesc {
                    name: "quad".to_string(),
                    base_vertex: 0,
                    vertex_count: 6,
                    first_index: 0,
                    index_count: 0,
                }],
            })
            .unwrap(),
        )
    }

    pub fn constants<T: bytemuck::Pod>(&self, name: &str, capacity: u32) -> Arc<ConstantBuffer<T>> {
        self.constants_of_kind(name, capacity, BindingKind::Constants)
    }

    pub fn constants_of_kind<T: bytemuck::Pod>(&self, name: &str, capacity: u32, kind: BindingKind) -> Arc<ConstantBuffer<T>> {
        Arc::new(
            ConstantBuffer::new(ConstantBufferDesc {
                name: name.to_string(),
                device: Arc::clone(&self.device),
                capacity,
                frames_in_flight: 3,
                kind,
            })
            .unwrap(),
        )
    }
}

pub fn graphics_pipeline(name: &str) -> Arc<dyn Pipeline> {
    Arc::new(MockPipeline::graphics(name))
}

pub fn compute_pipeline(name: &str) -> Arc<dyn Pipeline> {
    Arc::new(MockPipeline::compute(name))
}

/// Command list already between `begin` and `end`
pub fn recording() -> MockCommandList {
    let mut cmd = MockCommandList::new();
    crate::graphics_device::CommandList::begin(&mut cmd).unwrap();
    cmd
}
