//! Particle view: the standard render graph for a particle simulation.
//!
//! ```text
//! pass "scene"          camera constants at slot 0
//! ├── "particles"       instanced spheres, instances at slot 1
//! ├── "selection"       selected spheres, writes stencil = 1, no color
//! ├── "outline"         enlarged selected spheres where stencil != 1
//! └── "box"             simulation box edges, line list
//! ```
//!
//! The simulation and the camera stay owned by the application. Update
//! callbacks hold shared handles to them and only read.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::error::Result;
use crate::graphics_device::{
    BindingKind, BindingLayout, BindingLayoutDesc, ColorBlendState, CullMode, DepthStencilState, Pipeline,
    PipelineDesc, PrimitiveTopology, RasterizationState, Shader, ShaderStageFlags, TopologyClass, VertexLayout,
};
use crate::render_graph::{Binding, ItemId, LayerId, PassId, RenderItem, RenderLayer, RenderPass};
use crate::renderer::Renderer;
use crate::resource::{box_edges, build_collection, uv_sphere, MeshCollection};
use crate::engine_err;
use super::camera::{Camera, CameraConstants};

pub const CAMERA_SLOT: u32 = 0;
pub const INSTANCE_SLOT: u32 = 1;
pub const STYLE_SLOT: u32 = 2;

/// Stencil value written under selected particles
pub const SELECTION_STENCIL: u32 = 1;

const SPHERE_SUBMESH: &str = "sphere";
const BOX_SUBMESH: &str = "box";

// ============================================================================
// DATA
// ============================================================================

/// One particle as read by the sphere vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 4],
}

/// Outline appearance
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OutlineStyle {
    pub color: [f32; 4],
    /// Radius multiplier of the outline shell
    pub scale: f32,
    pub _pad: [f32; 3],
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self { color: [1.0, 0.8, 0.1, 1.0], scale: 1.15, _pad: [0.0; 3] }
    }
}

/// Simulation state the view reads every frame
#[derive(Debug, Clone, Default)]
pub struct ParticleState {
    pub particles: Vec<ParticleInstance>,
    /// Indices into `particles`
    pub selected: Vec<usize>,
    pub outline: OutlineStyle,
}

impl ParticleState {
    /// Selected particles, skipping indices past the end of `particles`
    pub fn selected_instances(&self) -> Vec<ParticleInstance> {
        self.selected.iter().filter_map(|&index| self.particles.get(index).copied()).collect()
    }

    pub fn valid_selection_count(&self) -> usize {
        self.selected.iter().filter(|&&index| index < self.particles.len()).count()
    }
}

/// Shader modules used by the view's pipelines
pub struct ParticleShaders {
    /// Instanced sphere vertex shader (position + normal, instances at slot 1)
    pub sphere_vertex: Arc<dyn Shader>,
    pub sphere_fragment: Arc<dyn Shader>,
    /// Sphere vertex shader scaling radii by the outline style
    pub outline_vertex: Arc<dyn Shader>,
    /// Solid color from the outline style
    pub flat_fragment: Arc<dyn Shader>,
    pub line_vertex: Arc<dyn Shader>,
}

#[derive(Debug, Clone)]
pub struct ParticleViewDesc {
    /// Instance capacity of the particle and selection layers
    pub max_particles: u32,
    pub sphere_stacks: u32,
    pub sphere_slices: u32,
    pub box_half_extent: Vec3,
}

impl Default for ParticleViewDesc {
    fn default() -> Self {
        Self {
            max_particles: 4096,
            sphere_stacks: 12,
            sphere_slices: 24,
            box_half_extent: Vec3::splat(10.0),
        }
    }
}

// ============================================================================
// PARTICLE VIEW
// ============================================================================

pub struct ParticleView {
    desc: ParticleViewDesc,
    pass: PassId,
    particles_layer: LayerId,
    spheres: ItemId,
    selection_layer: LayerId,
    selected: ItemId,
    outline_layer: LayerId,
    outlined: ItemId,
    box_layer: LayerId,
    state: Arc<RwLock<ParticleState>>,
    /// Instance counts last set on the sphere and selection items
    particle_count: Arc<AtomicU32>,
    selection_count: Arc<AtomicU32>,
}

impl ParticleView {
    /// Create pipelines, buffers and meshes and add the "scene" pass to the renderer's graph
    pub fn build(
        renderer: &mut Renderer,
        shaders: &ParticleShaders,
        desc: ParticleViewDesc,
        camera: Arc<RwLock<Camera>>,
        state: Arc<RwLock<ParticleState>>,
    ) -> Result<Self> {
        let mesh = Arc::new(primitive_mesh(renderer, &desc, desc.box_half_extent)?);
        let layout = create_layout(renderer)?;
        let pipelines = create_pipelines(renderer, shaders, &layout)?;

        let camera_buffer = renderer.create_constant_buffer::<CameraConstants>("camera", 1, BindingKind::Constants)?;
        let instances = renderer.create_constant_buffer::<ParticleInstance>(
            "particle_instances",
            desc.max_particles,
            BindingKind::Storage,
        )?;
        let selected_instances = renderer.create_constant_buffer::<ParticleInstance>(
            "selected_instances",
            desc.max_particles,
            BindingKind::Storage,
        )?;
        let style = renderer.create_constant_buffer::<OutlineStyle>("outline_style", 1, BindingKind::Constants)?;

        let sphere = submesh_index(&mesh, SPHERE_SUBMESH)?;
        let box_edges = submesh_index(&mesh, BOX_SUBMESH)?;

        let camera_binding = Binding::constants_with_update("camera", CAMERA_SLOT, camera_buffer, move |writer, time| {
            let camera = camera
                .read()
                .map_err(|_| engine_err!("atomview::ParticleView", "Camera lock poisoned"))?;
            writer.write_one(&camera.constants(time))
        });

        let particle_count = Arc::new(AtomicU32::new(0));
        let selection_count = Arc::new(AtomicU32::new(0));

        // Instances past what the state provides are zeroed up to the drawn count
        let particle_state = Arc::clone(&state);
        let drawn = Arc::clone(&particle_count);
        let instance_binding =
            Binding::constants_with_update("instances", INSTANCE_SLOT, instances, move |writer, _| {
                let state = particle_state
                    .read()
                    .map_err(|_| engine_err!("atomview::ParticleView", "Particle state lock poisoned"))?;
                let written = state.particles.len().min(writer.capacity() as usize);
                writer.write(&state.particles[..written])?;
                writer.zero_range(written as u32, drawn.load(Ordering::Acquire))
            });

        let selection_state = Arc::clone(&state);
        let drawn = Arc::clone(&selection_count);
        let selection_binding = Binding::constants_with_update(
            "selected_instances",
            INSTANCE_SLOT,
            Arc::clone(&selected_instances),
            move |writer, _| {
                let state = selection_state
                    .read()
                    .map_err(|_| engine_err!("atomview::ParticleView", "Particle state lock poisoned"))?;
                let mut selected = state.selected_instances();
                selected.truncate(writer.capacity() as usize);
                writer.write(&selected)?;
                writer.zero_range(selected.len() as u32, drawn.load(Ordering::Acquire))
            },
        );

        let style_state = Arc::clone(&state);
        let style_binding = Binding::constants_with_update("outline_style", STYLE_SLOT, style, move |writer, _| {
            let state = style_state
                .read()
                .map_err(|_| engine_err!("atomview::ParticleView", "Particle state lock poisoned"))?;
            writer.write_one(&state.outline)
        });

        let graph = renderer.graph_mut();
        let pass = graph.add_pass(RenderPass::new("scene", layout).with_binding(camera_binding))?;

        let particles_layer = graph.add_layer(
            pass,
            RenderLayer::new("particles", pipelines.spheres, Arc::clone(&mesh), PrimitiveTopology::TriangleList)?,
        )?;
        let spheres = graph.add_item(
            particles_layer,
            RenderItem::new("spheres", sphere, desc.max_particles).with_binding(instance_binding),
        )?;

        let selection_layer = graph.add_layer(
            pass,
            RenderLayer::new("selection", pipelines.selection, Arc::clone(&mesh), PrimitiveTopology::TriangleList)?
                .with_stencil_reference(SELECTION_STENCIL),
        )?;
        let selected = graph.add_item(
            selection_layer,
            RenderItem::new("selected", sphere, desc.max_particles).with_binding(selection_binding),
        )?;

        // Must stay after "selection": it tests the stencil that layer writes
        let outline_layer = graph.add_layer(
            pass,
            RenderLayer::new("outline", pipelines.outline, Arc::clone(&mesh), PrimitiveTopology::TriangleList)?
                .with_stencil_reference(SELECTION_STENCIL)
                .with_binding(style_binding),
        )?;
        let outlined = graph.add_item(
            outline_layer,
            RenderItem::new("outlined", sphere, desc.max_particles)
                .with_binding(Binding::constants("selected_instances", INSTANCE_SLOT, selected_instances)),
        )?;

        let box_layer = graph.add_layer(
            pass,
            RenderLayer::new("box", pipelines.lines, mesh, PrimitiveTopology::LineList)?,
        )?;
        graph.add_item(box_layer, RenderItem::new("edges", box_edges, 1))?;

        let mut view = Self {
            desc,
            pass,
            particles_layer,
            spheres,
            selection_layer,
            selected,
            outline_layer,
            outlined,
            box_layer,
            state,
            particle_count,
            selection_count,
        };
        view.on_particle_count_changed(renderer, 0)?;
        view.on_selection_changed(renderer, 0)?;

        crate::engine_info!(
            "atomview::ParticleView",
            "Particle view built (capacity {} particles)",
            view.desc.max_particles
        );
        Ok(view)
    }

    // ===== ACCESSORS =====

    pub fn pass(&self) -> PassId { self.pass }

    pub fn particles_layer(&self) -> LayerId { self.particles_layer }

    pub fn selection_layer(&self) -> LayerId { self.selection_layer }

    pub fn outline_layer(&self) -> LayerId { self.outline_layer }

    pub fn box_layer(&self) -> LayerId { self.box_layer }

    pub fn max_particles(&self) -> u32 { self.desc.max_particles }

    pub fn box_half_extent(&self) -> Vec3 { self.desc.box_half_extent }

    // ===== NOTIFICATIONS =====

    /// The simulation gained or lost particles
    ///
    /// `count` is clamped to the particles currently in the state, so no
    /// instance beyond what the update callback writes is drawn.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when `count` is above `max_particles`.
    /// The sphere item is switched off while the simulation is empty.
    pub fn on_particle_count_changed(&self, renderer: &mut Renderer, count: u32) -> Result<()> {
        let available = self.read_state()?.particles.len();
        let count = self.clamp_count("particle", count, available);
        let graph = renderer.graph_mut();
        graph.set_instance_count(self.spheres, count)?;
        self.particle_count.store(count, Ordering::Release);
        graph.set_item_active(self.spheres, count > 0)
    }

    /// The selection changed; `count` particles are now selected
    ///
    /// `count` is clamped to the selected indices that name a particle.
    /// Selection and outline layers are switched off while nothing is selected.
    pub fn on_selection_changed(&self, renderer: &mut Renderer, count: u32) -> Result<()> {
        let available = self.read_state()?.valid_selection_count();
        let count = self.clamp_count("selection", count, available);
        let graph = renderer.graph_mut();
        graph.set_instance_count(self.selected, count)?;
        graph.set_instance_count(self.outlined, count)?;
        self.selection_count.store(count, Ordering::Release);
        graph.set_layer_active(self.selection_layer, count > 0)?;
        graph.set_layer_active(self.outline_layer, count > 0)
    }

    pub fn set_box_visible(&self, renderer: &mut Renderer, visible: bool) -> Result<()> {
        renderer.graph_mut().set_layer_active(self.box_layer, visible)
    }

    /// Rebuild the box geometry; the previous mesh is reclaimed once the GPU is done with it
    pub fn resize_box(&mut self, renderer: &mut Renderer, half_extent: Vec3) -> Result<()> {
        let mesh = Arc::new(primitive_mesh(renderer, &self.desc, half_extent)?);
        renderer.replace_layer_mesh(self.box_layer, mesh)?;
        self.desc.box_half_extent = half_extent;
        Ok(())
    }
}

impl ParticleView {
    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, ParticleState>> {
        self.state
            .read()
            .map_err(|_| engine_err!("atomview::ParticleView", "Particle state lock poisoned"))
    }

    /// Counts above `max_particles` pass through so the graph rejects them
    fn clamp_count(&self, what: &str, count: u32, available: usize) -> u32 {
        if count > self.desc.max_particles || count as usize <= available {
            return count;
        }
        crate::engine_debug!(
            "atomview::ParticleView",
            "{} count {} clamped to the {} entries in the state",
            what, count, available
        );
        available as u32
    }
}

// ============================================================================
// SETUP HELPERS
// ============================================================================

struct ViewPipelines {
    spheres: Arc<dyn Pipeline>,
    selection: Arc<dyn Pipeline>,
    outline: Arc<dyn Pipeline>,
    lines: Arc<dyn Pipeline>,
}

fn primitive_mesh(renderer: &Renderer, desc: &ParticleViewDesc, half_extent: Vec3) -> Result<MeshCollection> {
    let sphere = uv_sphere(desc.sphere_stacks, desc.sphere_slices);
    let edges = box_edges(half_extent);
    build_collection(
        "primitives",
        Arc::clone(renderer.device()),
        &[(SPHERE_SUBMESH, &sphere), (BOX_SUBMESH, &edges)],
    )
}

fn submesh_index(mesh: &MeshCollection, name: &str) -> Result<usize> {
    mesh.submesh_index(name)
        .ok_or_else(|| engine_err!("atomview::ParticleView", "Mesh '{}' has no submesh '{}'", mesh.name(), name))
}

fn create_layout(renderer: &Renderer) -> Result<Arc<dyn BindingLayout>> {
    let mut device = renderer
        .device()
        .lock()
        .map_err(|_| engine_err!("atomview::ParticleView", "GraphicsDevice lock poisoned"))?;
    device.create_binding_layout(
        BindingLayoutDesc::default()
            .with_slot(CAMERA_SLOT, BindingKind::Constants, ShaderStageFlags::VERTEX_FRAGMENT)
            .with_slot(INSTANCE_SLOT, BindingKind::Storage, ShaderStageFlags::VERTEX)
            .with_slot(STYLE_SLOT, BindingKind::Constants, ShaderStageFlags::VERTEX_FRAGMENT),
    )
}

fn create_pipelines(
    renderer: &Renderer,
    shaders: &ParticleShaders,
    layout: &Arc<dyn BindingLayout>,
) -> Result<ViewPipelines> {
    let mut device = renderer
        .device()
        .lock()
        .map_err(|_| engine_err!("atomview::ParticleView", "GraphicsDevice lock poisoned"))?;

    let base = PipelineDesc {
        name: String::new(),
        vertex_shader: Arc::clone(&shaders.sphere_vertex),
        fragment_shader: Arc::clone(&shaders.sphere_fragment),
        binding_layout: Arc::clone(layout),
        vertex_layout: VertexLayout::position_normal(),
        topology_class: TopologyClass::Triangle,
        rasterization: RasterizationState::default(),
        depth_stencil: DepthStencilState::default(),
        color_blend: ColorBlendState::default(),
    };

    let spheres = device.create_pipeline(PipelineDesc { name: "particles".to_string(), ..base.clone() })?;

    let selection = device.create_pipeline(PipelineDesc {
        name: "selection".to_string(),
        depth_stencil: DepthStencilState::stencil_write(),
        color_blend: ColorBlendState::no_color(),
        ..base.clone()
    })?;

    let outline = device.create_pipeline(PipelineDesc {
        name: "outline".to_string(),
        vertex_shader: Arc::clone(&shaders.outline_vertex),
        fragment_shader: Arc::clone(&shaders.flat_fragment),
        rasterization: RasterizationState { cull_mode: CullMode::Front, ..Default::default() },
        depth_stencil: DepthStencilState::stencil_not_equal(),
        color_blend: ColorBlendState::alpha_blend(),
        ..base.clone()
    })?;

    let lines = device.create_pipeline(PipelineDesc {
        name: "box".to_string(),
        vertex_shader: Arc::clone(&shaders.line_vertex),
        fragment_shader: Arc::clone(&shaders.flat_fragment),
        topology_class: TopologyClass::Line,
        rasterization: RasterizationState { cull_mode: CullMode::None, ..Default::default() },
        ..base
    })?;

    Ok(ViewPipelines { spheres, selection, outline, lines })
}

#[cfg(test)]
#[path = "particle_view_tests.rs"]
mod tests;
