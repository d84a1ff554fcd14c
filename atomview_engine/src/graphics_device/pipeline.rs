/// Pipeline trait and pipeline descriptors
///
/// Pipelines are immutable once created and shared through `Arc` by every
/// layer that draws with them. Primitive topology and stencil reference are
/// dynamic state, so one pipeline serves every topology of its class and
/// every reference value.

use std::sync::Arc;
use crate::graphics_device::{Shader, BufferFormat, BindingLayout};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

impl PrimitiveTopology {
    /// Topology class a pipeline must be created with to accept this topology dynamically
    pub fn class(&self) -> TopologyClass {
        match self {
            PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip => TopologyClass::Triangle,
            PrimitiveTopology::LineList | PrimitiveTopology::LineStrip => TopologyClass::Line,
            PrimitiveTopology::PointList => TopologyClass::Point,
        }
    }
}

/// Topology class fixed at pipeline creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyClass {
    Triangle,
    Line,
    Point,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Pipeline bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPoint {
    Graphics,
    Compute,
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// A single tightly packed `vec3` position stream at location 0
    pub fn position_only() -> Self {
        Self {
            bindings: vec![VertexBinding { binding: 0, stride: 12, input_rate: VertexInputRate::Vertex }],
            attributes: vec![VertexAttribute {
                location: 0,
                binding: 0,
                format: BufferFormat::R32G32B32_SFLOAT,
                offset: 0,
            }],
        }
    }

    /// Position + normal, both `vec3`, interleaved
    pub fn position_normal() -> Self {
        Self {
            bindings: vec![VertexBinding { binding: 0, stride: 24, input_rate: VertexInputRate::Vertex }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
            ],
        }
    }

    /// Stride of binding 0, or 0 when the layout has no bindings
    pub fn vertex_stride(&self) -> u32 {
        self.bindings.iter().find(|b| b.binding == 0).map(|b| b.stride).unwrap_or(0)
    }
}

// ===== RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
        }
    }
}

// ===== DEPTH / STENCIL =====

/// Comparison operator for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Stencil operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Per-face stencil state. The reference value is dynamic and comes from
/// the layer (`RenderLayer::stencil_reference`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilOpState {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
            compare_mask: 0xFF,
            write_mask: 0xFF,
        }
    }
}

/// Depth and stencil testing state
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            stencil_test_enable: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

impl DepthStencilState {
    /// Depth-tested draw that replaces the stencil value with the layer's reference
    /// wherever it passes. Used for the selection mask.
    pub fn stencil_write() -> Self {
        let face = StencilOpState {
            pass_op: StencilOp::Replace,
            compare_op: CompareOp::Always,
            ..Default::default()
        };
        Self {
            stencil_test_enable: true,
            front: face,
            back: face,
            ..Default::default()
        }
    }

    /// Draw only where the stencil value differs from the layer's reference,
    /// without touching depth or stencil. Used for outlines around a mask.
    pub fn stencil_not_equal() -> Self {
        let face = StencilOpState {
            compare_op: CompareOp::NotEqual,
            write_mask: 0x00,
            ..Default::default()
        };
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            stencil_test_enable: true,
            front: face,
            back: face,
            ..Default::default()
        }
    }
}

// ===== COLOR BLEND =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Color write mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorWriteMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorWriteMask {
    pub const ALL: Self = Self { r: true, g: true, b: true, a: true };
    pub const NONE: Self = Self { r: false, g: false, b: false, a: false };
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Color blending state
#[derive(Debug, Clone, Copy)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorWriteMask,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorWriteMask::ALL,
        }
    }
}

impl ColorBlendState {
    /// Standard `src * a + dst * (1 - a)` blending
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            ..Default::default()
        }
    }

    /// Writes nothing to color. Stencil-only layers use this.
    pub fn no_color() -> Self {
        Self { color_write_mask: ColorWriteMask::NONE, ..Default::default() }
    }
}

// ===== DESCRIPTORS =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug name
    pub name: String,
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    /// Binding layout of the pass this pipeline is drawn in
    pub binding_layout: Arc<dyn BindingLayout>,
    pub vertex_layout: VertexLayout,
    pub topology_class: TopologyClass,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
}

/// Descriptor for creating a compute pipeline
#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub shader: Arc<dyn Shader>,
    pub binding_layout: Arc<dyn BindingLayout>,
}

/// Pipeline state object
///
/// Destroyed when the last `Arc` is dropped. Replaced pipelines should go
/// through the deferred reclaimer rather than being dropped while frames
/// that bound them may still be executing.
pub trait Pipeline: Send + Sync {
    fn bind_point(&self) -> BindPoint;

    /// Name given in the descriptor, for logs and command traces
    fn debug_name(&self) -> &str;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
