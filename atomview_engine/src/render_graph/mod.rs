//! Render graph object model
//!
//! passes → layers → items → bindings, plus compute layers and items, with
//! PreWork/PostWork hooks at every level.

pub mod binding;
pub mod hooks;
pub mod render_item;
pub mod render_layer;
pub mod render_pass;
pub mod render_graph;

pub use binding::{Binding, FrameTime, UpdateFn};
pub use hooks::{HookContext, HookFlow, PostWorkHook, PreWorkHook, WorkHooks};
pub use render_item::{ComputeItem, RenderItem};
pub use render_layer::{ComputeLayer, RenderLayer};
pub use render_pass::RenderPass;
pub use render_graph::{ComputeItemId, ComputeLayerId, ItemId, LayerId, PassId, RenderGraph};
