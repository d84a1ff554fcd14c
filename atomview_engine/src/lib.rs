/*!
# AtomView Engine

Frame-synchronized render graph for the AtomView particle renderer.

The crate is backend agnostic: the GPU is reached only through the
`GraphicsDevice`, `CommandList` and `Swapchain` traits. A Vulkan 1.3
implementation lives in `atomview_renderer_vulkan`.

## Architecture

- **RenderGraph**: passes → layers → items → bindings, plus compute layers
- **ConstantBuffer**: 256-byte aligned regions replicated once per frame in flight
- **FrameSynchronizer**: per-slot fence protocol over a monotonic timeline
- **DeferredReclaimer**: keeps retired GPU resources alive until their fence completes
- **Renderer**: owns the graph and drives `Update` / `Render` each frame
- **ParticleView**: the standard particle, selection, outline and box layers
*/

// Internal modules
mod error;
mod engine;
pub mod config;
pub mod log;
pub mod graphics_device;
pub mod resource;
pub mod frame;
pub mod render_graph;
pub mod renderer;
pub mod scene;

#[cfg(test)]
mod test_logger;
#[cfg(test)]
mod test_fixtures;

// Main atomview namespace module
pub mod atomview {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine facade
    pub use crate::engine::Engine;

    pub use crate::renderer::{FrameStats, RecordCounts, Renderer};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod config {
        pub use crate::config::*;
    }

    // GPU boundary traits and descriptors
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod graph {
        pub use crate::render_graph::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
