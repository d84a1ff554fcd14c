//! Scene-side consumers of the render graph
//!
//! The camera and the particle view turn application state into bindings,
//! layers and instance counts.

mod camera;
mod particle_view;

pub use camera::{Camera, CameraConstants};
pub use particle_view::{
    OutlineStyle, ParticleInstance, ParticleShaders, ParticleState, ParticleView, ParticleViewDesc, CAMERA_SLOT,
    INSTANCE_SLOT, SELECTION_STENCIL, STYLE_SLOT,
};
