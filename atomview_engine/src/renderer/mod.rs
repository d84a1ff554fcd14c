//! Frame orchestration on top of the render graph

pub mod renderer;

pub use renderer::{FrameStats, RecordCounts, Renderer};
