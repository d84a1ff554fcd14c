/// Swapchain trait - window presentation

use crate::error::Result;

/// Outcome of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain no longer matches the surface and should be recreated
    Suboptimal,
}

/// Swapchain for presenting rendered images to a window
///
/// Owns the presentable images, their depth-stencil attachment and the
/// binary semaphores that order acquire, submit and present.
pub trait Swapchain: Send + Sync {
    /// Acquire the next presentable image
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Queue the image for presentation. Must follow the submission that rendered it.
    fn present(&mut self, image_index: u32) -> Result<PresentResult>;

    /// Recreate for a new surface size
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    fn image_count(&self) -> usize;

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}
