//! Camera: passive data container.
//!
//! The camera computes nothing on its own. The application sets the view
//! and projection matrices; the renderer reads them once per frame through
//! the camera binding's update callback.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use crate::graphics_device::Viewport;
use crate::render_graph::FrameTime;

/// Per-frame camera data as laid out in the camera constant region
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    /// xyz = eye position, w = 1
    pub eye_position: [f32; 4],
    /// x = total seconds, y = delta seconds, z = viewport width, w = viewport height
    pub time_viewport: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct Camera {
    view_matrix: Mat4,
    projection_matrix: Mat4,
    position: Vec3,
    viewport: Viewport,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3, viewport: Viewport) -> Self {
        Self {
            view_matrix: view,
            projection_matrix: projection,
            position,
            viewport,
        }
    }

    // ===== GETTERS =====

    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    // ===== SETTERS (store, compute nothing) =====

    pub fn set_view(&mut self, matrix: Mat4, position: Vec3) {
        self.view_matrix = matrix;
        self.position = position;
    }

    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection_matrix = matrix;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Snapshot for the camera constant region
    pub fn constants(&self, time: &FrameTime) -> CameraConstants {
        CameraConstants {
            view: self.view_matrix.to_cols_array_2d(),
            projection: self.projection_matrix.to_cols_array_2d(),
            view_projection: self.view_projection_matrix().to_cols_array_2d(),
            eye_position: self.position.extend(1.0).to_array(),
            time_viewport: [
                time.total_seconds as f32,
                time.delta_seconds,
                self.viewport.width,
                self.viewport.height,
            ],
        }
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
