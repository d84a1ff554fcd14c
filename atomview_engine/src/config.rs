//! Renderer configuration
//!
//! Plain data consumed by the `Renderer` (frame pacing, clear values,
//! deletion queue limit) and by backends (validation, vsync, app name).

use crate::error::Result;

/// Upper bound accepted for `RendererConfig::frames_in_flight`
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Validation-layer message filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Counters collected by a backend's validation callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Renderer and device configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Number of frame slots the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Enable backend validation layers
    pub enable_validation: bool,
    /// Which validation messages are reported
    pub debug_severity: DebugSeverity,
    /// Application name reported to the driver
    pub app_name: String,
    /// Present with vertical sync (FIFO) or without (MAILBOX when available)
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Soft limit on the deferred deletion queue. Exceeding it logs a
    /// warning once per crossing; `None` leaves the queue unbounded.
    pub max_pending_deletions: Option<usize>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            enable_validation: false,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            app_name: "AtomView".to_string(),
            vsync: true,
            clear_color: [0.02, 0.02, 0.05, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            max_pending_deletions: None,
        }
    }
}

impl RendererConfig {
    /// Check values the frame loop depends on
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            crate::engine_bail!(
                "atomview::RendererConfig",
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT,
                self.frames_in_flight
            );
        }
        if !(0.0..=1.0).contains(&self.clear_depth) {
            crate::engine_bail!(
                "atomview::RendererConfig",
                "clear_depth must be in [0, 1], got {}",
                self.clear_depth
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
