//! PreWork / PostWork hooks.
//!
//! Hooks are plain boxed closures stored on passes, layers, compute layers
//! and items. A PreWork hook may return `HookFlow::Skip` to drop the owner's
//! commands for the current frame; the matching PostWork hook then does
//! not run either.

use crate::error::Result;
use crate::graphics_device::CommandList;

/// Result of a PreWork hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    /// Record the owner's commands
    Continue,
    /// Skip the owner for this frame
    Skip,
}

/// What a hook is told about the frame being recorded
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub frame_index: usize,
    /// Name of the pass, layer or item that owns the hook
    pub owner: &'a str,
}

pub type PreWorkHook = Box<dyn FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<HookFlow> + Send + Sync>;

pub type PostWorkHook = Box<dyn FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<()> + Send + Sync>;

/// Optional PreWork and PostWork pair
#[derive(Default)]
pub struct WorkHooks {
    pre_work: Option<PreWorkHook>,
    post_work: Option<PostWorkHook>,
}

impl WorkHooks {
    pub fn set_pre_work<F>(&mut self, hook: F)
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<HookFlow> + Send + Sync + 'static,
    {
        self.pre_work = Some(Box::new(hook));
    }

    pub fn set_post_work<F>(&mut self, hook: F)
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.post_work = Some(Box::new(hook));
    }

    pub fn clear(&mut self) {
        self.pre_work = None;
        self.post_work = None;
    }

    pub fn has_pre_work(&self) -> bool {
        self.pre_work.is_some()
    }

    pub fn has_post_work(&self) -> bool {
        self.post_work.is_some()
    }

    /// Run PreWork, `Continue` when none is set
    pub fn pre_work(&mut self, cmd: &mut dyn CommandList, ctx: &HookContext<'_>) -> Result<HookFlow> {
        match self.pre_work.as_mut() {
            Some(hook) => hook(cmd, ctx),
            None => Ok(HookFlow::Continue),
        }
    }

    pub fn post_work(&mut self, cmd: &mut dyn CommandList, ctx: &HookContext<'_>) -> Result<()> {
        match self.post_work.as_mut() {
            Some(hook) => hook(cmd, ctx),
            None => Ok(()),
        }
    }
}
