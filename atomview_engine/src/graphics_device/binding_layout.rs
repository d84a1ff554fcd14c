/// Binding-slot layout ("root signature")
///
/// A layout declares the numbered slots a pass binds constant regions and
/// storage ranges to. Every pipeline drawn inside a pass is created against
/// that pass's layout.

use crate::error::Result;
use crate::graphics_device::ShaderStageFlags;

/// What a slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A constant region (uniform buffer range)
    Constants,
    /// A storage buffer range
    Storage,
}

/// One numbered slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlotDesc {
    pub slot: u32,
    pub kind: BindingKind,
    pub stages: ShaderStageFlags,
}

/// Descriptor for creating a binding layout
#[derive(Debug, Clone, Default)]
pub struct BindingLayoutDesc {
    pub slots: Vec<BindingSlotDesc>,
}

impl BindingLayoutDesc {
    /// Builder-style slot declaration
    pub fn with_slot(mut self, slot: u32, kind: BindingKind, stages: ShaderStageFlags) -> Self {
        self.slots.push(BindingSlotDesc { slot, kind, stages });
        self
    }

    /// Reject duplicate slot numbers
    pub fn validate(&self) -> Result<()> {
        for (i, a) in self.slots.iter().enumerate() {
            if self.slots[i + 1..].iter().any(|b| b.slot == a.slot) {
                crate::engine_bail!(
                    "atomview::BindingLayout",
                    "Slot {} declared more than once",
                    a.slot
                );
            }
        }
        Ok(())
    }
}

/// Backend binding layout
pub trait BindingLayout: Send + Sync {
    /// Declared slots, in declaration order
    fn slots(&self) -> &[BindingSlotDesc];

    /// Look up a slot by number
    fn slot(&self, slot: u32) -> Option<&BindingSlotDesc> {
        self.slots().iter().find(|s| s.slot == slot)
    }
}
