//! Frame pacing: the per-slot fence protocol and deferred destruction

pub mod frame_synchronizer;
pub mod deferred_reclaimer;

pub use frame_synchronizer::*;
pub use deferred_reclaimer::*;
