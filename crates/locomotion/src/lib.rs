//! Stride Locomotion
//!
//! Player state and the per-tick integrator. The controller is pure
//! simulation: it reads commands, queries the geometry registry, and mutates
//! a [`PlayerState`]. Message plumbing and scheduling live in the engine
//! crate.

pub mod config;
pub mod player;
pub mod state;

pub use config::{ConfigUpdate, LocomotionConfig};
pub use player::{PlayerController, TickOutcome};
pub use state::{JumpPhase, PlayerState, TickCommands};
