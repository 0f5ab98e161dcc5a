//! Stride Engine
//!
//! The worker side of the locomotion engine: a synchronous [`EngineState`]
//! that owns the registry and player, and a [`Engine`] handle that runs it
//! on a dedicated thread behind a pair of channels.
//!
//! The host and the worker share no mutable state; every interaction is a
//! message. Ticks fire at a fixed frequency; messages are drained between
//! ticks and handled to completion, so commands arriving in one tick window
//! all take effect before the next integration step.

pub mod state;
pub mod worker;

pub use state::EngineState;
pub use worker::Engine;
