//! Stride Protocol
//!
//! Everything that crosses the host/worker boundary. Messages come in two
//! categories:
//!
//! - **Structured** messages (`Init`, `Config`, `AddEnvironment`,
//!   `RemoveEnvironment`): a serde enum encoded with bincode. These are
//!   rare, so the allocation is acceptable.
//! - **Hot-path** messages (slide, teleport, jump, raycast, kinematic
//!   updates, and both outbound updates): fixed-layout flat `f32` arrays
//!   with the kind tag in slot 0. `Copy`, no allocation.
//!
//! Within each category delivery is first-in-first-out; no ordering holds
//! between categories.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_request, decode_structured, decode_update, encode_request, encode_structured,
    encode_update, CodecError, HotRequest, HotUpdate,
};
pub use messages::{EnginePacket, FlatMessage, HostPacket, HotKind, StructuredMessage, HOT_SLOTS};
