//! Encoding and decoding for both message categories.
//!
//! Structured messages round-trip through bincode; hot-path messages are
//! packed into [`FlatMessage`] slots by hand. Decoding validates layout and
//! finiteness so malformed or NaN-carrying commands never reach the core.

use thiserror::Error;

use stride_collision::EnvironmentHandle;

use crate::messages::{FlatMessage, HotKind, StructuredMessage};

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("unknown hot-path kind tag {0}")]
    UnknownKind(f32),

    #[error("hot-path message has {got} slots, expected {expected}")]
    WrongLength { expected: usize, got: usize },

    #[error("invalid hot-path payload: {0}")]
    InvalidPayload(&'static str),
}

/// Decoded hot-path host → worker message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotRequest {
    /// Desired world-space horizontal velocity.
    Slide([f32; 3]),
    /// World-space destination.
    Teleport([f32; 3]),
    Jump,
    /// Teleport-arc query: origin plus direction scaled by speed.
    ParabolicRaycast { origin: [f32; 3], velocity: [f32; 3] },
    /// New world matrix for a moving environment.
    UpdateKinematicEnvironment {
        handle: EnvironmentHandle,
        world_matrix: [f32; 16],
    },
}

/// Decoded hot-path worker → host message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotUpdate {
    Position { position: [f32; 3], grounded: bool },
    /// Hit point and normal; all NaN on a miss.
    Raycast { point: [f32; 3], normal: [f32; 3] },
}

/// Encode a structured message to bytes.
pub fn encode_structured(message: &StructuredMessage) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serde::encode_to_vec(
        message,
        bincode::config::standard(),
    )?)
}

/// Decode a structured message from bytes.
pub fn decode_structured(data: &[u8]) -> Result<StructuredMessage, CodecError> {
    let (message, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(message)
}

/// Pack a hot-path request into its flat wire layout.
pub fn encode_request(request: &HotRequest) -> FlatMessage {
    let mut slots = [0.0_f32; crate::messages::HOT_SLOTS];
    let len = match request {
        HotRequest::Slide(v) => {
            slots[0] = HotKind::Slide.tag();
            slots[1..4].copy_from_slice(v);
            4
        }
        HotRequest::Teleport(p) => {
            slots[0] = HotKind::Teleport.tag();
            slots[1..4].copy_from_slice(p);
            4
        }
        HotRequest::Jump => {
            slots[0] = HotKind::Jump.tag();
            1
        }
        HotRequest::ParabolicRaycast { origin, velocity } => {
            slots[0] = HotKind::ParabolicRaycast.tag();
            slots[1..4].copy_from_slice(origin);
            slots[4..7].copy_from_slice(velocity);
            7
        }
        HotRequest::UpdateKinematicEnvironment {
            handle,
            world_matrix,
        } => {
            slots[0] = HotKind::UpdateKinematicEnvironment.tag();
            slots[1] = *handle as f32;
            slots[2..18].copy_from_slice(world_matrix);
            18
        }
    };
    FlatMessage::from_slots(&slots[..len]).expect("request layouts fit the slot capacity")
}

/// Unpack and validate a hot-path request.
pub fn decode_request(message: &FlatMessage) -> Result<HotRequest, CodecError> {
    let slots = message.as_slice();
    let kind = message
        .kind()
        .ok_or(CodecError::UnknownKind(slots[0]))?;

    match kind {
        HotKind::Slide => {
            let v = read_finite_vec3(slots, 1, 4)?;
            Ok(HotRequest::Slide(v))
        }
        HotKind::Teleport => {
            let p = read_finite_vec3(slots, 1, 4)?;
            Ok(HotRequest::Teleport(p))
        }
        HotKind::Jump => {
            expect_len(slots, 1)?;
            Ok(HotRequest::Jump)
        }
        HotKind::ParabolicRaycast => {
            expect_len(slots, 7)?;
            let origin = read_finite_vec3(slots, 1, 7)?;
            let velocity = read_finite_vec3(slots, 4, 7)?;
            Ok(HotRequest::ParabolicRaycast { origin, velocity })
        }
        HotKind::UpdateKinematicEnvironment => {
            expect_len(slots, 18)?;
            let raw = slots[1];
            if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 {
                return Err(CodecError::InvalidPayload("handle slot"));
            }
            let mut world_matrix = [0.0_f32; 16];
            world_matrix.copy_from_slice(&slots[2..18]);
            Ok(HotRequest::UpdateKinematicEnvironment {
                handle: raw as EnvironmentHandle,
                world_matrix,
            })
        }
        HotKind::PositionUpdate | HotKind::RaycastUpdate => {
            Err(CodecError::InvalidPayload("update kind in request direction"))
        }
    }
}

/// Pack a hot-path update into its flat wire layout.
pub fn encode_update(update: &HotUpdate) -> FlatMessage {
    let mut slots = [0.0_f32; crate::messages::HOT_SLOTS];
    let len = match update {
        HotUpdate::Position { position, grounded } => {
            slots[0] = HotKind::PositionUpdate.tag();
            slots[1..4].copy_from_slice(position);
            slots[4] = if *grounded { 1.0 } else { 0.0 };
            5
        }
        HotUpdate::Raycast { point, normal } => {
            slots[0] = HotKind::RaycastUpdate.tag();
            slots[1..4].copy_from_slice(point);
            slots[4..7].copy_from_slice(normal);
            7
        }
    };
    FlatMessage::from_slots(&slots[..len]).expect("update layouts fit the slot capacity")
}

/// Unpack a hot-path update. Raycast misses keep their NaN sentinel.
pub fn decode_update(message: &FlatMessage) -> Result<HotUpdate, CodecError> {
    let slots = message.as_slice();
    let kind = message
        .kind()
        .ok_or(CodecError::UnknownKind(slots[0]))?;

    match kind {
        HotKind::PositionUpdate => {
            expect_len(slots, 5)?;
            let position = read_finite_vec3(slots, 1, 5)?;
            let grounded = match slots[4] {
                g if g == 0.0 => false,
                g if g == 1.0 => true,
                _ => return Err(CodecError::InvalidPayload("grounded flag")),
            };
            Ok(HotUpdate::Position { position, grounded })
        }
        HotKind::RaycastUpdate => {
            expect_len(slots, 7)?;
            Ok(HotUpdate::Raycast {
                point: [slots[1], slots[2], slots[3]],
                normal: [slots[4], slots[5], slots[6]],
            })
        }
        _ => Err(CodecError::InvalidPayload("request kind in update direction")),
    }
}

fn expect_len(slots: &[f32], expected: usize) -> Result<(), CodecError> {
    if slots.len() != expected {
        return Err(CodecError::WrongLength {
            expected,
            got: slots.len(),
        });
    }
    Ok(())
}

fn read_finite_vec3(slots: &[f32], at: usize, expected: usize) -> Result<[f32; 3], CodecError> {
    expect_len(slots, expected)?;
    let v = [slots[at], slots[at + 1], slots[at + 2]];
    if v.iter().any(|c| !c.is_finite()) {
        return Err(CodecError::InvalidPayload("non-finite vector"));
    }
    Ok(v)
}
