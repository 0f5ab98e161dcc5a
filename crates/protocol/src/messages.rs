//! Message and packet types crossing the worker boundary.

use serde::{Deserialize, Serialize};

use stride_collision::{EnvironmentHandle, EnvironmentKind};
use stride_locomotion::ConfigUpdate;

/// Capacity of a hot-path message: one kind tag plus the largest payload
/// (a handle and a 16-float matrix).
pub const HOT_SLOTS: usize = 18;

/// Hot-path message kinds. The discriminant is the wire tag in slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotKind {
    Slide = 1,
    Teleport = 2,
    Jump = 3,
    ParabolicRaycast = 4,
    UpdateKinematicEnvironment = 5,
    PositionUpdate = 6,
    RaycastUpdate = 7,
}

impl HotKind {
    pub fn tag(self) -> f32 {
        self as u8 as f32
    }

    pub fn from_tag(tag: f32) -> Option<Self> {
        if !tag.is_finite() {
            return None;
        }
        match tag as i32 {
            1 => Some(Self::Slide),
            2 => Some(Self::Teleport),
            3 => Some(Self::Jump),
            4 => Some(Self::ParabolicRaycast),
            5 => Some(Self::UpdateKinematicEnvironment),
            6 => Some(Self::PositionUpdate),
            7 => Some(Self::RaycastUpdate),
            _ => None,
        }
    }
}

/// A flat numeric message: slot 0 is the kind tag, the rest is payload.
///
/// Fixed-capacity and `Copy`, so hot-path traffic allocates nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatMessage {
    len: u8,
    slots: [f32; HOT_SLOTS],
}

impl FlatMessage {
    /// Build from raw slots. `None` when empty or over capacity.
    pub fn from_slots(slots: &[f32]) -> Option<Self> {
        if slots.is_empty() || slots.len() > HOT_SLOTS {
            return None;
        }
        let mut message = Self {
            len: slots.len() as u8,
            slots: [0.0; HOT_SLOTS],
        };
        message.slots[..slots.len()].copy_from_slice(slots);
        Some(message)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.slots[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The kind tag in slot 0, if it names a known kind.
    pub fn kind(&self) -> Option<HotKind> {
        HotKind::from_tag(self.slots[0])
    }
}

/// Structured host → worker messages: `{kind, payload}` records encoded with
/// bincode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StructuredMessage {
    /// Place the player; required before any command is honored.
    Init { position: [f32; 3] },

    /// Partial configuration overlay.
    Config(ConfigUpdate),

    /// Register an environment mesh.
    AddEnvironment {
        handle: EnvironmentHandle,
        /// Flat xyz triplets.
        positions: Vec<f32>,
        /// Optional triangle indices; soup order when absent.
        indices: Option<Vec<u32>>,
        kind: EnvironmentKind,
        /// Column-major affine matrix.
        world_matrix: [f32; 16],
    },

    /// Drop an environment. Unknown handles are ignored.
    RemoveEnvironment { handle: EnvironmentHandle },
}

/// Everything the host can send to the worker.
#[derive(Debug, Clone)]
pub enum HostPacket {
    /// Bincode-encoded [`StructuredMessage`].
    Structured(Vec<u8>),
    Hot(FlatMessage),
}

/// Worker → host traffic is hot-path only.
pub type EnginePacket = FlatMessage;
