//! Player state and per-tick command slots.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use stride_collision::EnvironmentHandle;

/// Jump state machine.
///
/// `Grounded` → jump → `Ascending`; `Ascending` → apex → `Falling`;
/// `Falling` → ground probe contact → `Grounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpPhase {
    Grounded,
    Ascending,
    Falling,
}

/// Complete player state advanced by the integrator.
///
/// `position` is the feet point: the capsule spans from `position.y` up to
/// `position.y + 2 · capsule_half_height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    /// Feet position in world space.
    pub position: Vec3,

    /// Velocity in world space (meters/second).
    pub velocity: Vec3,

    /// The ground probe found a walkable contact within the grounding
    /// threshold this tick.
    pub grounded: bool,

    /// The player is sliding, airborne, or otherwise still resolving.
    pub updating: bool,

    /// Time remaining before the next jump is allowed (seconds).
    pub jump_cooldown: f32,

    /// Accumulated simulation time (seconds).
    pub clock: f64,

    pub jump_phase: JumpPhase,

    /// Environment the player is standing on, when grounded.
    pub ground_env: Option<EnvironmentHandle>,

    /// Desired horizontal velocity from the most recent slide command.
    pub slide_target: Vec3,

    /// Distance fallen since last grounded (meters).
    pub fall_distance: f32,
}

impl PlayerState {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            grounded: false,
            updating: true,
            jump_cooldown: 0.0,
            clock: 0.0,
            jump_phase: JumpPhase::Falling,
            ground_env: None,
            slide_target: Vec3::ZERO,
            fall_distance: 0.0,
        }
    }

    /// False when integration would only spread NaNs around.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    pub fn horizontal_speed(&self) -> f32 {
        Vec3::new(self.velocity.x, 0.0, self.velocity.z).length()
    }
}

/// Command slots drained once per tick.
///
/// At most one slide, one teleport, and one jump take effect per tick; a
/// later command overwrites an earlier one within the same window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickCommands {
    pub slide: Option<Vec3>,
    pub teleport: Option<Vec3>,
    pub jump: bool,
}

impl TickCommands {
    /// Record a slide request; the last one before a tick wins.
    pub fn set_slide(&mut self, target: Vec3) {
        self.slide = Some(target);
    }

    /// Record a teleport request; the last one before a tick wins.
    pub fn set_teleport(&mut self, destination: Vec3) {
        self.teleport = Some(destination);
    }

    pub fn request_jump(&mut self) {
        self.jump = true;
    }

    /// Drain the slots for this tick, leaving them empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
