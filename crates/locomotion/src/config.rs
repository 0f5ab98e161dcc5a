//! Locomotion configuration.
//!
//! All parameters are grouped here for easy tuning. Metric units throughout:
//! meters, seconds, radians. Gravity values are signed accelerations along
//! +Y, so both defaults are negative.

use serde::{Deserialize, Serialize};

/// Configuration for the locomotion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocomotionConfig {
    // ========================================================================
    // Scheduling
    // ========================================================================
    /// Simulation ticks per second.
    pub update_frequency: f32,

    // ========================================================================
    // Player Capsule
    // ========================================================================
    /// Capsule radius (meters).
    pub capsule_radius: f32,

    /// Capsule half-height: feet to center, caps included (meters).
    pub capsule_half_height: f32,

    /// Player mass (kilograms); converts the ground force to acceleration.
    pub player_mass: f32,

    // ========================================================================
    // Gravity and Falling
    // ========================================================================
    /// Gravity applied to player integration (meters/second², negative).
    pub gravity: f32,

    /// Bound on unassisted falls (meters). Past this, gravity stops
    /// accumulating until the player is grounded again.
    pub max_drop_distance: f32,

    /// Velocity magnitude cap (meters/second).
    pub max_velocity: f32,

    // ========================================================================
    // Grounding
    // ========================================================================
    /// Target hover distance of the feet above ground (meters).
    pub float_height: f32,

    /// Spring constant of the float force (newtons/meter).
    pub ground_spring_strength: f32,

    /// Damping constant of the float force (newton-seconds/meter).
    pub ground_spring_damping: f32,

    /// Clamp on the float force magnitude (newtons).
    pub max_ground_force: f32,

    /// Threshold between floor and wall contacts (radians from +Y).
    pub slope_max_angle: f32,

    // ========================================================================
    // Sliding
    // ========================================================================
    /// Horizontal decay rate once stick input returns to zero (1/second).
    pub slide_friction: f32,

    /// Speed below which the player stops completely (meters/second).
    pub stop_speed: f32,

    // ========================================================================
    // Jumping
    // ========================================================================
    /// Apex height of a jump (meters); the impulse is derived from this.
    pub jump_height: f32,

    /// Minimum time between jumps (seconds).
    pub jump_cooldown: f32,

    // ========================================================================
    // Teleport Arcs
    // ========================================================================
    /// Gravity applied to parabolic raycasts (meters/second², negative).
    pub ray_gravity: f32,

    /// Lower bound on teleport arcs (meters); arcs are clipped there.
    pub ray_min_y: f32,

    /// Straight segments approximating each arc.
    pub ray_segments: u32,

    // ========================================================================
    // Collision Resolution
    // ========================================================================
    /// Maximum depenetration passes per tick.
    pub depenetration_passes: u32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            update_frequency: 60.0,

            capsule_radius: 0.25,
            capsule_half_height: 0.9,  // 1.8m capsule
            player_mass: 70.0,

            gravity: -9.8,
            max_drop_distance: 5.0,
            max_velocity: 50.0,

            float_height: 0.5,
            ground_spring_strength: 20_000.0,
            ground_spring_damping: 2_000.0,
            max_ground_force: 2_000.0,
            slope_max_angle: 50.0 * std::f32::consts::PI / 180.0,

            slide_friction: 6.0,
            stop_speed: 0.1,

            jump_height: 1.5,
            jump_cooldown: 0.1,

            ray_gravity: -0.4,
            ray_min_y: -100.0,
            ray_segments: 30,

            depenetration_passes: 4,
        }
    }
}

impl LocomotionConfig {
    /// Time step per tick in seconds.
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.update_frequency
    }

    /// Upward velocity reaching `jump_height` against gravity.
    pub fn jump_impulse(&self) -> f32 {
        (2.0 * self.gravity.abs() * self.jump_height).sqrt()
    }

    /// Ground-probe distance below which the player counts as grounded.
    pub fn grounding_threshold(&self) -> f32 {
        self.float_height + self.capsule_radius + 0.15
    }

    /// How far below the lower sphere center the ground probe reaches.
    pub fn probe_length(&self) -> f32 {
        self.grounding_threshold() + self.capsule_radius + 0.25
    }
}

/// Partial configuration overlay carried by `Config` messages.
///
/// Only the runtime-tunable options cross the wire; everything else is fixed
/// at engine construction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub ray_gravity: Option<f32>,
    pub max_drop_distance: Option<f32>,
    pub jump_height: Option<f32>,
    pub jump_cooldown: Option<f32>,
    pub update_frequency: Option<f32>,
}

impl ConfigUpdate {
    /// Every present field is finite and within its domain.
    pub fn is_valid(&self) -> bool {
        fn finite(v: Option<f32>) -> bool {
            v.map_or(true, f32::is_finite)
        }
        finite(self.ray_gravity)
            && finite(self.max_drop_distance)
            && finite(self.jump_height)
            && finite(self.jump_cooldown)
            && self.update_frequency.map_or(true, |f| f.is_finite() && f > 0.0)
    }

    pub fn apply_to(&self, config: &mut LocomotionConfig) {
        if let Some(v) = self.ray_gravity {
            config.ray_gravity = v;
        }
        if let Some(v) = self.max_drop_distance {
            config.max_drop_distance = v;
        }
        if let Some(v) = self.jump_height {
            config.jump_height = v;
        }
        if let Some(v) = self.jump_cooldown {
            config.jump_cooldown = v;
        }
        if let Some(v) = self.update_frequency {
            config.update_frequency = v;
        }
    }
}
