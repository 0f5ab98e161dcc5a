//! The per-tick locomotion integrator.
//!
//! Each tick: apply the drained commands, follow a kinematic platform the
//! player stands on, integrate gravity, probe the ground and apply the float
//! force, advance by velocity, and depenetrate the capsule. The controller
//! is stateless between ticks; everything lives in [`PlayerState`].

use glam::Vec3;

use stride_collision::{ground_probe, resolve_capsule, GeometryRegistry};

use crate::config::LocomotionConfig;
use crate::state::{JumpPhase, PlayerState, TickCommands};

/// Upward speed above which the ground probe is ignored, so a fresh jump is
/// not immediately re-grounded.
const ASCENT_GROUND_IGNORE: f32 = 0.1;

/// Squared speed below which the player counts as at rest for emission.
const REST_SPEED_SQ: f32 = 1e-4;

/// Result of one integrator tick.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    /// A position update should be emitted for this tick.
    pub emit: bool,
}

/// Drives a [`PlayerState`] through the geometry registry at a fixed tick.
#[derive(Debug, Clone)]
pub struct PlayerController {
    pub config: LocomotionConfig,
}

impl PlayerController {
    pub fn new(config: LocomotionConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(LocomotionConfig::default())
    }

    /// Advance the player by one tick of `dt` seconds.
    pub fn tick(
        &self,
        state: &mut PlayerState,
        commands: TickCommands,
        registry: &GeometryRegistry,
        dt: f32,
    ) -> TickOutcome {
        if !state.is_finite() {
            log::warn!("skipping tick: player state is not finite");
            return TickOutcome { emit: false };
        }

        state.clock += f64::from(dt);
        state.jump_cooldown = (state.jump_cooldown - dt).max(0.0);

        // Follow the platform the player stood on last tick.
        let mut platform_moved = false;
        if state.grounded {
            if let Some(handle) = state.ground_env {
                if let Some(delta) = registry.kinematic_delta(handle) {
                    let carried = delta.transform_point3(state.position);
                    if (carried - state.position).length_squared() > 1e-12 {
                        platform_moved = true;
                    }
                    state.position = carried;
                }
            }
        }

        self.apply_commands(state, &commands);

        // Horizontal velocity tracks the slide target; once input stops the
        // remaining speed decays to rest.
        let input_active = state.slide_target.length_squared() > 1e-6;
        if input_active {
            state.velocity.x = state.slide_target.x;
            state.velocity.z = state.slide_target.z;
        } else if state.grounded {
            let decay = (1.0 - self.config.slide_friction * dt).max(0.0);
            state.velocity.x *= decay;
            state.velocity.z *= decay;
            if state.horizontal_speed() < self.config.stop_speed {
                state.velocity.x = 0.0;
                state.velocity.z = 0.0;
            }
        }

        // Gravity, until the drop bound halts further accumulation.
        if state.fall_distance < self.config.max_drop_distance {
            state.velocity.y += self.config.gravity * dt;
        }

        let grounded_now = self.probe_and_float(state, registry, dt);

        let just_landed = grounded_now && state.jump_phase != JumpPhase::Grounded;
        if just_landed {
            state.jump_phase = JumpPhase::Grounded;
            state.velocity.y = 0.0;
        }
        match state.jump_phase {
            JumpPhase::Ascending if state.velocity.y <= 0.0 => {
                state.jump_phase = JumpPhase::Falling;
            }
            JumpPhase::Grounded if !grounded_now => {
                state.jump_phase = JumpPhase::Falling;
            }
            _ => {}
        }
        state.grounded = grounded_now;
        if grounded_now {
            state.fall_distance = 0.0;
        } else {
            state.ground_env = None;
        }

        state.velocity = state.velocity.clamp_length_max(self.config.max_velocity);

        // Advance, tracking airborne descent against the drop bound.
        let step = state.velocity * dt;
        state.position += step;
        if !grounded_now && step.y < 0.0 {
            state.fall_distance -= step.y;
        }

        self.depenetrate(state, registry);

        state.updating =
            input_active || !state.grounded || state.jump_cooldown > 0.0;
        let at_rest = state.velocity.length_squared() < REST_SPEED_SQ;
        let emit = state.updating || !at_rest || just_landed || platform_moved;
        TickOutcome { emit }
    }

    fn apply_commands(&self, state: &mut PlayerState, commands: &TickCommands) {
        if let Some(target) = commands.slide {
            if target.is_finite() {
                state.slide_target = Vec3::new(target.x, 0.0, target.z);
            } else {
                log::debug!("dropping slide command with non-finite target");
            }
        }

        if let Some(destination) = commands.teleport {
            if destination.is_finite() {
                state.position = destination;
                state.velocity = Vec3::ZERO;
                state.grounded = false;
                state.ground_env = None;
                state.jump_phase = JumpPhase::Falling;
                state.fall_distance = 0.0;
            } else {
                log::debug!("dropping teleport command with non-finite destination");
            }
        }

        if commands.jump {
            if state.grounded && state.jump_cooldown == 0.0 {
                state.velocity.y = self.config.jump_impulse();
                state.jump_cooldown = self.config.jump_cooldown;
                state.jump_phase = JumpPhase::Ascending;
                state.grounded = false;
                state.ground_env = None;
            } else {
                log::debug!(
                    "jump ignored: grounded={} cooldown={:.3}",
                    state.grounded,
                    state.jump_cooldown
                );
            }
        }
    }

    /// Run the ground probe and, when close enough to a walkable surface,
    /// apply the float force. Returns the new grounded flag.
    fn probe_and_float(
        &self,
        state: &mut PlayerState,
        registry: &GeometryRegistry,
        dt: f32,
    ) -> bool {
        if state.velocity.y > ASCENT_GROUND_IGNORE {
            return false;
        }

        let probe_origin = state.position + Vec3::new(0.0, self.config.capsule_radius, 0.0);
        let Some(hit) = ground_probe(registry, probe_origin, self.config.probe_length()) else {
            return false;
        };

        let ground_distance = state.position.y - hit.point.y;
        let walkable = hit.normal.y >= self.config.slope_max_angle.cos();
        if ground_distance >= self.config.grounding_threshold() || !walkable {
            return false;
        }

        // Spring-damper restoring the feet to hover float_height above the
        // contact; clamped, then converted to acceleration by mass.
        let error = ground_distance - self.config.float_height;
        let force = (-self.config.ground_spring_strength * error
            - self.config.ground_spring_damping * state.velocity.y)
            .clamp(-self.config.max_ground_force, self.config.max_ground_force);
        state.velocity.y += force / self.config.player_mass * dt;

        state.ground_env = Some(hit.environment);
        true
    }

    fn depenetrate(&self, state: &mut PlayerState, registry: &GeometryRegistry) {
        let half_height = self.config.capsule_half_height;
        let mut center = state.position + Vec3::new(0.0, half_height, 0.0);
        let report = resolve_capsule(
            registry,
            &mut center,
            self.config.capsule_radius,
            half_height,
            self.config.slope_max_angle,
            self.config.depenetration_passes,
        );
        state.position = center - Vec3::new(0.0, half_height, 0.0);

        if report.touched_floor && state.velocity.y < 0.0 {
            state.velocity.y = 0.0;
        }
        if report.touched_ceiling && state.velocity.y > 0.0 {
            state.velocity.y = 0.0;
        }
        if !report.converged {
            log::debug!(
                "depenetration left contacts unresolved at {:?}",
                state.position
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
