//! Synchronous engine state: message handling plus the tick entry point.
//!
//! Every error is resolved here by logging and dropping, so the host never
//! sees an error response; the only reply traffic is raycast updates and the
//! per-tick position stream.

use std::time::Duration;

use glam::{Mat4, Vec3};

use stride_collision::{parabolic_raycast, ArcParams, GeometryRegistry, RegistryError};
use stride_locomotion::{LocomotionConfig, PlayerController, PlayerState, TickCommands};
use stride_protocol::{
    decode_request, decode_structured, encode_update, EnginePacket, HostPacket, HotRequest,
    HotUpdate, StructuredMessage,
};

/// The worker-side engine: registry, player, controller, and the command
/// slots for the current tick window.
///
/// Plain struct, no globals: tests instantiate as many as they like and
/// drive `handle_packet` / `tick` directly.
#[derive(Debug)]
pub struct EngineState {
    controller: PlayerController,
    registry: GeometryRegistry,
    /// `None` until the host sends `Init`.
    player: Option<PlayerState>,
    pending: TickCommands,
}

impl EngineState {
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            controller: PlayerController::new(config),
            registry: GeometryRegistry::new(),
            player: None,
            pending: TickCommands::default(),
        }
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.controller.config
    }

    pub fn registry(&self) -> &GeometryRegistry {
        &self.registry
    }

    pub fn player(&self) -> Option<&PlayerState> {
        self.player.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.player.is_some()
    }

    /// Wall-clock duration of one tick at the current configuration.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f32(self.controller.config.tick_delta())
    }

    /// Handle one host packet to completion.
    ///
    /// Raycast requests are answered synchronously; everything else either
    /// mutates the registry, loads a command slot, or is logged and dropped.
    pub fn handle_packet(&mut self, packet: &HostPacket) -> Option<EnginePacket> {
        match packet {
            HostPacket::Structured(bytes) => match decode_structured(bytes) {
                Ok(message) => self.handle_structured(message),
                Err(error) => {
                    log::warn!("dropping undecodable structured message: {error}");
                    None
                }
            },
            HostPacket::Hot(message) => match decode_request(message) {
                Ok(request) => self.handle_request(request),
                Err(error) => {
                    log::warn!("dropping undecodable hot-path message: {error}");
                    None
                }
            },
        }
    }

    /// Advance the simulation by one fixed tick.
    ///
    /// Drains the command slots, integrates, rotates the kinematic history,
    /// and emits at most one position update.
    pub fn tick(&mut self) -> Option<EnginePacket> {
        let player = self.player.as_mut()?;
        let commands = self.pending.take();
        let dt = self.controller.config.tick_delta();

        let outcome = self.controller.tick(player, commands, &self.registry, dt);
        self.registry.rotate_kinematic_history();

        outcome.emit.then(|| {
            encode_update(&HotUpdate::Position {
                position: player.position.to_array(),
                grounded: player.grounded,
            })
        })
    }

    fn handle_structured(&mut self, message: StructuredMessage) -> Option<EnginePacket> {
        match message {
            StructuredMessage::Init { position } => {
                let position = Vec3::from_array(position);
                if position.is_finite() {
                    self.player = Some(PlayerState::new(position));
                    self.pending = TickCommands::default();
                } else {
                    log::warn!("ignoring Init with non-finite position");
                }
            }
            StructuredMessage::Config(update) => {
                if update.is_valid() {
                    update.apply_to(&mut self.controller.config);
                } else {
                    log::warn!("ignoring Config update with invalid values");
                }
            }
            StructuredMessage::AddEnvironment {
                handle,
                positions,
                indices,
                kind,
                world_matrix,
            } => {
                if !self.is_initialized() {
                    log::debug!("ignoring AddEnvironment({handle}) before Init");
                    return None;
                }
                let result = self.registry.add(
                    handle,
                    &positions,
                    indices.as_deref(),
                    kind,
                    Mat4::from_cols_array(&world_matrix),
                );
                if let Err(error) = result {
                    log::warn!("rejecting AddEnvironment({handle}): {error}");
                }
            }
            StructuredMessage::RemoveEnvironment { handle } => {
                if !self.is_initialized() {
                    log::debug!("ignoring RemoveEnvironment({handle}) before Init");
                    return None;
                }
                // Absent handles are a silent no-op.
                self.registry.remove(handle);
            }
        }
        None
    }

    fn handle_request(&mut self, request: HotRequest) -> Option<EnginePacket> {
        if !self.is_initialized() {
            log::debug!("ignoring {request:?} before Init");
            return None;
        }

        match request {
            HotRequest::Slide(target) => {
                self.pending.set_slide(Vec3::from_array(target));
                None
            }
            HotRequest::Teleport(destination) => {
                self.pending.set_teleport(Vec3::from_array(destination));
                None
            }
            HotRequest::Jump => {
                self.pending.request_jump();
                None
            }
            HotRequest::UpdateKinematicEnvironment {
                handle,
                world_matrix,
            } => {
                match self
                    .registry
                    .update_transform(handle, Mat4::from_cols_array(&world_matrix))
                {
                    Ok(()) | Err(RegistryError::UnknownHandle(_)) => {}
                    Err(error) => {
                        log::warn!("rejecting transform update for {handle}: {error}");
                    }
                }
                None
            }
            HotRequest::ParabolicRaycast { origin, velocity } => {
                Some(self.raycast(Vec3::from_array(origin), Vec3::from_array(velocity)))
            }
        }
    }

    /// Answer a teleport-arc query from the current registry. Misses carry
    /// the all-NaN sentinel.
    fn raycast(&self, origin: Vec3, velocity: Vec3) -> EnginePacket {
        let config = &self.controller.config;
        let params = ArcParams {
            origin,
            velocity,
            gravity: config.ray_gravity,
            min_y: config.ray_min_y,
            segments: config.ray_segments,
        };

        let update = match parabolic_raycast(&self.registry, &params) {
            Some(hit) => HotUpdate::Raycast {
                point: hit.point.to_array(),
                normal: hit.normal.to_array(),
            },
            None => HotUpdate::Raycast {
                point: [f32::NAN; 3],
                normal: [f32::NAN; 3],
            },
        };
        encode_update(&update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_collision::EnvironmentKind;
    use stride_protocol::{decode_update, encode_request, encode_structured};

    fn structured(message: &StructuredMessage) -> HostPacket {
        HostPacket::Structured(encode_structured(message).unwrap())
    }

    fn hot(request: &HotRequest) -> HostPacket {
        HostPacket::Hot(encode_request(request))
    }

    fn floor_positions() -> Vec<f32> {
        vec![
            -10.0, 0.0, -10.0, //
            -10.0, 0.0, 10.0, //
            10.0, 0.0, 10.0, //
            -10.0, 0.0, -10.0, //
            10.0, 0.0, 10.0, //
            10.0, 0.0, -10.0,
        ]
    }

    fn add_floor(handle: u32) -> HostPacket {
        structured(&StructuredMessage::AddEnvironment {
            handle,
            positions: floor_positions(),
            indices: None,
            kind: EnvironmentKind::Static,
            world_matrix: Mat4::IDENTITY.to_cols_array(),
        })
    }

    fn init_at(position: [f32; 3]) -> HostPacket {
        structured(&StructuredMessage::Init { position })
    }

    #[test]
    fn test_commands_before_init_are_ignored() {
        let mut engine = EngineState::new(LocomotionConfig::default());

        assert!(engine.handle_packet(&hot(&HotRequest::Jump)).is_none());
        engine.handle_packet(&add_floor(1));
        assert!(engine.registry().is_empty());
        assert!(engine.tick().is_none());

        // Config is honored before Init.
        engine.handle_packet(&structured(&StructuredMessage::Config(
            stride_locomotion::ConfigUpdate {
                jump_height: Some(2.0),
                ..Default::default()
            },
        )));
        assert_eq!(engine.config().jump_height, 2.0);
    }

    #[test]
    fn test_init_then_add_makes_world_queryable() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));
        engine.handle_packet(&add_floor(1));
        assert!(engine.registry().contains(1));
        assert!(engine.tick().is_some(), "airborne tick must emit");
    }

    #[test]
    fn test_duplicate_add_keeps_prior_environment() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));
        engine.handle_packet(&add_floor(1));
        engine.handle_packet(&add_floor(1));
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));
        engine.handle_packet(&add_floor(1));
        engine.handle_packet(&structured(&StructuredMessage::RemoveEnvironment { handle: 1 }));
        assert!(engine.registry().is_empty());

        // Removing again is a silent no-op.
        engine.handle_packet(&structured(&StructuredMessage::RemoveEnvironment { handle: 1 }));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_raycast_responds_synchronously() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));
        engine.handle_packet(&add_floor(1));

        let response = engine
            .handle_packet(&hot(&HotRequest::ParabolicRaycast {
                origin: [0.0, 2.0, 0.0],
                velocity: [2.0, -1.0, 0.0],
            }))
            .expect("raycast must produce exactly one response");

        match decode_update(&response).unwrap() {
            HotUpdate::Raycast { point, normal } => {
                assert!(point[1].abs() < 0.05);
                assert!((normal[1] - 1.0).abs() < 0.01);
            }
            other => panic!("wrong update: {other:?}"),
        }
    }

    #[test]
    fn test_raycast_miss_is_nan_sentinel() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));

        let response = engine
            .handle_packet(&hot(&HotRequest::ParabolicRaycast {
                origin: [0.0, 2.0, 0.0],
                velocity: [0.0, 3.0, 0.0],
            }))
            .unwrap();
        match decode_update(&response).unwrap() {
            HotUpdate::Raycast { point, normal } => {
                assert!(point.iter().all(|v| v.is_nan()));
                assert!(normal.iter().all(|v| v.is_nan()));
            }
            other => panic!("wrong update: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_kinematic_matrix_keeps_previous_transform() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        engine.handle_packet(&init_at([0.0, 2.0, 0.0]));
        engine.handle_packet(&structured(&StructuredMessage::AddEnvironment {
            handle: 3,
            positions: floor_positions(),
            indices: None,
            kind: EnvironmentKind::Kinematic,
            world_matrix: Mat4::IDENTITY.to_cols_array(),
        }));

        let singular = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)).to_cols_array();
        engine.handle_packet(&hot(&HotRequest::UpdateKinematicEnvironment {
            handle: 3,
            world_matrix: singular,
        }));

        // The floor is still where it was.
        let hit = engine
            .registry()
            .cast_segment(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .unwrap();
        assert!(hit.point.y.abs() < 1e-4);
    }

    #[test]
    fn test_config_update_changes_tick_period() {
        let mut engine = EngineState::new(LocomotionConfig::default());
        let base = engine.tick_period();
        engine.handle_packet(&structured(&StructuredMessage::Config(
            stride_locomotion::ConfigUpdate {
                update_frequency: Some(30.0),
                ..Default::default()
            },
        )));
        assert!(engine.tick_period() > base);
    }
}
