//! Stride demo host.
//!
//! Drives the locomotion worker through the real message surface: registers
//! a floor and a moving platform, slides, jumps, fires a teleport arc, and
//! prints a sampling of the position stream.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};

use stride_collision::EnvironmentKind;
use stride_engine::Engine;
use stride_locomotion::LocomotionConfig;
use stride_protocol::{
    decode_update, encode_request, encode_structured, HostPacket, HotRequest, HotUpdate,
    StructuredMessage,
};

const FLOOR: u32 = 1;
const PLATFORM: u32 = 2;

fn structured(message: &StructuredMessage) -> HostPacket {
    HostPacket::Structured(encode_structured(message).expect("static message encodes"))
}

fn hot(request: &HotRequest) -> HostPacket {
    HostPacket::Hot(encode_request(request))
}

/// Two triangles covering [-10,10]² at y = 0.
fn quad_positions(half: f32) -> Vec<f32> {
    vec![
        -half, 0.0, -half, //
        -half, 0.0, half, //
        half, 0.0, half, //
        -half, 0.0, -half, //
        half, 0.0, half, //
        half, 0.0, -half,
    ]
}

fn main() {
    env_logger::init();

    let engine = Engine::spawn(LocomotionConfig::default()).expect("spawn worker thread");

    engine.send(structured(&StructuredMessage::Init {
        position: [0.0, 2.0, 0.0],
    }));
    engine.send(structured(&StructuredMessage::AddEnvironment {
        handle: FLOOR,
        positions: quad_positions(10.0),
        indices: None,
        kind: EnvironmentKind::Static,
        world_matrix: Mat4::IDENTITY.to_cols_array(),
    }));
    engine.send(structured(&StructuredMessage::AddEnvironment {
        handle: PLATFORM,
        positions: quad_positions(1.0),
        indices: None,
        kind: EnvironmentKind::Kinematic,
        world_matrix: Mat4::from_translation(Vec3::new(4.0, 0.25, 0.0)).to_cols_array(),
    }));

    // Preview a teleport arc before moving at all.
    engine.send(hot(&HotRequest::ParabolicRaycast {
        origin: [0.0, 2.0, 0.0],
        velocity: [3.0, -1.0, 0.0],
    }));

    // Glide forward, hop once along the way.
    engine.send(hot(&HotRequest::Slide([1.5, 0.0, 0.0])));

    let start = Instant::now();
    let mut jumped = false;
    let mut platform_offset = 0.0_f32;
    let mut printed = 0_u32;

    while start.elapsed() < Duration::from_secs(4) {
        if !jumped && start.elapsed() > Duration::from_secs(1) {
            engine.send(hot(&HotRequest::Jump));
            jumped = true;
        }

        // The host nudges the platform every frame, as a scene graph would.
        platform_offset += 0.005;
        engine.send(hot(&HotRequest::UpdateKinematicEnvironment {
            handle: PLATFORM,
            world_matrix: Mat4::from_translation(Vec3::new(
                4.0,
                0.25 + 0.2 * platform_offset.sin(),
                0.0,
            ))
            .to_cols_array(),
        }));

        let Some(packet) = engine.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match decode_update(&packet) {
            Ok(HotUpdate::Position { position, grounded }) => {
                printed += 1;
                if printed % 30 == 0 {
                    println!(
                        "t={:5.2}s  position=({:6.2}, {:5.2}, {:6.2})  grounded={}",
                        start.elapsed().as_secs_f32(),
                        position[0],
                        position[1],
                        position[2],
                        grounded as u8,
                    );
                }
            }
            Ok(HotUpdate::Raycast { point, normal }) => {
                if point[0].is_nan() {
                    println!("teleport arc: no hit");
                } else {
                    println!(
                        "teleport arc hit ({:.2}, {:.2}, {:.2}) with normal ({:.2}, {:.2}, {:.2})",
                        point[0], point[1], point[2], normal[0], normal[1], normal[2],
                    );
                }
            }
            Err(error) => log::warn!("undecodable engine update: {error}"),
        }
    }

    // Blink to the platform and give the worker a moment to settle there.
    engine.send(hot(&HotRequest::Teleport([4.0, 1.5, 0.0])));
    let settle = Instant::now();
    let mut last = None;
    while settle.elapsed() < Duration::from_secs(1) {
        if let Some(packet) = engine.recv_timeout(Duration::from_millis(100)) {
            if let Ok(HotUpdate::Position { position, grounded }) = decode_update(&packet) {
                last = Some((position, grounded));
            }
        }
    }
    if let Some((position, grounded)) = last {
        println!(
            "after teleport: position=({:.2}, {:.2}, {:.2}) grounded={}",
            position[0], position[1], position[2], grounded as u8,
        );
    }
}
