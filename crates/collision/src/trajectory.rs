//! Parabolic raycasts for teleport arcs.
//!
//! The arc starts at `origin` with velocity `velocity` and accelerates along
//! −Y at `|gravity|`. It is clipped at the time it would cross `min_y`,
//! prefiltered against environment bounds with a single AABB, and then
//! approximated by straight segments tested in order, so the earliest hit
//! along the arc wins.

use glam::Vec3;

use crate::aabb::Aabb;
use crate::registry::{EnvironmentHandle, GeometryRegistry};

/// Parabolic raycast inputs.
#[derive(Debug, Clone, Copy)]
pub struct ArcParams {
    pub origin: Vec3,
    /// Direction scaled by initial speed.
    pub velocity: Vec3,
    /// Downward acceleration; must be negative.
    pub gravity: f32,
    /// Lower bound on the arc; the trajectory is clipped where it crosses
    /// this height.
    pub min_y: f32,
    /// Number of straight segments approximating the arc.
    pub segments: u32,
}

/// A teleport arc intersection.
#[derive(Debug, Clone, Copy)]
pub struct ArcHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub environment: EnvironmentHandle,
}

/// Trace the arc through the registry. Deterministic for identical inputs
/// and registry contents; `None` when the arc reaches `min_y` untouched.
pub fn parabolic_raycast(registry: &GeometryRegistry, params: &ArcParams) -> Option<ArcHit> {
    if !params.origin.is_finite() || !params.velocity.is_finite() {
        return None;
    }
    if params.gravity >= -1e-6 || params.segments == 0 {
        return None;
    }

    let t_end = end_time(params)?;
    let peak_y = if params.velocity.y > 0.0 {
        params.origin.y + params.velocity.y * params.velocity.y / (2.0 * -params.gravity)
    } else {
        params.origin.y
    };

    // One box spanning the start, the apex, and the end point. Horizontal
    // motion is linear, so the endpoints bound x and z exactly.
    let end_point = position_at(params, t_end);
    let mut arc_bounds = Aabb::from_points([params.origin, end_point]);
    arc_bounds.expand_point(Vec3::new(params.origin.x, peak_y, params.origin.z));
    let arc_bounds = arc_bounds.grown(0.01);

    let candidates: Vec<EnvironmentHandle> = registry
        .iter()
        .filter(|(_, env)| env.world_bounds().intersects(&arc_bounds))
        .map(|(handle, _)| handle)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut previous = params.origin;
    for step in 1..=params.segments {
        let t = t_end * step as f32 / params.segments as f32;
        let point = position_at(params, t);
        if let Some(hit) = registry.cast_segment_among(&candidates, previous, point) {
            return Some(ArcHit {
                point: hit.point,
                normal: hit.normal,
                environment: hit.environment,
            });
        }
        previous = point;
    }

    None
}

fn position_at(params: &ArcParams, t: f32) -> Vec3 {
    params.origin
        + params.velocity * t
        + Vec3::new(0.0, 0.5 * params.gravity * t * t, 0.0)
}

/// Positive root of `½·g·t² + V_y·t + (P_y − minY) = 0`.
fn end_time(params: &ArcParams) -> Option<f32> {
    let height = params.origin.y - params.min_y;
    if height <= 0.0 {
        return None;
    }
    let discriminant = params.velocity.y * params.velocity.y - 2.0 * params.gravity * height;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-params.velocity.y - discriminant.sqrt()) / params.gravity;
    (t > 0.0 && t.is_finite()).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentKind;
    use glam::Mat4;

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

    fn registry_with_floor() -> GeometryRegistry {
        let mut registry = GeometryRegistry::new();
        registry
            .add(
                1,
                &floor_positions(),
                None,
                EnvironmentKind::Static,
                Mat4::IDENTITY,
            )
            .unwrap();
        registry
    }

    fn arc(origin: Vec3, velocity: Vec3, gravity: f32) -> ArcParams {
        ArcParams {
            origin,
            velocity,
            gravity,
            min_y: -100.0,
            segments: 30,
        }
    }

    #[test]
    fn test_arc_lands_on_floor_at_analytic_point() {
        let registry = registry_with_floor();
        let params = arc(Vec3::new(0.0, 2.0, 0.0), Vec3::new(2.0, 2.0, 0.0), -10.0);
        let hit = parabolic_raycast(&registry, &params).unwrap();

        // y(t) = 2 + 2t − 5t² = 0 at t ≈ 0.8633, so x ≈ 1.7266.
        assert!(hit.point.y.abs() < 0.02, "y = {}", hit.point.y);
        assert!((hit.point.x - 1.7266).abs() < 0.05, "x = {}", hit.point.x);
        assert!((hit.normal - Vec3::Y).length() < 1e-2);
        assert_eq!(hit.environment, 1);
    }

    #[test]
    fn test_upward_arc_with_no_geometry_misses() {
        let registry = GeometryRegistry::new();
        let params = arc(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 3.0, 0.0), -0.4);
        assert!(parabolic_raycast(&registry, &params).is_none());
    }

    #[test]
    fn test_prefilter_skips_distant_environments() {
        let mut registry = GeometryRegistry::new();
        registry
            .add(
                1,
                &floor_positions(),
                None,
                EnvironmentKind::Static,
                Mat4::from_translation(Vec3::new(500.0, 0.0, 0.0)),
            )
            .unwrap();

        // The arc stays near the origin; the far floor must not be hit.
        let params = arc(Vec3::new(0.0, 2.0, 0.0), Vec3::new(2.0, 2.0, 0.0), -10.0);
        assert!(parabolic_raycast(&registry, &params).is_none());
    }

    #[test]
    fn test_origin_below_min_y_misses() {
        let registry = registry_with_floor();
        let params = ArcParams {
            min_y: 5.0,
            ..arc(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 1.0, 0.0), -10.0)
        };
        assert!(parabolic_raycast(&registry, &params).is_none());
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        let registry = registry_with_floor();
        let bad_gravity = arc(Vec3::new(0.0, 2.0, 0.0), Vec3::X, 0.0);
        assert!(parabolic_raycast(&registry, &bad_gravity).is_none());

        let nan_origin = arc(Vec3::new(f32::NAN, 2.0, 0.0), Vec3::X, -10.0);
        assert!(parabolic_raycast(&registry, &nan_origin).is_none());
    }

    #[test]
    fn test_deterministic() {
        let registry = registry_with_floor();
        let params = arc(Vec3::new(-1.0, 3.0, 0.5), Vec3::new(3.0, 1.0, -0.5), -9.8);
        let a = parabolic_raycast(&registry, &params).unwrap();
        let b = parabolic_raycast(&registry, &params).unwrap();
        assert_eq!(a.point, b.point);
        assert_eq!(a.normal, b.normal);
    }
}
