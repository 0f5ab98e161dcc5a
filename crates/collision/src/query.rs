//! Capsule queries used by the locomotion integrator: the per-tick ground
//! probe and the depenetration resolver.

use glam::Vec3;

use crate::registry::{CapsuleContact, GeometryRegistry, SegmentHit};
use crate::TOUCH_EPSILON;

/// Distance to back off from surfaces after a correction.
const SKIN: f32 = 1e-3;

/// Cast the short downward ground probe.
///
/// `origin` is the capsule's lower sphere center; the probe extends
/// `probe_length` straight down and reports the closest hit across all
/// environments.
pub fn ground_probe(
    registry: &GeometryRegistry,
    origin: Vec3,
    probe_length: f32,
) -> Option<SegmentHit> {
    registry.cast_segment(origin, origin - Vec3::new(0.0, probe_length, 0.0))
}

/// What the depenetration resolver ran into.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveReport {
    /// A floor-class contact was resolved; the caller should zero downward
    /// velocity.
    pub touched_floor: bool,
    pub touched_wall: bool,
    /// A ceiling-class contact was resolved; the caller should zero upward
    /// velocity.
    pub touched_ceiling: bool,
    /// All penetration was resolved within the pass budget.
    pub converged: bool,
}

/// Push a vertical capsule out of every intersected triangle.
///
/// Contacts are classified by the angle between the triangle normal and +Y:
/// within `slope_max` of vertical is a floor (vertical push), within
/// `slope_max` of inverted is a ceiling (downward push), anything between is
/// a wall (horizontal push along the normal's horizontal projection).
///
/// Within a pass, deeper contacts are resolved first and the pose is updated
/// between contacts. The resolver re-queries for up to `max_passes` passes;
/// leftover penetration after the budget is reported, not retried.
pub fn resolve_capsule(
    registry: &GeometryRegistry,
    center: &mut Vec3,
    radius: f32,
    half_height: f32,
    slope_max: f32,
    max_passes: u32,
) -> ResolveReport {
    let cos_slope = slope_max.cos();
    let mut report = ResolveReport::default();
    let mut contacts: Vec<CapsuleContact> = Vec::new();

    for _ in 0..max_passes {
        contacts.clear();
        registry.capsule_contacts(*center, radius, half_height, &mut contacts);
        contacts.retain(|c| c.depth > TOUCH_EPSILON);
        if contacts.is_empty() {
            report.converged = true;
            return report;
        }

        // Deepest corrections take effect first; shallower contacts are
        // resolved against the already-corrected pose.
        contacts.sort_by(|a, b| b.depth.total_cmp(&a.depth));

        for contact in &contacts {
            let push = contact.depth + SKIN;
            if contact.normal.y >= cos_slope {
                center.y += push / contact.normal.y;
                report.touched_floor = true;
            } else if contact.normal.y <= -cos_slope {
                center.y += push / contact.normal.y;
                report.touched_ceiling = true;
            } else {
                let horizontal = Vec3::new(contact.normal.x, 0.0, contact.normal.z);
                let length = horizontal.length();
                if length > 1e-4 {
                    *center += horizontal * (push / (length * length));
                    report.touched_wall = true;
                }
            }
        }
    }

    // Final check so the report reflects the end state.
    contacts.clear();
    registry.capsule_contacts(*center, radius, half_height, &mut contacts);
    report.converged = contacts.iter().all(|c| c.depth <= TOUCH_EPSILON);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentKind;
    use glam::Mat4;

    const RADIUS: f32 = 0.25;
    const HALF_HEIGHT: f32 = 0.9;
    const SLOPE_MAX: f32 = 50.0 * std::f32::consts::PI / 180.0;

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

    /// Vertical quad at x = 1 spanning y in [0,4], z in [-4,4], normal -X.
    fn wall_positions() -> Vec<f32> {
        vec![
            1.0, 0.0, -4.0, //
            1.0, 0.0, 4.0, //
            1.0, 4.0, -4.0, //
            1.0, 0.0, 4.0, //
            1.0, 4.0, 4.0, //
            1.0, 4.0, -4.0,
        ]
    }

    fn registry_with(positions: Vec<f32>) -> GeometryRegistry {
        let mut registry = GeometryRegistry::new();
        registry
            .add(1, &positions, None, EnvironmentKind::Static, Mat4::IDENTITY)
            .unwrap();
        registry
    }

    #[test]
    fn test_ground_probe_hit_and_miss() {
        let registry = registry_with(floor_positions());

        let hit = ground_probe(&registry, Vec3::new(0.0, 0.75, 0.0), 1.4).unwrap();
        assert!(hit.point.y.abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-3);

        assert!(ground_probe(&registry, Vec3::new(0.0, 5.0, 0.0), 1.4).is_none());
    }

    #[test]
    fn test_resolver_pushes_out_of_floor() {
        let registry = registry_with(floor_positions());

        // Lower cap 0.3 below the surface.
        let mut center = Vec3::new(0.0, HALF_HEIGHT - 0.3, 0.0);
        let report =
            resolve_capsule(&registry, &mut center, RADIUS, HALF_HEIGHT, SLOPE_MAX, 4);

        assert!(report.touched_floor);
        assert!(report.converged);
        assert!(
            center.y >= HALF_HEIGHT - 1e-3,
            "capsule bottom should clear the floor, center.y = {}",
            center.y
        );
    }

    #[test]
    fn test_resolver_pushes_out_of_wall() {
        let registry = registry_with(wall_positions());

        // Capsule axis 0.1 into the wall's radius.
        let mut center = Vec3::new(1.0 - RADIUS + 0.1, 1.0, 0.0);
        let report =
            resolve_capsule(&registry, &mut center, RADIUS, HALF_HEIGHT, SLOPE_MAX, 4);

        assert!(report.touched_wall);
        assert!(!report.touched_floor);
        assert!(report.converged);
        assert!(
            center.x <= 1.0 - RADIUS + 1e-3,
            "capsule should sit at the wall, center.x = {}",
            center.x
        );
        // Walls never move the capsule vertically.
        assert!((center.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gentle_slope_classifies_as_floor() {
        // 30° ramp around the Z axis: normal is (−sin30, cos30, 0), within
        // the 50° floor cone.
        let tilt = Mat4::from_rotation_z(30.0_f32.to_radians());
        let mut registry = GeometryRegistry::new();
        registry
            .add(1, &floor_positions(), None, EnvironmentKind::Static, tilt)
            .unwrap();

        let mut center = Vec3::new(0.0, HALF_HEIGHT - 0.2, 0.0);
        let report =
            resolve_capsule(&registry, &mut center, RADIUS, HALF_HEIGHT, SLOPE_MAX, 4);
        assert!(report.touched_floor);
        assert!(!report.touched_wall);
    }

    #[test]
    fn test_corner_converges() {
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
            .add(2, &wall_positions(), None, EnvironmentKind::Static, Mat4::IDENTITY)
            .unwrap();

        // Overlapping both the floor and the wall.
        let mut center = Vec3::new(1.0 - RADIUS + 0.05, HALF_HEIGHT - 0.1, 0.0);
        let report =
            resolve_capsule(&registry, &mut center, RADIUS, HALF_HEIGHT, SLOPE_MAX, 4);

        assert!(report.converged);
        assert!(report.touched_floor);
        assert!(report.touched_wall);
        assert!(center.y >= HALF_HEIGHT - 1e-3);
        assert!(center.x <= 1.0 - RADIUS + 1e-3);
    }

    #[test]
    fn test_clear_capsule_reports_converged() {
        let registry = registry_with(floor_positions());
        let mut center = Vec3::new(0.0, 3.0, 0.0);
        let before = center;
        let report =
            resolve_capsule(&registry, &mut center, RADIUS, HALF_HEIGHT, SLOPE_MAX, 4);
        assert!(report.converged);
        assert!(!report.touched_floor && !report.touched_wall && !report.touched_ceiling);
        assert_eq!(center, before);
    }
}
