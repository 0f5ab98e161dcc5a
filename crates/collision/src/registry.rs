//! Geometry registry: the handle → environment map and its world-space
//! queries.
//!
//! Handles are chosen by the host, so everything is validated at insertion.
//! Iteration is in sorted handle order to keep query results deterministic.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use parry3d::math::{Isometry, Point, Vector};
use parry3d::query::{self, Ray, RayCast};
use parry3d::shape::{Capsule, Triangle as ParryTriangle};
use thiserror::Error;

use crate::aabb::Aabb;
use crate::environment::{is_valid_affine, Environment, EnvironmentKind, GeometryFault};
use crate::TOUCH_EPSILON;

/// Host-chosen environment identifier.
pub type EnvironmentHandle = u32;

/// Handles must survive a round-trip through an `f32` wire slot, so they are
/// capped at 2^24 − 1.
pub const MAX_HANDLE: EnvironmentHandle = (1 << 24) - 1;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("environment handle {0} is already registered")]
    DuplicateHandle(EnvironmentHandle),

    #[error("unknown environment handle {0}")]
    UnknownHandle(EnvironmentHandle),

    #[error("environment handle {0} exceeds the wire-safe range")]
    HandleOutOfRange(EnvironmentHandle),

    #[error("world matrix is not an invertible affine transform")]
    InvalidMatrix,

    #[error("invalid geometry: {0:?}")]
    InvalidGeometry(GeometryFault),
}

/// Closest intersection of a world-space segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHit {
    /// Hit point in world space.
    pub point: Vec3,
    /// Unit surface normal in world space, facing the query.
    pub normal: Vec3,
    /// Segment parameter of the hit, in `[0, 1]`.
    pub t: f32,
    /// Environment that owns the hit triangle.
    pub environment: EnvironmentHandle,
}

/// One capsule–triangle contact found by the overlap query.
#[derive(Debug, Clone, Copy)]
pub struct CapsuleContact {
    /// Contact point on the triangle, world space.
    pub point: Vec3,
    /// Unit triangle winding normal, world space.
    pub normal: Vec3,
    /// Penetration depth; zero for grazing contact.
    pub depth: f32,
    pub environment: EnvironmentHandle,
}

#[derive(Debug, Default)]
pub struct GeometryRegistry {
    environments: BTreeMap<EnvironmentHandle, Environment>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new environment.
    ///
    /// Validates the handle range, the world matrix, and the geometry before
    /// anything is stored; on success the BVH is built and the environment is
    /// immediately queryable.
    pub fn add(
        &mut self,
        handle: EnvironmentHandle,
        positions: &[f32],
        indices: Option<&[u32]>,
        kind: EnvironmentKind,
        world_from_local: Mat4,
    ) -> Result<(), RegistryError> {
        if handle > MAX_HANDLE {
            return Err(RegistryError::HandleOutOfRange(handle));
        }
        if self.environments.contains_key(&handle) {
            return Err(RegistryError::DuplicateHandle(handle));
        }
        if !is_valid_affine(&world_from_local) {
            return Err(RegistryError::InvalidMatrix);
        }
        let environment = Environment::new(positions, indices, kind, world_from_local)
            .map_err(RegistryError::InvalidGeometry)?;
        self.environments.insert(handle, environment);
        Ok(())
    }

    /// Remove an environment. Absent handles are a no-op; returns whether
    /// anything was removed.
    pub fn remove(&mut self, handle: EnvironmentHandle) -> bool {
        self.environments.remove(&handle).is_some()
    }

    /// Replace an environment's world transform. Valid for any kind.
    ///
    /// On an invalid matrix the previous transform is retained.
    pub fn update_transform(
        &mut self,
        handle: EnvironmentHandle,
        world_from_local: Mat4,
    ) -> Result<(), RegistryError> {
        if !is_valid_affine(&world_from_local) {
            return Err(RegistryError::InvalidMatrix);
        }
        let environment = self
            .environments
            .get_mut(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        environment.set_transform(world_from_local);
        Ok(())
    }

    /// Rotate every kinematic environment's previous-transform slot up to its
    /// current transform. Called once per tick boundary.
    pub fn rotate_kinematic_history(&mut self) {
        for environment in self.environments.values_mut() {
            if environment.kind() == EnvironmentKind::Kinematic {
                environment.rotate_history();
            }
        }
    }

    /// World-space movement of a kinematic environment over the current tick.
    /// `None` for static or unknown handles.
    pub fn kinematic_delta(&self, handle: EnvironmentHandle) -> Option<Mat4> {
        let environment = self.environments.get(&handle)?;
        (environment.kind() == EnvironmentKind::Kinematic).then(|| environment.transform_delta())
    }

    pub fn get(&self, handle: EnvironmentHandle) -> Option<&Environment> {
        self.environments.get(&handle)
    }

    pub fn contains(&self, handle: EnvironmentHandle) -> bool {
        self.environments.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Environments in sorted handle order.
    pub fn iter(&self) -> impl Iterator<Item = (EnvironmentHandle, &Environment)> {
        self.environments.iter().map(|(&h, e)| (h, e))
    }

    /// Closest intersection of the world-space segment `start → end` across
    /// all environments.
    pub fn cast_segment(&self, start: Vec3, end: Vec3) -> Option<SegmentHit> {
        self.cast_segment_where(start, end, |_| true)
    }

    /// As [`cast_segment`](Self::cast_segment), restricted to the given
    /// (sorted) handle set. Used by the trajectory sampler's prefilter.
    pub fn cast_segment_among(
        &self,
        handles: &[EnvironmentHandle],
        start: Vec3,
        end: Vec3,
    ) -> Option<SegmentHit> {
        self.cast_segment_where(start, end, |h| handles.binary_search(&h).is_ok())
    }

    fn cast_segment_where(
        &self,
        start: Vec3,
        end: Vec3,
        mut include: impl FnMut(EnvironmentHandle) -> bool,
    ) -> Option<SegmentHit> {
        let mut best: Option<SegmentHit> = None;
        let mut best_t = 1.0_f32;

        for (&handle, environment) in &self.environments {
            if !include(handle) {
                continue;
            }

            let local_start = environment.local_from_world().transform_point3(start);
            let local_end = environment.local_from_world().transform_point3(end);
            let local_dir = local_end - local_start;
            if local_dir.length_squared() < 1e-12 {
                continue;
            }

            // Segments keep their parameterization under affine maps, so the
            // local-space toi is directly the world-space t.
            let ray = Ray::new(
                Point::new(local_start.x, local_start.y, local_start.z),
                Vector::new(local_dir.x, local_dir.y, local_dir.z),
            );

            let triangles = environment.triangles();
            let mut local_hit: Option<(f32, Vec3)> = None;
            environment
                .bvh()
                .cast_segment(local_start, local_dir, best_t, &mut |index, bound| {
                    let triangle = &triangles[index as usize];
                    if triangle.is_degenerate() {
                        return None;
                    }
                    let shape = ParryTriangle::new(
                        Point::new(triangle.a.x, triangle.a.y, triangle.a.z),
                        Point::new(triangle.b.x, triangle.b.y, triangle.b.z),
                        Point::new(triangle.c.x, triangle.c.y, triangle.c.z),
                    );
                    let intersection = shape.cast_local_ray_and_get_normal(&ray, bound, true)?;
                    let t = intersection.time_of_impact;
                    if t >= bound {
                        return None;
                    }
                    let normal = Vec3::new(
                        intersection.normal.x,
                        intersection.normal.y,
                        intersection.normal.z,
                    );
                    local_hit = Some((t, normal));
                    Some(t)
                });

            if let Some((t, local_normal)) = local_hit {
                if t < best_t {
                    best_t = t;
                    best = Some(SegmentHit {
                        point: start + (end - start) * t,
                        normal: environment.normal_to_world(local_normal),
                        t,
                        environment: handle,
                    });
                }
            }
        }

        best
    }

    /// Collect every capsule–triangle contact within the touch epsilon.
    ///
    /// The capsule is vertical and given by its center, radius, and
    /// half-height (center to cap apex). Broad phase runs per environment in
    /// local space through the cached inverse; narrow phase runs in world
    /// space against the transformed triangle.
    pub fn capsule_contacts(
        &self,
        center: Vec3,
        radius: f32,
        half_height: f32,
        out: &mut Vec<CapsuleContact>,
    ) {
        let cylinder_half = (half_height - radius).max(0.0);
        let capsule = Capsule::new_y(cylinder_half, radius);
        let capsule_pos = Isometry::translation(center.x, center.y, center.z);
        let identity = Isometry::identity();

        let world_bounds = Aabb::from_center_half_extents(
            center,
            Vec3::new(radius, half_height, radius),
        )
        .grown(TOUCH_EPSILON * 4.0);

        for (&handle, environment) in &self.environments {
            let local_bounds = world_bounds.transformed(environment.local_from_world());
            let world_from_local = *environment.world_from_local();
            let triangles = environment.triangles();

            environment.bvh().for_each_overlap(&local_bounds, &mut |index| {
                let triangle = &triangles[index as usize];
                let world = crate::environment::Triangle {
                    a: world_from_local.transform_point3(triangle.a),
                    b: world_from_local.transform_point3(triangle.b),
                    c: world_from_local.transform_point3(triangle.c),
                };
                if world.is_degenerate() {
                    return;
                }

                let shape = ParryTriangle::new(
                    Point::new(world.a.x, world.a.y, world.a.z),
                    Point::new(world.b.x, world.b.y, world.b.z),
                    Point::new(world.c.x, world.c.y, world.c.z),
                );

                if let Ok(Some(contact)) =
                    query::contact(&capsule_pos, &capsule, &identity, &shape, TOUCH_EPSILON)
                {
                    if contact.dist < TOUCH_EPSILON {
                        out.push(CapsuleContact {
                            point: Vec3::new(
                                contact.point2.x,
                                contact.point2.y,
                                contact.point2.z,
                            ),
                            normal: world.scaled_normal().normalize_or_zero(),
                            depth: (-contact.dist).max(0.0),
                            environment: handle,
                        });
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two triangles covering [-10,10]² at y = 0, CCW seen from above.
    pub(crate) fn floor_positions() -> Vec<f32> {
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

    #[test]
    fn test_add_remove_lifecycle() {
        let mut registry = registry_with_floor();
        assert!(registry.contains(1));

        let duplicate = registry.add(
            1,
            &floor_positions(),
            None,
            EnvironmentKind::Static,
            Mat4::IDENTITY,
        );
        assert!(matches!(duplicate, Err(RegistryError::DuplicateHandle(1))));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(1));
        assert!(!registry.remove(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handle_range_and_matrix_rejection() {
        let mut registry = GeometryRegistry::new();
        let oversized = registry.add(
            MAX_HANDLE + 1,
            &floor_positions(),
            None,
            EnvironmentKind::Static,
            Mat4::IDENTITY,
        );
        assert!(matches!(oversized, Err(RegistryError::HandleOutOfRange(_))));

        let singular = registry.add(
            2,
            &floor_positions(),
            None,
            EnvironmentKind::Static,
            Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)),
        );
        assert!(matches!(singular, Err(RegistryError::InvalidMatrix)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_transform_unknown_and_invalid() {
        let mut registry = registry_with_floor();
        assert!(matches!(
            registry.update_transform(99, Mat4::IDENTITY),
            Err(RegistryError::UnknownHandle(99))
        ));

        // Invalid matrix leaves the previous transform in place.
        let bad = Mat4::from_scale(Vec3::ZERO);
        assert!(registry.update_transform(1, bad).is_err());
        let hit = registry
            .cast_segment(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .unwrap();
        assert!(hit.point.y.abs() < 1e-5);
    }

    #[test]
    fn test_cast_segment_hits_floor() {
        let registry = registry_with_floor();
        let hit = registry
            .cast_segment(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, -2.0, 3.0))
            .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-4);
        assert!(hit.point.y.abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-3);
        assert_eq!(hit.environment, 1);
    }

    #[test]
    fn test_cast_segment_closest_across_environments() {
        let mut registry = registry_with_floor();
        // Second floor higher up; the downward segment must report it, not
        // the lower one.
        registry
            .add(
                2,
                &floor_positions(),
                None,
                EnvironmentKind::Static,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap();

        let hit = registry
            .cast_segment(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .unwrap();
        assert_eq!(hit.environment, 2);
        assert!((hit.point.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cast_segment_among_filters() {
        let mut registry = registry_with_floor();
        registry
            .add(
                2,
                &floor_positions(),
                None,
                EnvironmentKind::Static,
                Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap();

        let hit = registry
            .cast_segment_among(&[1], Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .unwrap();
        assert_eq!(hit.environment, 1);
    }

    #[test]
    fn test_scaled_environment_normals_stay_unit() {
        let mut registry = GeometryRegistry::new();
        registry
            .add(
                7,
                &floor_positions(),
                None,
                EnvironmentKind::Static,
                Mat4::from_scale(Vec3::new(3.0, 1.0, 0.5)),
            )
            .unwrap();

        let hit = registry
            .cast_segment(Vec3::new(2.0, 1.0, 1.0), Vec3::new(2.0, -1.0, 1.0))
            .unwrap();
        assert!((hit.normal.length() - 1.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-3);
    }

    #[test]
    fn test_capsule_contacts_report_penetration() {
        let registry = registry_with_floor();

        // Capsule center 0.5 above the floor with half-height 0.9: the lower
        // cap reaches 0.4 below the surface.
        let mut contacts = Vec::new();
        registry.capsule_contacts(Vec3::new(0.0, 0.5, 0.0), 0.25, 0.9, &mut contacts);
        assert!(!contacts.is_empty());
        let deepest = contacts
            .iter()
            .map(|c| c.depth)
            .fold(0.0_f32, f32::max);
        assert!(
            (deepest - 0.4).abs() < 0.02,
            "expected ~0.4 penetration, got {deepest}"
        );
        assert!(contacts.iter().all(|c| (c.normal - Vec3::Y).length() < 1e-3));

        // Well clear of the floor: no contacts.
        contacts.clear();
        registry.capsule_contacts(Vec3::new(0.0, 5.0, 0.0), 0.25, 0.9, &mut contacts);
        assert!(contacts.is_empty());
    }
}
