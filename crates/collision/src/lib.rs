//! Stride Collision
//!
//! Geometry registry and collision queries for the locomotion engine.
//!
//! The world is a set of *environments*: indexed triangle meshes keyed by a
//! host-chosen integer handle. Each environment carries an immutable BVH
//! built over its local-space triangles at insertion time plus a mutable
//! world transform, so moving platforms are handled by updating a single
//! matrix rather than touching vertex data.
//!
//! Queries (segment casts, capsule overlap, parabolic arcs) are issued in
//! world space. Internally each environment transforms the query into its
//! local space through a cached inverse, traverses its BVH, and reports
//! hits back in world space with inverse-transpose-mapped normals.

pub mod aabb;
pub mod bvh;
pub mod environment;
pub mod query;
pub mod registry;
pub mod trajectory;

pub use aabb::Aabb;
pub use bvh::Bvh;
pub use environment::{Environment, EnvironmentKind, Triangle};
pub use query::{resolve_capsule, ground_probe, ResolveReport};
pub use registry::{
    CapsuleContact, EnvironmentHandle, GeometryRegistry, RegistryError, SegmentHit,
};
pub use trajectory::{parabolic_raycast, ArcHit, ArcParams};

/// Contact-distance epsilon: separations smaller than this count as touching.
pub const TOUCH_EPSILON: f32 = 1e-4;

/// Triangles with squared area below this are skipped by every query.
pub const DEGENERATE_AREA_SQ: f32 = 1e-12;
