//! Per-environment geometry records.
//!
//! An environment is a triangle soup in local space plus a world transform.
//! The BVH is built once at insertion; kinematic movement only swaps the
//! transform, keeping the hot query paths allocation-free.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::bvh::Bvh;
use crate::DEGENERATE_AREA_SQ;

/// How an environment moves, if at all.
///
/// Kinematic environments are repositioned by the host every frame through
/// transform updates; their vertex data is as immutable as a static mesh's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentKind {
    Static,
    Kinematic,
}

/// One triangle in environment-local space.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points([self.a, self.b, self.c])
    }

    /// Unnormalized winding normal (CCW front face).
    pub fn scaled_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    /// True when the triangle has (numerically) no area.
    pub fn is_degenerate(&self) -> bool {
        self.scaled_normal().length_squared() < DEGENERATE_AREA_SQ
    }
}

/// Reasons an environment payload is rejected at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryFault {
    /// Fewer than three vertices, or a count that is not a multiple of three.
    BadVertexCount,
    /// A vertex coordinate is NaN or infinite.
    NonFiniteVertex,
    /// Index array length is not a multiple of three, or an index is out of
    /// bounds.
    BadIndices,
}

#[derive(Debug)]
pub struct Environment {
    triangles: Vec<Triangle>,
    bvh: Bvh,
    kind: EnvironmentKind,
    world_from_local: Mat4,
    local_from_world: Mat4,
    /// Inverse-transpose of the upper 3×3; maps local normals to world.
    normal_from_local: Mat3,
    /// World transform as of the last tick boundary.
    prev_world_from_local: Mat4,
}

impl Environment {
    /// Build from a flat position array (xyz triplets) and optional indices.
    ///
    /// With no indices every three consecutive vertices form a triangle.
    /// The world matrix must already have been validated by the caller.
    pub fn new(
        positions: &[f32],
        indices: Option<&[u32]>,
        kind: EnvironmentKind,
        world_from_local: Mat4,
    ) -> Result<Self, GeometryFault> {
        let vertices = parse_vertices(positions)?;
        let triangles = assemble_triangles(&vertices, indices)?;

        let triangle_bounds: Vec<Aabb> = triangles.iter().map(Triangle::bounds).collect();
        let bvh = Bvh::build(&triangle_bounds);

        let local_from_world = world_from_local.inverse();
        let normal_from_local = Mat3::from_mat4(world_from_local).inverse().transpose();

        Ok(Self {
            triangles,
            bvh,
            kind,
            world_from_local,
            local_from_world,
            normal_from_local,
            prev_world_from_local: world_from_local,
        })
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn world_from_local(&self) -> &Mat4 {
        &self.world_from_local
    }

    pub fn local_from_world(&self) -> &Mat4 {
        &self.local_from_world
    }

    /// Map a local-space normal to a unit world-space normal.
    pub fn normal_to_world(&self, local_normal: Vec3) -> Vec3 {
        (self.normal_from_local * local_normal).normalize_or_zero()
    }

    /// Conservative world-space bounds of the whole mesh.
    pub fn world_bounds(&self) -> Aabb {
        self.bvh.bounds().transformed(&self.world_from_local)
    }

    /// Replace the world transform, refreshing the cached inverses.
    ///
    /// The previous-transform slot is left alone; it rotates only at tick
    /// boundaries so the per-tick kinematic delta spans exactly one tick.
    pub fn set_transform(&mut self, world_from_local: Mat4) {
        self.world_from_local = world_from_local;
        self.local_from_world = world_from_local.inverse();
        self.normal_from_local = Mat3::from_mat4(world_from_local).inverse().transpose();
    }

    /// World-space movement of this environment since the last tick boundary.
    pub fn transform_delta(&self) -> Mat4 {
        self.world_from_local * self.prev_world_from_local.inverse()
    }

    /// Rotate the previous-transform slot up to the current transform.
    pub fn rotate_history(&mut self) {
        self.prev_world_from_local = self.world_from_local;
    }
}

/// Check that a wire matrix is a usable affine transform: finite entries, an
/// affine bottom row, and an invertible linear part.
pub fn is_valid_affine(matrix: &Mat4) -> bool {
    if !matrix.is_finite() {
        return false;
    }
    let row = matrix.row(3);
    if row.x.abs() > 1e-4 || row.y.abs() > 1e-4 || row.z.abs() > 1e-4 || (row.w - 1.0).abs() > 1e-4
    {
        return false;
    }
    Mat3::from_mat4(*matrix).determinant().abs() > 1e-8
}

fn parse_vertices(positions: &[f32]) -> Result<Vec<Vec3>, GeometryFault> {
    if positions.len() < 9 || positions.len() % 3 != 0 {
        return Err(GeometryFault::BadVertexCount);
    }
    if positions.iter().any(|v| !v.is_finite()) {
        return Err(GeometryFault::NonFiniteVertex);
    }
    Ok(positions
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect())
}

fn assemble_triangles(
    vertices: &[Vec3],
    indices: Option<&[u32]>,
) -> Result<Vec<Triangle>, GeometryFault> {
    match indices {
        Some(indices) => {
            if indices.is_empty() || indices.len() % 3 != 0 {
                return Err(GeometryFault::BadIndices);
            }
            if indices.iter().any(|&i| i as usize >= vertices.len()) {
                return Err(GeometryFault::BadIndices);
            }
            Ok(indices
                .chunks_exact(3)
                .map(|tri| Triangle {
                    a: vertices[tri[0] as usize],
                    b: vertices[tri[1] as usize],
                    c: vertices[tri[2] as usize],
                })
                .collect())
        }
        None => {
            if vertices.len() % 3 != 0 {
                return Err(GeometryFault::BadVertexCount);
            }
            Ok(vertices
                .chunks_exact(3)
                .map(|tri| Triangle {
                    a: tri[0],
                    b: tri[1],
                    c: tri[2],
                })
                .collect())
        }
    }
}
