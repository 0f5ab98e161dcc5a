//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};

/// An axis-aligned box, stored as component-wise min/max corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The inverted box: unions with it leave the other operand unchanged.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut out = Self::EMPTY;
        for p in points {
            out.min = out.min.min(p);
            out.max = out.max.max(p);
        }
        out
    }

    /// Box centered on `center` with the given half-extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Box grown by `pad` on every side.
    pub fn grown(&self, pad: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(pad),
            max: self.max + Vec3::splat(pad),
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Conservative bounds of this box mapped through an affine matrix.
    ///
    /// Transforms the eight corners and re-fits, so the result is axis
    /// aligned in the target space and never smaller than the true image.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_point(matrix.transform_point3(corner));
        }
        out
    }

    /// Entry parameter of the segment `origin + t * dir`, `t` in `[0, max_t]`.
    ///
    /// Slab test per axis; rays parallel to a slab are rejected outright when
    /// the origin lies outside it. Returns `None` when the segment misses.
    pub fn segment_entry(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Option<f32> {
        let mut t_near = 0.0_f32;
        let mut t_far = max_t;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let slab_min = self.min[axis];
            let slab_max = self.max[axis];
            if d.abs() < 1e-8 {
                if o < slab_min || o > slab_max {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (slab_min - o) * inv;
            let mut t1 = (slab_max - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_far < t_near {
                return None;
            }
        }
        Some(t_near)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_overlap() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(2.0));
        assert!(a.intersects(&b));

        let c = Aabb::new(Vec3::splat(3.0), Vec3::splat(4.0));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_segment_entry_hit_and_miss() {
        let b = Aabb::new(Vec3::new(2.0, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0));

        // Straight shot along +X enters at t = 0.2 for a 10-unit segment.
        let t = b
            .segment_entry(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0)
            .unwrap();
        assert!((t - 0.2).abs() < 1e-5);

        // Pointing away.
        assert!(b
            .segment_entry(Vec3::ZERO, Vec3::new(-10.0, 0.0, 0.0), 1.0)
            .is_none());

        // Parallel to the X slabs and outside them.
        assert!(b
            .segment_entry(Vec3::new(0.0, 5.0, 0.0), Vec3::new(10.0, 0.0, 0.0), 1.0)
            .is_none());
    }

    #[test]
    fn test_segment_entry_starts_inside() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = b
            .segment_entry(Vec3::ZERO, Vec3::new(0.0, -5.0, 0.0), 1.0)
            .unwrap();
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_transformed_is_conservative() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let m = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let t = b.transformed(&m);
        assert_eq!(t.min, Vec3::new(4.0, -1.0, -1.0));
        assert_eq!(t.max, Vec3::new(6.0, 1.0, 1.0));

        // A rotated box still contains the image of every corner.
        let m = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let t = b.transformed(&m);
        let corner = m.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(t.min.x <= corner.x && corner.x <= t.max.x);
        assert!(t.min.z <= corner.z && corner.z <= t.max.z);
    }
}
