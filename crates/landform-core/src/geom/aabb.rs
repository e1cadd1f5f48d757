use glam::DVec3;

/// Axis-aligned bounding box. `IsEmpty` iff any `min[i] > max[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: DVec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        max: DVec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut b = Aabb::EMPTY;
        for p in points {
            b.extend(p);
        }
        b
    }

    pub fn extend(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    /// Euclidean length of the box diagonal, used as the tile-extent metric in §4.H.
    pub fn diagonal(&self) -> f64 {
        self.extent().length()
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Allows `other` to overshoot this box by up to `eps` per axis.
    pub fn fuzzy_contains(&self, other: &Aabb, eps: f64) -> bool {
        if other.is_empty() {
            return true;
        }
        other.min.x >= self.min.x - eps
            && other.min.y >= self.min.y - eps
            && other.min.z >= self.min.z - eps
            && other.max.x <= self.max.x + eps
            && other.max.y <= self.max.y + eps
            && other.max.z <= self.max.z + eps
    }

    /// Splits this box into up to 8 children per the given flags on each axis.
    /// `split_x`/`split_y`/`split_z` select whether that axis is bisected.
    pub fn octant_children(&self, split_x: bool, split_y: bool, split_z: bool) -> Vec<Aabb> {
        let c = self.center();
        let xs: &[(f64, f64)] = if split_x {
            &[(0.0, 1.0), (1.0, 2.0)]
        } else {
            &[(0.0, 2.0)]
        };
        let ys: &[(f64, f64)] = if split_y {
            &[(0.0, 1.0), (1.0, 2.0)]
        } else {
            &[(0.0, 2.0)]
        };
        let zs: &[(f64, f64)] = if split_z {
            &[(0.0, 1.0), (1.0, 2.0)]
        } else {
            &[(0.0, 2.0)]
        };
        let lerp_axis = |lo: f64, hi: f64, t0: f64, t1: f64| (lo + (hi - lo) * t0 / 2.0, lo + (hi - lo) * t1 / 2.0);
        let mut out = Vec::with_capacity(xs.len() * ys.len() * zs.len());
        for &(x0, x1) in xs {
            for &(y0, y1) in ys {
                for &(z0, z1) in zs {
                    let (xmin, xmax) = lerp_axis(self.min.x, self.max.x, x0, x1);
                    let (ymin, ymax) = lerp_axis(self.min.y, self.max.y, y0, y1);
                    let (zmin, zmax) = lerp_axis(self.min.z, self.max.z, z0, z1);
                    let _ = c;
                    out.push(Aabb::new(DVec3::new(xmin, ymin, zmin), DVec3::new(xmax, ymax, zmax)));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_has_no_extent() {
        assert!(Aabb::EMPTY.is_empty());
    }

    #[test]
    fn fuzzy_contains_allows_small_overshoot() {
        let a = Aabb::new(DVec3::ZERO, DVec3::splat(1.0));
        let b = Aabb::new(DVec3::splat(-1e-6), DVec3::splat(1.0 + 1e-6));
        assert!(a.fuzzy_contains(&b, 1e-5));
        assert!(!a.fuzzy_contains(&b, 1e-9));
    }

    #[test]
    fn octree_children_cover_parent() {
        let a = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let children = a.octant_children(true, true, true);
        assert_eq!(children.len(), 8);
        let union = children.iter().fold(Aabb::EMPTY, |acc, c| acc.union(c));
        assert_eq!(union, a);
    }
}
