use std::collections::{HashSet, VecDeque};

use crate::geom::Aabb;
use crate::tiler::tile_node::{TileId, TileNode};

/// Subdivision strategy a branch uses when a split criterion fires
/// (spec.md §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingScheme {
    /// 2x2x2 split across all three axes.
    Octree,
    /// 2x2x1 split across the two dominant horizontal axes.
    Quadtree,
    /// Quad split across whichever two axes currently have the largest extent.
    QuadAuto,
    /// Not subdivided; the tree is a single flat level of user-supplied tiles.
    UserDefined,
}

impl TilingScheme {
    fn child_boxes(&self, bounds: &Aabb) -> Vec<Aabb> {
        match self {
            TilingScheme::Octree => bounds.octant_children(true, true, true),
            TilingScheme::Quadtree => bounds.octant_children(true, true, false),
            TilingScheme::QuadAuto => {
                let extent = bounds.extent();
                // Split the two largest-extent axes, leave the smallest whole.
                let mut axes = [(extent.x, 0), (extent.y, 1), (extent.z, 2)];
                axes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
                let smallest_axis = axes[0].1;
                bounds.octant_children(smallest_axis != 0, smallest_axis != 1, smallest_axis != 2)
            }
            TilingScheme::UserDefined => Vec::new(),
        }
    }
}

/// Abstraction over "the meshes contributing to this tile tree", queried by
/// candidate bounds during construction. A single concrete implementation
/// (backed by chunk meshes) lives in the `landform-tiler` crate; this trait
/// is the seam `bounds_tree` needs to stay mesh-library-only.
pub trait TileMeshSource {
    /// Union, across every input, of that input's geometry clipped to `bounds`.
    fn clipped_mesh_bounds(&self, bounds: &Aabb) -> Aabb;
    fn count_faces(&self, bounds: &Aabb) -> usize;
    fn clipped_surface_area(&self, bounds: &Aabb) -> f64;
    /// Texture resolution (longest edge, pixels) required to texture this
    /// bounds at the configured texel density.
    fn required_texture_resolution(&self, bounds: &Aabb) -> u32;
}

/// One entry in a node's ordered split-criteria list (spec.md §4.H). Returns
/// `Some(reason)` the first criterion that triggers a split; `None` means
/// "this criterion doesn't want to split".
pub trait TileSplitCriteria: std::fmt::Debug {
    fn should_split(&self, bounds: &Aabb, source: &dyn TileMeshSource) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct FaceSplitCriteria {
    pub max_faces: usize,
}

impl TileSplitCriteria for FaceSplitCriteria {
    fn should_split(&self, bounds: &Aabb, source: &dyn TileMeshSource) -> Option<String> {
        let count = source.count_faces(bounds);
        (count > self.max_faces).then(|| format!("face count {count} exceeds {}", self.max_faces))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AreaSplitCriteria {
    pub max_leaf_area: f64,
}

impl TileSplitCriteria for AreaSplitCriteria {
    fn should_split(&self, bounds: &Aabb, source: &dyn TileMeshSource) -> Option<String> {
        let area = source.clipped_surface_area(bounds);
        (area > self.max_leaf_area).then(|| format!("surface area {area} exceeds {}", self.max_leaf_area))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextureSplitCriteria {
    pub max_tile_resolution: u32,
}

impl TileSplitCriteria for TextureSplitCriteria {
    fn should_split(&self, bounds: &Aabb, source: &dyn TileMeshSource) -> Option<String> {
        let res = source.required_texture_resolution(bounds);
        (res > self.max_tile_resolution)
            .then(|| format!("required texture resolution {res} exceeds {}", self.max_tile_resolution))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTreeLimits {
    pub min_tile_extent: f64,
    pub max_depth: usize,
}

/// Builds the full tile tree from the union of all input bounds, per
/// spec.md §4.H. `surface_region`, when set, switches a node wholly outside
/// it over to `orbital_criteria` (a usually-relaxed set, skipping texture
/// splits) to avoid over-subdividing distant low-detail terrain.
#[allow(clippy::too_many_arguments)]
pub fn build_bounds_tree(
    project: &str,
    source: &dyn TileMeshSource,
    root_bounds: Aabb,
    scheme: TilingScheme,
    surface_criteria: &[Box<dyn TileSplitCriteria>],
    orbital_criteria: &[Box<dyn TileSplitCriteria>],
    surface_region: Option<Aabb>,
    limits: BoundsTreeLimits,
) -> Vec<TileNode> {
    let mut nodes = Vec::new();
    let root_id = TileId::root();
    let mut queue = VecDeque::new();
    queue.push_back((root_id.clone(), None::<TileId>, root_bounds, 0usize));

    let mut leaf_ids: HashSet<TileId> = HashSet::new();

    while let Some((id, parent_id, bounds, depth)) = queue.pop_front() {
        let wholly_orbital = surface_region
            .map(|region| !region.intersects(&bounds))
            .unwrap_or(false);
        let criteria = if wholly_orbital { orbital_criteria } else { surface_criteria };

        let stop_for_limits = bounds.diagonal() <= limits.min_tile_extent
            || depth >= limits.max_depth
            || scheme == TilingScheme::UserDefined;

        let split_reason = if stop_for_limits {
            None
        } else {
            criteria.iter().find_map(|c| c.should_split(&bounds, source))
        };

        if split_reason.is_none() {
            nodes.push(TileNode::new_leaf(id.clone(), project.to_string(), parent_id.clone(), bounds));
            leaf_ids.insert(id.clone());
            continue;
        }

        let candidate_boxes = scheme.child_boxes(&bounds);
        let mut tightened: Vec<(u8, Aabb)> = Vec::new();
        for (i, candidate) in candidate_boxes.into_iter().enumerate() {
            let tight = source.clipped_mesh_bounds(&candidate);
            if !tight.is_empty() {
                tightened.push((i as u8, tight));
            }
        }

        if tightened.len() < 2 {
            // Split abandoned: not enough non-empty children to justify it.
            nodes.push(TileNode::new_leaf(id.clone(), project.to_string(), parent_id.clone(), bounds));
            leaf_ids.insert(id.clone());
            continue;
        }

        let depends_on: HashSet<TileId> = tightened.iter().map(|(i, _)| id.child(*i)).collect();
        nodes.push(TileNode::new_internal(
            id.clone(),
            project.to_string(),
            parent_id,
            bounds,
            depends_on,
        ));

        for (i, child_bounds) in tightened {
            queue.push_back((id.child(i), Some(id.clone()), child_bounds, depth + 1));
        }
    }

    link_depended_on_by(&mut nodes);
    nodes
}

fn link_depended_on_by(nodes: &mut [TileNode]) {
    let edges: Vec<(TileId, TileId)> = nodes
        .iter()
        .flat_map(|n| n.depends_on.iter().map(move |child| (child.clone(), n.id.clone())))
        .collect();
    for (child, parent) in edges {
        if let Some(node) = nodes.iter_mut().find(|n| n.id == child) {
            node.depended_on_by.insert(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    struct UniformSource {
        faces_per_unit_volume: f64,
        total_bounds: Aabb,
    }

    impl TileMeshSource for UniformSource {
        fn clipped_mesh_bounds(&self, bounds: &Aabb) -> Aabb {
            if bounds.intersects(&self.total_bounds) {
                Aabb::new(bounds.min.max(self.total_bounds.min), bounds.max.min(self.total_bounds.max))
            } else {
                Aabb::EMPTY
            }
        }

        fn count_faces(&self, bounds: &Aabb) -> usize {
            let e = bounds.extent();
            (e.x * e.y * e.z * self.faces_per_unit_volume).round() as usize
        }

        fn clipped_surface_area(&self, bounds: &Aabb) -> f64 {
            let e = bounds.extent();
            2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
        }

        fn required_texture_resolution(&self, _bounds: &Aabb) -> u32 {
            256
        }
    }

    #[test]
    fn s5_face_split_creates_octree_children() {
        // spec.md S5: a dense uniform source over an 8-unit cube with a low
        // max_faces threshold should split exactly once into 8 children.
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let source = UniformSource {
            faces_per_unit_volume: 100.0,
            total_bounds: bounds,
        };
        let criteria: Vec<Box<dyn TileSplitCriteria>> = vec![Box::new(FaceSplitCriteria { max_faces: 50 })];
        let nodes = build_bounds_tree(
            "proj",
            &source,
            bounds,
            TilingScheme::Octree,
            &criteria,
            &criteria,
            None,
            BoundsTreeLimits {
                min_tile_extent: 0.1,
                max_depth: 1,
            },
        );
        let root = nodes.iter().find(|n| n.id.is_root()).unwrap();
        assert!(!root.is_leaf);
        assert_eq!(root.depends_on.len(), 8);
        let leaves: Vec<_> = nodes.iter().filter(|n| n.is_leaf).collect();
        assert_eq!(leaves.len(), 8);
    }

    #[test]
    fn min_tile_extent_stops_subdivision() {
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let source = UniformSource {
            faces_per_unit_volume: 1_000_000.0,
            total_bounds: bounds,
        };
        let criteria: Vec<Box<dyn TileSplitCriteria>> = vec![Box::new(FaceSplitCriteria { max_faces: 1 })];
        let nodes = build_bounds_tree(
            "proj",
            &source,
            bounds,
            TilingScheme::Octree,
            &criteria,
            &criteria,
            None,
            BoundsTreeLimits {
                min_tile_extent: 3.0,
                max_depth: 10,
            },
        );
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf);
    }

    #[test]
    fn depended_on_by_is_populated_from_parent_depends_on() {
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let source = UniformSource {
            faces_per_unit_volume: 100.0,
            total_bounds: bounds,
        };
        let criteria: Vec<Box<dyn TileSplitCriteria>> = vec![Box::new(FaceSplitCriteria { max_faces: 50 })];
        let nodes = build_bounds_tree(
            "proj",
            &source,
            bounds,
            TilingScheme::Octree,
            &criteria,
            &criteria,
            None,
            BoundsTreeLimits {
                min_tile_extent: 0.1,
                max_depth: 1,
            },
        );
        let child = nodes.iter().find(|n| n.id.0 == "root0").unwrap();
        assert!(child.depended_on_by.contains(&TileId::root()));
    }
}
