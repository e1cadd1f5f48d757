use dashmap::DashMap;
use serde::Serialize;

use landform_core::geom::Aabb;
use landform_core::tiler::{TileId, TileNode};

/// One entry of the hierarchical manifest `BuildTilesetJson` emits
/// (spec.md §6): `{root, children, bounding_volume, content_url,
/// geometric_error, transform}`. `transform` is always identity here; tiles
/// are already expressed in the project's single world frame by the time
/// they reach this stage, so no further placement matrix is needed per tile.
#[derive(Debug, Serialize)]
pub struct TilesetNode {
    pub id: String,
    pub bounding_volume: [f64; 6],
    pub content_url: Option<String>,
    pub geometric_error: f64,
    pub transform: [f64; 16],
    pub children: Vec<TilesetNode>,
}

#[derive(Debug, Serialize)]
pub struct Tileset {
    pub root: TilesetNode,
}

fn bounding_volume(bounds: &Aabb) -> [f64; 6] {
    [
        bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z,
    ]
}

const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

fn build_node(id: &TileId, nodes: &DashMap<TileId, TileNode>) -> Option<TilesetNode> {
    let node = nodes.get(id)?;
    let mut children: Vec<TilesetNode> = node
        .depends_on
        .iter()
        .filter_map(|child_id| build_node(child_id, nodes))
        .collect();
    children.sort_by(|a, b| a.id.cmp(&b.id));

    Some(TilesetNode {
        id: node.id.to_string(),
        bounding_volume: bounding_volume(&node.bounds),
        content_url: node.mesh_url.clone(),
        geometric_error: node.geometric_error.unwrap_or(0.0),
        transform: IDENTITY,
        children,
    })
}

/// Builds the full manifest from the coordinator's flat node map, rooted at
/// `TileId::root()`. Missing/failed nodes are simply absent from the tree
/// rather than causing the whole manifest build to fail (spec.md §4.J:
/// parent construction tolerates a missing child).
pub fn build_manifest(nodes: &DashMap<TileId, TileNode>) -> Tileset {
    let root = build_node(&TileId::root(), nodes).unwrap_or_else(|| TilesetNode {
        id: TileId::root().to_string(),
        bounding_volume: bounding_volume(&Aabb::EMPTY),
        content_url: None,
        geometric_error: 0.0,
        transform: IDENTITY,
        children: Vec::new(),
    });
    Tileset { root }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn single_leaf_manifest_has_no_children() {
        let nodes = DashMap::new();
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(1.0));
        let mut leaf = TileNode::new_leaf(TileId::root(), "proj".into(), None, bounds);
        leaf.mesh_url = Some("tiles/proj/root.ply".into());
        nodes.insert(TileId::root(), leaf);

        let manifest = build_manifest(&nodes);
        assert!(manifest.root.children.is_empty());
        assert_eq!(manifest.root.content_url.as_deref(), Some("tiles/proj/root.ply"));
    }

    #[test]
    fn parent_nests_its_children_sorted_by_id() {
        let nodes = DashMap::new();
        let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(2.0));
        let mut depends_on = std::collections::HashSet::new();
        depends_on.insert(TileId::root().child(0));
        depends_on.insert(TileId::root().child(1));
        let parent = TileNode::new_internal(TileId::root(), "proj".into(), None, bounds, depends_on);
        nodes.insert(TileId::root(), parent);
        nodes.insert(TileId::root().child(1), TileNode::new_leaf(TileId::root().child(1), "proj".into(), Some(TileId::root()), bounds));
        nodes.insert(TileId::root().child(0), TileNode::new_leaf(TileId::root().child(0), "proj".into(), Some(TileId::root()), bounds));

        let manifest = build_manifest(&nodes);
        assert_eq!(manifest.root.children.len(), 2);
        assert_eq!(manifest.root.children[0].id, "root0");
        assert_eq!(manifest.root.children[1].id, "root1");
    }
}
