use std::collections::HashSet;

use crate::geom::Aabb;

/// Path-encoded tile identity (spec.md §3): `"root"` for the root, digits
/// appended per child index thereafter (e.g. `"root01"`). Kept as an owned
/// `String` newtype rather than a graph pointer so the tile dependency DAG
/// can be stored flat in a `DashMap` (see `DESIGN.md`, Open Question 2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub String);

impl TileId {
    pub const ROOT: &'static str = "root";

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn child(&self, index: u8) -> Self {
        Self(format!("{}{}", self.0, index))
    }

    pub fn depth(&self) -> usize {
        self.0.len() - Self::ROOT.len()
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn parent(&self) -> Option<TileId> {
        if self.is_root() {
            None
        } else {
            Some(TileId(self.0[..self.0.len() - 1].to_string()))
        }
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted tile record (spec.md §3). `depends_on` is exactly the set of
/// descendants required to build this node's LOD mesh; leaves have it empty
/// and `geometric_error = Some(0.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileNode {
    pub id: TileId,
    pub project: String,
    pub parent_id: Option<TileId>,
    pub is_leaf: bool,
    pub depth: usize,
    pub bounds: Aabb,
    pub mesh_url: Option<String>,
    pub image_url: Option<String>,
    pub index_url: Option<String>,
    pub depends_on: HashSet<TileId>,
    pub depended_on_by: HashSet<TileId>,
    pub geometric_error: Option<f64>,
}

impl TileNode {
    pub fn new_leaf(id: TileId, project: String, parent_id: Option<TileId>, bounds: Aabb) -> Self {
        let depth = id.depth();
        Self {
            id,
            project,
            parent_id,
            is_leaf: true,
            depth,
            bounds,
            mesh_url: None,
            image_url: None,
            index_url: None,
            depends_on: HashSet::new(),
            depended_on_by: HashSet::new(),
            geometric_error: Some(0.0),
        }
    }

    pub fn new_internal(
        id: TileId,
        project: String,
        parent_id: Option<TileId>,
        bounds: Aabb,
        depends_on: HashSet<TileId>,
    ) -> Self {
        let depth = id.depth();
        Self {
            id,
            project,
            parent_id,
            is_leaf: false,
            depth,
            bounds,
            mesh_url: None,
            image_url: None,
            index_url: None,
            depends_on,
            depended_on_by: HashSet::new(),
            geometric_error: None,
        }
    }

    /// Invariant from spec.md §3: `depth == len(id) - len("root")`.
    pub fn depth_invariant_holds(&self) -> bool {
        self.depth == self.id.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_ids_append_digits() {
        let root = TileId::root();
        let child = root.child(0).child(1);
        assert_eq!(child.0, "root01");
        assert_eq!(child.depth(), 2);
        assert_eq!(child.parent(), Some(root.child(0)));
    }

    #[test]
    fn leaf_has_zero_geometric_error_and_no_dependencies() {
        let node = TileNode::new_leaf(TileId::root(), "proj".into(), None, Aabb::EMPTY);
        assert!(node.depends_on.is_empty());
        assert_eq!(node.geometric_error, Some(0.0));
        assert!(node.depth_invariant_holds());
    }
}
