pub mod bounds_tree;
pub mod chunk;
pub mod tile_node;

pub use bounds_tree::{
    AreaSplitCriteria, BoundsTreeLimits, FaceSplitCriteria, TextureSplitCriteria, TileMeshSource,
    TileSplitCriteria, TilingScheme,
};
pub use chunk::{chunk_mesh, chunk_sparse_image, ImageChunk, MeshChunk};
pub use tile_node::{TileId, TileNode};
