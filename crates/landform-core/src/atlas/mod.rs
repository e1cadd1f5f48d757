mod textured_mesh_clip;

pub use textured_mesh_clip::{build_atlas, AtlasOptions, MeshImagePair};
