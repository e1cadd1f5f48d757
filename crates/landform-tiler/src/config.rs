use std::path::{Path, PathBuf};

use config::{Config as ConfigSource, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingScheme {
    Octree,
    Quadtree,
    QuadAuto,
    Flat,
    UserDefined,
}

impl From<TilingScheme> for landform_core::tiler::TilingScheme {
    fn from(s: TilingScheme) -> Self {
        match s {
            TilingScheme::Octree => landform_core::tiler::TilingScheme::Octree,
            TilingScheme::Quadtree => landform_core::tiler::TilingScheme::Quadtree,
            TilingScheme::QuadAuto => landform_core::tiler::TilingScheme::QuadAuto,
            TilingScheme::Flat | TilingScheme::UserDefined => landform_core::tiler::TilingScheme::UserDefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureMode {
    None,
    Bake,
    Clip,
    Backproject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkirtMode {
    X,
    Y,
    Z,
    Normal,
    None,
}

impl From<SkirtMode> for landform_core::mesh::skirt::SkirtMode {
    fn from(s: SkirtMode) -> Self {
        match s {
            SkirtMode::X => landform_core::mesh::skirt::SkirtMode::X,
            SkirtMode::Y => landform_core::mesh::skirt::SkirtMode::Y,
            SkirtMode::Z => landform_core::mesh::skirt::SkirtMode::Z,
            SkirtMode::Normal => landform_core::mesh::skirt::SkirtMode::Normal,
            SkirtMode::None => landform_core::mesh::skirt::SkirtMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMethod {
    Organized,
    Poisson,
    Fssr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshDecimator {
    EdgeCollapse,
    Quadric,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SkirtSettings {
    pub mode: SkirtMode,
    pub rel_height: f64,
    pub min_abs_height: f64,
    pub max_abs_height: f64,
    pub threshold: f64,
    pub invert: bool,
}

/// Every option of spec.md §6 "Configuration", plus the ambient settings
/// (object store root, cache sizes, retry budget) the teacher's own
/// `Settings` carried for its own domain. Grounded on
/// `dynamapper/src/external_data/settings.rs`'s plain `toml`-backed
/// `Settings` struct, replacing its single `toml::from_str` call with a
/// layered `config` builder (file, then environment overrides).
#[derive(Debug, Clone, Deserialize)]
pub struct TilerConfig {
    pub project_name: String,
    pub tiling_scheme: TilingScheme,
    pub max_faces_per_tile: usize,
    pub min_tile_extent: f64,
    pub max_depth: usize,
    pub max_leaf_area: f64,
    pub max_orbital_leaf_area: f64,
    pub max_texture_resolution: u32,
    pub max_texels_per_meter: f64,
    pub max_texture_stretch: f64,
    pub power_of_two_textures: bool,
    pub texture_mode: TextureMode,
    pub skirt: SkirtSettings,
    pub reconstruction_method: ReconstructionMethod,
    pub mesh_decimator: MeshDecimator,
    pub allow_rotation: bool,
    pub border_pixels: u32,
    pub chunk_scale: usize,
    pub sparse_image_chunk_px: u32,
    pub tile_build_retries: u32,
    pub image_cache_capacity: usize,
    pub data_product_cache_capacity: usize,
    pub object_store_root: PathBuf,
}

fn default_builder() -> config::ConfigBuilder<config::builder::DefaultState> {
    ConfigSource::builder()
        .set_default("project_name", "untitled").unwrap()
        .set_default("tiling_scheme", "octree").unwrap()
        .set_default("max_faces_per_tile", 16_000i64).unwrap()
        .set_default("min_tile_extent", 0.25).unwrap()
        .set_default("max_depth", 24i64).unwrap()
        .set_default("max_leaf_area", 100.0).unwrap()
        .set_default("max_orbital_leaf_area", 10_000.0).unwrap()
        .set_default("max_texture_resolution", 4096i64).unwrap()
        .set_default("max_texels_per_meter", 512.0).unwrap()
        .set_default("max_texture_stretch", 0.2).unwrap()
        .set_default("power_of_two_textures", true).unwrap()
        .set_default("texture_mode", "clip").unwrap()
        .set_default("skirt.mode", "none").unwrap()
        .set_default("skirt.rel_height", 0.05).unwrap()
        .set_default("skirt.min_abs_height", 0.01).unwrap()
        .set_default("skirt.max_abs_height", 10.0).unwrap()
        .set_default("skirt.threshold", 1e-4).unwrap()
        .set_default("skirt.invert", false).unwrap()
        .set_default("reconstruction_method", "organized").unwrap()
        .set_default("mesh_decimator", "quadric").unwrap()
        .set_default("allow_rotation", false).unwrap()
        .set_default("border_pixels", 2i64).unwrap()
        .set_default("chunk_scale", 10i64).unwrap()
        .set_default("sparse_image_chunk_px", 2048i64).unwrap()
        .set_default("tile_build_retries", 3i64).unwrap()
        .set_default("image_cache_capacity", 256i64).unwrap()
        .set_default("data_product_cache_capacity", 256i64).unwrap()
        .set_default("object_store_root", "./landform-output").unwrap()
}

/// Loads `TilerConfig` from defaults, an optional TOML file, then
/// `LANDFORM__*` environment overrides, in that precedence order.
pub fn load(path: Option<&Path>) -> Result<TilerConfig, config::ConfigError> {
    let mut builder = default_builder();
    if let Some(p) = path {
        builder = builder.add_source(File::from(p));
    }
    builder = builder.add_source(Environment::with_prefix("LANDFORM").separator("__"));
    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_without_a_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.tiling_scheme, TilingScheme::Octree);
        assert_eq!(cfg.max_faces_per_tile, 16_000);
        assert!(!cfg.allow_rotation);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiler.toml");
        std::fs::write(&path, "project_name = \"mars-site-12\"\nmax_faces_per_tile = 4000\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.project_name, "mars-site-12");
        assert_eq!(cfg.max_faces_per_tile, 4000);
    }
}
