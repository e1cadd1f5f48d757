#[macro_export]
macro_rules! eyre_imports {
    () => {
        use color_eyre::eyre::{
            self,    // for eyre::Result
            eyre,    // for eyre! macro
            WrapErr, // for wrap_err* methods
        };
    };
}

/// Errors raised by geometry primitives: clipping, bounds checks, plane math.
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("clip result bounds exceed the clip box by more than the allowed tolerance")]
    ClipOvershoot,
    #[error("plane/box degenerate: {0}")]
    Degenerate(String),
}

/// Errors raised by mesh-level operations (clean, clip, merge, skirt).
#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error("source mesh lacks an attribute required by the merge destination: {0}")]
    AttributeMismatch(String),
    #[error("{0}")]
    Geometry(#[from] GeometryError),
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error("band counts cannot be reconciled while merging textures: {0} vs {1}")]
    BandMismatch(usize, usize),
}

/// Errors raised by camera projection/unprojection.
#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("projection denominator below epsilon")]
    ArithmeticUnderflow,
    #[error("unproject direction vector degenerate (near-zero cross product)")]
    DegenerateDirection,
    #[error("distortion polynomial derivative non-positive during Newton iteration")]
    DistortionNegative,
    #[error("Newton iteration failed to converge after {iters} iterations")]
    ConvergenceFailure { iters: u32 },
    #[error("ray angle exceeds the valid hemisphere bound for this CAHVORE model")]
    OutOfHemisphere,
}

/// Errors raised while assembling wedges from per-frame observations.
#[derive(thiserror::Error, Debug)]
pub enum WedgeError {
    #[error("no observation selection satisfies the requested capability set")]
    NoMatchingObservations,
    #[error("camera math failed while projecting texture: {0}")]
    Camera(#[from] CameraModelError),
    #[error("reconstruction failed: {0}")]
    Reconstruction(String),
}

/// Errors raised by the textured-mesh clipper / atlas packer.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error("mesh operation failed while clipping a patch: {0}")]
    Mesh(#[from] MeshError),
    #[error("bin packer exceeded the maximum bin area ({0} px^2) while placing patches")]
    PackerExhausted(u32),
    #[error("no patches were produced from the given inputs")]
    NoPatches,
}

/// Errors raised while building or saving a tile tree node.
#[derive(thiserror::Error, Debug)]
pub enum TileBuildError {
    #[error("tile {tile_id}: {cause}")]
    Failed { tile_id: String, cause: String },
    #[error("tile {0}: a required dependency has no saved mesh")]
    DependencyMissing(String),
}
