use getset::Getters;

use crate::camera::CameraModel;

/// Whether an observation's raster is in the sensor's native (distorted,
/// row/column) space or has already been linearized/rectified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    Linearized,
    Raw,
}

/// The kind of raster an observation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationType {
    Points,
    Range,
    Normals,
    Mask,
    Image,
}

/// Metadata record created once at ingestion and only mutated via explicit
/// "recreate" semantics (spec.md §3).
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Observation {
    url: String,
    frame_name: String,
    site: i32,
    drive: i32,
    day: i32,
    camera: CameraModel,
    product_type: ObservationType,
    geometry: Geometry,
    width: u32,
    height: u32,
    bands: u32,
    bit_depth: u32,
    use_for_alignment: bool,
    use_for_meshing: bool,
    use_for_texturing: bool,
    alt_extensions: Vec<String>,
    index: Option<u32>,
    mask_guid: Option<String>,
}

impl Observation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: String,
        frame_name: String,
        site: i32,
        drive: i32,
        day: i32,
        camera: CameraModel,
        product_type: ObservationType,
        geometry: Geometry,
        width: u32,
        height: u32,
        bands: u32,
        bit_depth: u32,
    ) -> Self {
        Self {
            url,
            frame_name,
            site,
            drive,
            day,
            camera,
            product_type,
            geometry,
            width,
            height,
            bands,
            bit_depth,
            use_for_alignment: true,
            use_for_meshing: true,
            use_for_texturing: true,
            alt_extensions: Vec::new(),
            index: None,
            mask_guid: None,
        }
    }

    pub fn dims_match(&self, other: &Observation) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Classified ingestion-policy rejection reasons (spec.md §4.J); a rejection
/// is a `Skipped` result, not a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilterReject {
    #[error("observation spans multiple frames")]
    MultiFrame,
    #[error("observation spans multiple cameras")]
    MultiCamera,
    #[error("observation spans multiple site-drives")]
    MultiSiteDrive,
    #[error("rejected by mission policy check")]
    MissionPolicyCheck,
    #[error("metadata failed to parse")]
    MetadataParse,
    #[error("camera model invalid")]
    CameraModelInvalid,
}
