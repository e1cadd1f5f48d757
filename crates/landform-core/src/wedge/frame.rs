use glam::DMat4;
use std::collections::HashMap;

/// Provenance of a frame's transform estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString)]
pub enum TransformSource {
    Pds,
    PlacesDb,
    LocationsDb,
    LegacyManifest,
    Adjusted,
}

/// A mean rigid transform plus its translation+rotation uncertainty,
/// expressed as a flattened 6x6 covariance (row-major).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub mean: DMat4,
    pub covariance: [[f64; 6]; 6],
}

impl FrameTransform {
    pub fn identity() -> Self {
        Self {
            mean: DMat4::IDENTITY,
            covariance: [[0.0; 6]; 6],
        }
    }
}

/// Named node in the site-drive/local-level/root frame tree (spec.md §3,
/// GLOSSARY "Site-drive", "Local-level"). The tree itself is a DAG (spec.md
/// §9), so parent/child links are kept as name lookups rather than pointers.
#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub parent: Option<String>,
    transforms: HashMap<TransformSource, FrameTransform>,
}

impl Frame {
    pub fn new(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent,
            transforms: HashMap::new(),
        }
    }

    pub fn set_transform(&mut self, source: TransformSource, transform: FrameTransform) {
        self.transforms.insert(source, transform);
    }

    pub fn transform(&self, source: TransformSource) -> Option<&FrameTransform> {
        self.transforms.get(&source)
    }

    /// Best available transform, preferring adjusted estimates over prior
    /// (survey) sources.
    pub fn best_transform(&self) -> Option<&FrameTransform> {
        [
            TransformSource::Adjusted,
            TransformSource::PlacesDb,
            TransformSource::LocationsDb,
            TransformSource::Pds,
            TransformSource::LegacyManifest,
        ]
        .iter()
        .find_map(|s| self.transforms.get(s))
    }
}

/// Resolves the full transform from `frame` to the root by walking `parent`
/// links and composing each frame's best available transform.
pub fn resolve_to_root(frames: &HashMap<String, Frame>, frame_name: &str) -> Option<DMat4> {
    let mut mat = DMat4::IDENTITY;
    let mut current = frame_name;
    loop {
        let frame = frames.get(current)?;
        let t = frame.best_transform()?;
        mat = t.mean * mat;
        match &frame.parent {
            Some(parent) => current = parent.as_str(),
            None => return Some(mat),
        }
    }
}
