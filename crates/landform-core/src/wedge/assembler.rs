use crate::errors::WedgeError;
use crate::wedge::observation::{Geometry, Observation, ObservationType};

/// Iteration order over geometry representations when selecting an
/// observation to satisfy a capability (spec.md §4.F): linearized rasters
/// are preferred when present, since they need no further rectification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryPreference {
    Linearized,
    Raw,
}

impl GeometryPreference {
    fn order(self) -> [Geometry; 2] {
        match self {
            GeometryPreference::Linearized => [Geometry::Linearized, Geometry::Raw],
            GeometryPreference::Raw => [Geometry::Raw, Geometry::Linearized],
        }
    }
}

/// Capabilities a wedge must be able to satisfy before it is buildable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRequirements {
    pub points: bool,
    pub normals: bool,
    pub textures: bool,
    pub meshable: bool,
    pub reconstructable: bool,
}

/// The observations chosen to satisfy one wedge's requirements, each `None`
/// if that capability wasn't requested or couldn't be found.
#[derive(Debug, Clone, Default)]
pub struct WedgeSelection {
    pub points: Option<Observation>,
    pub range: Option<Observation>,
    pub normals: Option<Observation>,
    pub mask: Option<Observation>,
    pub textures: Vec<Observation>,
}

impl WedgeSelection {
    pub fn is_meshable(&self) -> bool {
        self.points.is_some() || self.range.is_some()
    }

    pub fn is_reconstructable(&self) -> bool {
        self.is_meshable() && self.normals.is_some()
    }
}

fn first_of<'a>(observations: &[&'a Observation], product_type: ObservationType) -> Option<&'a Observation> {
    observations.iter().copied().find(|o| *o.product_type() == product_type)
}

/// One attempt at filling a wedge from observations restricted to a single
/// linearity. Returns `None` if the filled selection doesn't meet
/// `requirements`, so the caller can retry the next preference as a whole.
fn try_selection(
    observations: &[Observation],
    geometry: Geometry,
    requirements: SelectionRequirements,
) -> Option<WedgeSelection> {
    let filtered: Vec<&Observation> = observations.iter().filter(|o| *o.geometry() == geometry).collect();

    let mut selection = WedgeSelection::default();
    selection.points = first_of(&filtered, ObservationType::Points).cloned();
    selection.range = first_of(&filtered, ObservationType::Range).cloned();
    if selection.points.is_none() && requirements.points {
        selection.points = selection.range.clone();
    }

    // Normals and Mask must also match the representative observation's
    // dimensions (spec.md §4.F); Points, falling back to Range, stands in as
    // that representative.
    let representative = selection.points.as_ref().or(selection.range.as_ref());
    let dims_ok = |o: &&Observation| representative.map(|r| r.dims_match(o)).unwrap_or(true);

    selection.normals = first_of(&filtered, ObservationType::Normals)
        .filter(dims_ok)
        .cloned();
    selection.mask = first_of(&filtered, ObservationType::Mask)
        .filter(dims_ok)
        .cloned();

    selection.textures = filtered
        .iter()
        .filter(|o| *o.product_type() == ObservationType::Image && *o.use_for_texturing())
        .map(|&o| o.clone())
        .collect();

    if requirements.points && selection.points.is_none() {
        return None;
    }
    if requirements.normals && selection.normals.is_none() {
        return None;
    }
    if requirements.textures && selection.textures.is_empty() {
        return None;
    }
    if requirements.meshable && !selection.is_meshable() {
        return None;
    }
    if requirements.reconstructable && !selection.is_reconstructable() {
        return None;
    }

    Some(selection)
}

/// Selects a single wedge's worth of observations from a frame's candidate
/// set. The whole observation set is filtered by one linearity per
/// `preference` attempt (spec.md §4.F): a wedge never mixes a linearized
/// range image with a raw normals image, for instance. If the selection from
/// one linearity doesn't satisfy `requirements`, the next preference is
/// tried as a whole retry, not product-type by product-type.
pub fn assemble_wedge(
    observations: &[Observation],
    preference: GeometryPreference,
    requirements: SelectionRequirements,
) -> Result<WedgeSelection, WedgeError> {
    preference
        .order()
        .into_iter()
        .find_map(|geometry| try_selection(observations, geometry, requirements))
        .ok_or(WedgeError::NoMatchingObservations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraModel, Orthographic};
    use glam::DVec3;

    fn dummy_camera() -> CameraModel {
        CameraModel::Orthographic(Orthographic {
            center: DVec3::ZERO,
            forward: DVec3::new(0.0, 0.0, 1.0),
            right: DVec3::new(1.0, 0.0, 0.0),
            down: DVec3::new(0.0, 1.0, 0.0),
            width: 64,
            height: 64,
        })
    }

    fn obs(product_type: ObservationType, geometry: Geometry) -> Observation {
        obs_sized(product_type, geometry, 64, 64)
    }

    fn obs_sized(product_type: ObservationType, geometry: Geometry, width: u32, height: u32) -> Observation {
        Observation::new(
            "file:///x".into(),
            "frame".into(),
            1,
            1,
            1,
            dummy_camera(),
            product_type,
            geometry,
            width,
            height,
            1,
            8,
        )
    }

    #[test]
    fn prefers_linearized_when_available() {
        let observations = vec![
            obs(ObservationType::Range, Geometry::Raw),
            obs(ObservationType::Range, Geometry::Linearized),
        ];
        let selection = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                meshable: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(*selection.range.unwrap().geometry(), Geometry::Linearized);
    }

    #[test]
    fn points_falls_back_to_range() {
        let observations = vec![obs(ObservationType::Range, Geometry::Linearized)];
        let selection = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                points: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(selection.points.is_some());
    }

    #[test]
    fn missing_required_capability_errors() {
        let observations = vec![obs(ObservationType::Image, Geometry::Linearized)];
        let result = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                meshable: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(WedgeError::NoMatchingObservations)));
    }

    #[test]
    fn a_preference_attempt_never_mixes_linearities() {
        // Linearized range plus a raw normals observation: the Linearized
        // attempt must reject the raw normals entirely rather than pick it up
        // across geometries.
        let observations = vec![
            obs(ObservationType::Range, Geometry::Linearized),
            obs(ObservationType::Normals, Geometry::Raw),
        ];
        let selection = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                meshable: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(selection.normals.is_none());
    }

    #[test]
    fn falls_back_to_the_next_preference_as_a_whole() {
        // No Linearized range at all, but a fully-Raw set satisfies the
        // requirement; the Raw attempt must run as a complete retry.
        let observations = vec![obs(ObservationType::Range, Geometry::Raw)];
        let selection = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                meshable: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(*selection.range.unwrap().geometry(), Geometry::Raw);
    }

    #[test]
    fn normals_and_mask_require_dims_matching_the_representative() {
        let observations = vec![
            obs_sized(ObservationType::Range, Geometry::Linearized, 64, 64),
            obs_sized(ObservationType::Normals, Geometry::Linearized, 32, 32),
            obs_sized(ObservationType::Mask, Geometry::Linearized, 64, 64),
        ];
        let selection = assemble_wedge(
            &observations,
            GeometryPreference::Linearized,
            SelectionRequirements {
                meshable: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(selection.normals.is_none(), "mismatched dims must be rejected");
        assert!(selection.mask.is_some(), "matching dims must be accepted");
    }
}
