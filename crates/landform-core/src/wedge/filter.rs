use crate::wedge::observation::{FilterReject, Observation};

/// Per-file ingestion classification (spec.md §4.J). `frame_name`,
/// site/drive and camera validity are checked against the group's first
/// accepted observation; a mismatch against that baseline, not against any
/// single other file, is what the `multi_*` reasons mean.
pub fn classify(observations: Vec<Observation>) -> (Vec<Observation>, Vec<(Observation, FilterReject)>) {
    let mut accepted: Vec<Observation> = Vec::new();
    let mut rejected = Vec::new();

    for obs in observations {
        if let Err(reason) = check(&obs, accepted.first()) {
            rejected.push((obs, reason));
        } else {
            accepted.push(obs);
        }
    }

    (accepted, rejected)
}

fn check(obs: &Observation, baseline: Option<&Observation>) -> Result<(), FilterReject> {
    if obs.frame_name().is_empty() || obs.url().is_empty() {
        return Err(FilterReject::MetadataParse);
    }
    if !obs.camera().is_valid() {
        return Err(FilterReject::CameraModelInvalid);
    }
    if let Some(base) = baseline {
        if obs.frame_name() != base.frame_name() {
            return Err(FilterReject::MultiFrame);
        }
        if std::mem::discriminant(obs.camera()) != std::mem::discriminant(base.camera()) {
            return Err(FilterReject::MultiCamera);
        }
        if obs.site() != base.site() || obs.drive() != base.drive() {
            return Err(FilterReject::MultiSiteDrive);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraModel, Orthographic};
    use crate::wedge::observation::{Geometry, ObservationType};
    use glam::DVec3;

    fn camera() -> CameraModel {
        CameraModel::Orthographic(Orthographic {
            center: DVec3::ZERO,
            forward: DVec3::Z,
            right: DVec3::X,
            down: DVec3::Y,
            width: 64,
            height: 64,
        })
    }

    fn observation(frame: &str, site: i32, drive: i32) -> Observation {
        Observation::new(
            format!("{frame}.img"),
            frame.to_string(),
            site,
            drive,
            0,
            camera(),
            ObservationType::Image,
            Geometry::Linearized,
            64,
            64,
            1,
            8,
        )
    }

    #[test]
    fn accepts_a_consistent_group() {
        let obs = vec![observation("f1", 1, 1), observation("f1", 1, 1)];
        let (accepted, rejected) = classify(obs);
        assert_eq!(accepted.len(), 2);
        assert!(rejected.is_empty());
    }

    #[test]
    fn rejects_a_second_frame_as_multi_frame() {
        let obs = vec![observation("f1", 1, 1), observation("f2", 1, 1)];
        let (accepted, rejected) = classify(obs);
        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].1, FilterReject::MultiFrame);
    }

    #[test]
    fn rejects_a_second_sitedrive_as_multi_sitedrive() {
        let obs = vec![observation("f1", 1, 1), observation("f1", 2, 1)];
        let (_, rejected) = classify(obs);
        assert_eq!(rejected[0].1, FilterReject::MultiSiteDrive);
    }

    #[test]
    fn rejects_empty_frame_name_as_metadata_parse() {
        let obs = vec![observation("", 1, 1)];
        let (_, rejected) = classify(obs);
        assert_eq!(rejected[0].1, FilterReject::MetadataParse);
    }
}
