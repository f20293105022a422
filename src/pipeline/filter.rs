use crate::pipeline::types::{Correspondences, Keypoint, Match};

/// Keep matches with `distance <= distance_limit` as point pairs.
///
/// The scene point comes from `train_idx`, the template point from
/// `query_idx`, and input order is preserved. A limit of 0 disables the
/// overlay and yields nothing. Matches pointing outside the keypoint slices
/// are skipped.
pub fn filter_matches(
    matches: &[Match],
    scene_keypoints: &[Keypoint],
    template_keypoints: &[Keypoint],
    distance_limit: u32,
) -> Correspondences {
    if distance_limit == 0 {
        return Correspondences::default();
    }

    let mut correspondences = Correspondences::with_capacity(matches.len());
    for m in matches.iter().filter(|m| m.distance <= distance_limit) {
        let (Some(scene), Some(template)) = (scene_keypoints.get(m.train_idx), template_keypoints.get(m.query_idx)) else {
            log::debug!("skipping match with out-of-range indices {:?}", m);
            continue;
        };
        correspondences.push(scene.point(), template.point());
    }
    correspondences
}
