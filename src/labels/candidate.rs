use crate::{
    core::geo::LatLng,
    data::grouping::LocationGroup,
    labels::selector::LabelPolicy,
};
use serde::{Deserialize, Serialize};

/// A marker that may receive an inline text label this frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
    pub id: String,
    pub coordinate: LatLng,
    pub title: String,
    pub estimated_width: f64,
    pub estimated_height: f64,
    pub priority: f64,
    pub rating: Option<f64>,
}

/// Rough label size from character count. No text shaping involved.
pub fn estimate_label_size(title: &str, policy: &LabelPolicy) -> (f64, f64) {
    let chars = title.chars().count() as f64;
    let width = (chars * policy.char_width_px + policy.label_padding_px * 2.0)
        .clamp(policy.min_label_width_px, policy.max_label_width_px);
    (width, policy.label_height_px)
}

/// Candidates from single-venue groups with a usable title.
///
/// Stacked locations never get inline labels.
pub fn candidates_from_groups(
    groups: &[LocationGroup],
    policy: &LabelPolicy,
) -> Vec<LabelCandidate> {
    groups
        .iter()
        .filter(|group| !group.is_stacked())
        .filter_map(|group| {
            let marker = group.single()?;
            let title = marker.label_title()?;
            if !marker.coordinate.is_finite() {
                return None;
            }
            let (width, height) = estimate_label_size(title, policy);
            Some(LabelCandidate {
                id: marker.id.clone(),
                coordinate: marker.coordinate,
                title: title.to_string(),
                estimated_width: width,
                estimated_height: height,
                priority: if marker.label_priority.is_finite() {
                    marker.label_priority.max(0.0)
                } else {
                    0.0
                },
                rating: marker.normalized_rating(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{grouping::group_by_location, marker::MarkerPoint};

    #[test]
    fn test_stacked_and_untitled_excluded() {
        let markers = vec![
            MarkerPoint::new("a", LatLng::new(1.0, 1.0)).with_title("Alpha"),
            MarkerPoint::new("b", LatLng::new(2.0, 2.0)).with_title("Beta"),
            MarkerPoint::new("c", LatLng::new(2.0, 2.0)).with_title("Gamma"),
            MarkerPoint::new("d", LatLng::new(3.0, 3.0)),
        ];
        let groups = group_by_location(&markers);
        let candidates = candidates_from_groups(&groups, &LabelPolicy::default());
        let ids: Vec<_> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_priority_is_sanitized() {
        let markers = vec![
            MarkerPoint::new("a", LatLng::new(1.0, 1.0))
                .with_title("Alpha")
                .with_label_priority(2.5),
            MarkerPoint::new("b", LatLng::new(2.0, 2.0))
                .with_title("Beta")
                .with_label_priority(-1.0),
            MarkerPoint::new("c", LatLng::new(3.0, 3.0))
                .with_title("Gamma")
                .with_label_priority(f64::NAN),
        ];
        let groups = group_by_location(&markers);
        let candidates = candidates_from_groups(&groups, &LabelPolicy::default());
        let priorities: Vec<f64> = candidates.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![2.5, 0.0, 0.0]);
    }

    #[test]
    fn test_width_is_clamped() {
        let policy = LabelPolicy::default();
        let (short, h) = estimate_label_size("A", &policy);
        let (long, _) = estimate_label_size(&"x".repeat(200), &policy);
        assert_eq!(short, policy.min_label_width_px);
        assert_eq!(long, policy.max_label_width_px);
        assert_eq!(h, policy.label_height_px);
    }
}
