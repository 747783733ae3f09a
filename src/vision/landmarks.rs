// vision/landmarks.rs
//
// Mouth openness from lip landmark contours.

use crate::geometry::{NormalizedRect, Point};

/// Vertical extent of a contour, 0.0 when it has no points
pub fn vertical_span(points: &[Point]) -> f64 {
    let mut iter = points.iter().map(|p| p.y);
    let first = match iter.next() {
        Some(y) => y,
        None => return 0.0,
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)));
    max - min
}

/// Mouth openness of a face: the larger of the inner and outer lip vertical
/// spans (box-relative) scaled by the box height, giving a frame-relative value.
///
/// Both contours are required; a detection without them reports 0.0.
pub fn mouth_openness(
    bounding_box: &NormalizedRect,
    inner_lips: Option<&[Point]>,
    outer_lips: Option<&[Point]>,
) -> f64 {
    match (inner_lips, outer_lips) {
        (Some(inner), Some(outer)) => {
            vertical_span(inner).max(vertical_span(outer)) * bounding_box.height
        }
        _ => 0.0,
    }
}

/// Lip contours describing a mouth opened to `span` (box-relative), for
/// synthesizing detections in recordings and tests
pub fn lips_with_span(span: f64) -> (Vec<Point>, Vec<Point>) {
    let mid = 0.25;
    let inner = vec![
        Point::new(0.4, mid - span / 4.0),
        Point::new(0.5, mid + span / 4.0),
        Point::new(0.6, mid),
    ];
    let outer = vec![
        Point::new(0.35, mid - span / 2.0),
        Point::new(0.5, mid + span / 2.0),
        Point::new(0.65, mid),
    ];
    (inner, outer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_span() {
        assert_eq!(vertical_span(&[]), 0.0);
        let pts = [Point::new(0.0, 0.2), Point::new(0.1, 0.5), Point::new(0.2, 0.3)];
        assert!((vertical_span(&pts) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_openness_uses_larger_contour_scaled_by_height() {
        let bbox = NormalizedRect::new(0.0, 0.0, 0.2, 0.5);
        let inner = [Point::new(0.0, 0.4), Point::new(0.0, 0.5)];
        let outer = [Point::new(0.0, 0.3), Point::new(0.0, 0.6)];
        let openness = mouth_openness(&bbox, Some(&inner), Some(&outer));
        assert!((openness - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_missing_contour_is_closed_mouth() {
        let bbox = NormalizedRect::new(0.0, 0.0, 0.2, 0.5);
        let outer = [Point::new(0.0, 0.3), Point::new(0.0, 0.6)];
        assert_eq!(mouth_openness(&bbox, None, Some(&outer)), 0.0);
        assert_eq!(mouth_openness(&bbox, None, None), 0.0);
    }

    #[test]
    fn test_synthesized_lips_round_trip() {
        let bbox = NormalizedRect::new(0.0, 0.0, 0.2, 1.0);
        let (inner, outer) = lips_with_span(0.3);
        let openness = mouth_openness(&bbox, Some(&inner), Some(&outer));
        assert!((openness - 0.3).abs() < 1e-12);
    }
}
