//! Post-processing for DB (Differentiable Binarization) text detection.
//!
//! [`DbPostProcess`] turns a per-pixel text probability map into quadrilateral
//! text boxes: it binarizes the map, traces outer contours, fits and scores
//! rotated rectangles, expands the survivors with a polygon offset, and emits
//! rounded, clamped integer quadrilaterals in probability-map coordinates.
//! Mapping back into source-image coordinates is the caller's concern.

use crate::processors::geometry::{MinAreaRect, Point, Polygon, Quadrilateral, ScanlineBuffer};
use crate::utils::math::clampf;
use clipper2::{EndType, JoinType, Path as ClipperPath};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use itertools::Itertools;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Scanline regions at least this large are scored in parallel.
const PARALLEL_SCORE_THRESHOLD: usize = 8_000;

/// Post-processor for DB text detection output.
#[derive(Debug, Clone)]
pub struct DbPostProcess {
    /// Threshold for binarizing the probability map.
    thresh: f32,
    /// Minimum mean score for a candidate box to survive.
    box_thresh: f32,
    /// Expansion ratio applied when unclipping boxes.
    unclip_ratio: f32,
    /// Maximum number of contours considered per map.
    max_candidates: usize,
    /// Minimum side length for a fitted rectangle.
    min_size: f32,
}

impl DbPostProcess {
    /// Creates a post-processor with the given thresholds.
    pub fn new(thresh: f32, box_thresh: f32, unclip_ratio: f32, max_candidates: usize) -> Self {
        Self {
            thresh,
            box_thresh,
            unclip_ratio,
            max_candidates,
            min_size: 3.0,
        }
    }

    /// Extracts text boxes from a probability map.
    ///
    /// Boxes come back in contour discovery order, corners ordered top-left,
    /// top-right, bottom-right, bottom-left, coordinates rounded and clamped
    /// into `[0, width]` / `[0, height]` of the map.
    pub fn apply(&self, pred: &ArrayView2<f32>) -> Vec<Quadrilateral> {
        let bitmap = self.binarize(pred);
        self.boxes_from_bitmap(pred, &bitmap)
    }

    /// Binarizes the probability map into a black-and-white bitmap.
    fn binarize(&self, pred: &ArrayView2<f32>) -> GrayImage {
        let height = pred.shape()[0] as u32;
        let width = pred.shape()[1] as u32;

        let mut bitmap = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if pred[[y as usize, x as usize]] > self.thresh {
                    bitmap.put_pixel(x, y, Luma([255]));
                }
            }
        }
        bitmap
    }

    fn boxes_from_bitmap(&self, pred: &ArrayView2<f32>, bitmap: &GrayImage) -> Vec<Quadrilateral> {
        let width = bitmap.width();
        let height = bitmap.height();

        let contours = find_contours::<u32>(bitmap);
        let mut boxes = Vec::new();

        for contour in contours
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .take(self.max_candidates)
        {
            if contour.points.len() < 3 {
                continue;
            }

            let rect = Polygon::from_contour(&contour).min_area_rect();
            let (ring, ssid) = mini_box_points(&rect);
            if ssid < self.min_size {
                continue;
            }

            let score = self.box_score(pred, &ring);
            if score < self.box_thresh {
                continue;
            }

            let Some(expanded) = unclip(&ring, self.unclip_ratio) else {
                continue;
            };

            let refit = Polygon::new(expanded).min_area_rect();
            let (ring, ssid) = mini_box_points(&refit);
            if ssid < self.min_size + 2.0 {
                continue;
            }

            boxes.push(clamp_and_order(&ring, width, height));
        }

        boxes
    }

    /// Mean probability over the quadrilateral's interior, rasterized with
    /// half-pixel scanlines restricted to the clamped bounding box.
    fn box_score(&self, pred: &ArrayView2<f32>, ring: &[Point; 4]) -> f32 {
        let height = pred.shape()[0];
        let width = pred.shape()[1];

        let (min_x, max_x) = ring
            .iter()
            .map(|p| p.x)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let (min_y, max_y) = ring
            .iter()
            .map(|p| p.y)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));

        let min_x = clampf(min_x, 0.0, width as f32 - 1.0);
        let max_x = clampf(max_x, 0.0, width as f32 - 1.0);
        let min_y = clampf(min_y, 0.0, height as f32 - 1.0);
        let max_y = clampf(max_y, 0.0, height as f32 - 1.0);

        let start_x = min_x as usize;
        let end_x = max_x as usize + 1;
        let start_y = min_y as usize;
        let end_y = max_y as usize + 1;

        let region = (end_y - start_y) * (end_x - start_x);
        let (total_score, total_pixels) = if region < PARALLEL_SCORE_THRESHOLD {
            let mut buffer = ScanlineBuffer::new(ring.len());
            let mut total_score = 0.0;
            let mut total_pixels = 0usize;
            for y in start_y..end_y {
                let (line_score, line_pixels) =
                    buffer.process_scanline(y as f32 + 0.5, ring, start_x, end_x, pred);
                total_score += line_score;
                total_pixels += line_pixels;
            }
            (total_score, total_pixels)
        } else {
            let results: Vec<(f32, usize)> = (start_y..end_y)
                .into_par_iter()
                .map(|y| {
                    let mut buffer = ScanlineBuffer::new(ring.len());
                    buffer.process_scanline(y as f32 + 0.5, ring, start_x, end_x, pred)
                })
                .collect();
            (
                results.iter().map(|(score, _)| score).sum(),
                results.iter().map(|(_, pixels)| pixels).sum(),
            )
        };

        if total_pixels > 0 {
            total_score / total_pixels as f32
        } else {
            0.0
        }
    }
}

/// Orders a fitted rectangle's corners top-left, top-right, bottom-right,
/// bottom-left and returns them with the rectangle's longer side.
///
/// Corners are sorted by x; within each horizontal pair the lower-y point
/// is the top one.
fn mini_box_points(rect: &MinAreaRect) -> ([Point; 4], f32) {
    let mut corners = rect.corner_points();
    corners.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

    let (top_left, bottom_left) = if corners[1].y > corners[0].y {
        (corners[0], corners[1])
    } else {
        (corners[1], corners[0])
    };
    let (top_right, bottom_right) = if corners[3].y > corners[2].y {
        (corners[2], corners[3])
    } else {
        (corners[3], corners[2])
    };

    (
        [top_left, top_right, bottom_right, bottom_left],
        rect.max_side(),
    )
}

/// Expands a box ring outward with a rounded polygon offset.
///
/// The offset distance is `|cross sum| * unclip_ratio / perimeter`, where the
/// cross sum is the full shoelace sum, not the halved polygon area. Returns
/// `None` when the ring is degenerate or the offset does not produce exactly
/// one polygon.
fn unclip(ring: &[Point; 4], unclip_ratio: f32) -> Option<Vec<Point>> {
    let clipper_path: ClipperPath = ring
        .iter()
        .map(|point| (point.x as f64, point.y as f64))
        .collect::<Vec<_>>()
        .into();

    let mut cross_sum = 0.0f64;
    let mut perimeter = 0.0f64;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        let (x1, y1) = (ring[i].x as f64, ring[i].y as f64);
        let (x2, y2) = (ring[j].x as f64, ring[j].y as f64);
        cross_sum += x1 * y2 - x2 * y1;
        let (dx, dy) = (x2 - x1, y2 - y1);
        perimeter += (dx * dx + dy * dy).sqrt();
    }

    let area = cross_sum.abs();
    if perimeter <= f64::EPSILON || area <= f64::EPSILON {
        return None;
    }

    let delta = area * unclip_ratio as f64 / perimeter;
    let offset_paths = clipper_path.inflate(delta, JoinType::Round, EndType::Polygon, 2.0);
    if offset_paths.len() != 1 {
        return None;
    }

    let path = offset_paths.into_iter().next()?;
    let mut points: Vec<Point> = path
        .iter()
        .map(|pt| Point::new(pt.x() as f32, pt.y() as f32))
        .collect();

    // Remove the duplicated closing vertex if the path comes back closed
    if points.len() > 1
        && let (Some(first), Some(last)) = (points.first(), points.last())
        && (first.x - last.x).abs() < f32::EPSILON
        && (first.y - last.y).abs() < f32::EPSILON
    {
        points.pop();
    }

    if points.len() < 3 {
        return None;
    }

    Some(points)
}

/// Rounds and clamps ring coordinates into `[0, width]` / `[0, height]`
/// (upper bounds inclusive), then re-applies the corner ordering on the
/// integer points.
fn clamp_and_order(ring: &[Point; 4], width: u32, height: u32) -> Quadrilateral {
    let points = ring.map(|p| {
        [
            clampf(p.x.round(), 0.0, width as f32) as i32,
            clampf(p.y.round(), 0.0, height as f32) as i32,
        ]
    });
    Quadrilateral::new(order_quad_points(points))
}

/// Corner ordering for integer points, same rule as [`mini_box_points`].
fn order_quad_points(mut points: [[i32; 2]; 4]) -> [[i32; 2]; 4] {
    points.sort_by_key(|p| p[0]);

    let (top_left, bottom_left) = if points[1][1] > points[0][1] {
        (points[0], points[1])
    } else {
        (points[1], points[0])
    };
    let (top_right, bottom_right) = if points[3][1] > points[2][1] {
        (points[2], points[3])
    } else {
        (points[3], points[2])
    };

    [top_left, top_right, bottom_right, bottom_left]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{
        DEFAULT_BOX_THRESH, DEFAULT_MAX_CANDIDATES, DEFAULT_THRESH, DEFAULT_UNCLIP_RATIO,
    };
    use ndarray::Array2;

    fn default_postprocess() -> DbPostProcess {
        DbPostProcess::new(
            DEFAULT_THRESH,
            DEFAULT_BOX_THRESH,
            DEFAULT_UNCLIP_RATIO,
            DEFAULT_MAX_CANDIDATES,
        )
    }

    fn blob_map(value: f32) -> Array2<f32> {
        let mut pred = Array2::zeros((64, 64));
        for y in 16..40 {
            for x in 8..40 {
                pred[[y, x]] = value;
            }
        }
        pred
    }

    #[test]
    fn blank_map_yields_no_boxes() {
        let post = default_postprocess();
        let pred = Array2::zeros((64, 64));
        assert!(post.apply(&pred.view()).is_empty());
    }

    #[test]
    fn single_blob_yields_one_ordered_box() {
        let post = default_postprocess();
        let pred = blob_map(0.9);
        let boxes = post.apply(&pred.view());
        assert_eq!(boxes.len(), 1);

        let quad = boxes[0];
        for [x, y] in quad.points {
            assert!((0..=64).contains(&x));
            assert!((0..=64).contains(&y));
        }
        // top-left / top-right / bottom-right / bottom-left
        assert!(quad.points[0][0] <= quad.points[1][0]);
        assert!(quad.points[0][1] <= quad.points[3][1]);
        assert!(quad.points[1][1] <= quad.points[2][1]);
    }

    #[test]
    fn low_scoring_blob_is_rejected() {
        let post = default_postprocess();
        // Above the binarization threshold but below box_thresh
        let pred = blob_map(0.4);
        assert!(post.apply(&pred.view()).is_empty());
    }

    #[test]
    fn corner_ordering_is_idempotent() {
        let scrambled = [[5, 5], [0, 0], [0, 5], [5, 0]];
        let ordered = order_quad_points(scrambled);
        assert_eq!(ordered, [[0, 0], [5, 0], [5, 5], [0, 5]]);
        assert_eq!(order_quad_points(ordered), ordered);
    }

    #[test]
    fn unclip_expands_the_ring() {
        let ring = [
            Point::new(10.0, 10.0),
            Point::new(30.0, 10.0),
            Point::new(30.0, 20.0),
            Point::new(10.0, 20.0),
        ];
        let original_area = Polygon::new(ring.to_vec()).area();
        let expanded = unclip(&ring, DEFAULT_UNCLIP_RATIO).expect("offset succeeds");
        let expanded_area = Polygon::new(expanded).area();
        assert!(expanded_area > original_area);
    }

    #[test]
    fn degenerate_ring_is_rejected() {
        let ring = [
            Point::new(5.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 5.0),
        ];
        assert!(unclip(&ring, DEFAULT_UNCLIP_RATIO).is_none());
    }
}
