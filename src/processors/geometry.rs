//! Geometric primitives for detection post-processing.
//!
//! This module provides the point, polygon, and rotated-rectangle types used
//! when turning a probability map into text boxes, along with the scanline
//! machinery for scoring candidate regions.

use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A polygon described by an ordered ring of points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    /// The points that make up the ring.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Creates a new polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from an imageproc contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        let points = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        Self { points }
    }

    /// Computes the signed shoelace sum over the ring.
    ///
    /// This is twice the signed area; callers that want the geometric area
    /// should use [`Polygon::area`] instead.
    pub fn shoelace_sum(&self) -> f32 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            sum += self.points[i].x * self.points[j].y;
            sum -= self.points[j].x * self.points[i].y;
        }
        sum
    }

    /// Calculates the area of the polygon using the shoelace formula.
    ///
    /// Returns 0.0 if the polygon has fewer than 3 points.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.shoelace_sum().abs() / 2.0
    }

    /// Calculates the perimeter of the polygon.
    pub fn perimeter(&self) -> f32 {
        let mut perimeter = 0.0;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let dx = self.points[j].x - self.points[i].x;
            let dy = self.points[j].y - self.points[i].y;
            perimeter += (dx * dx + dy * dy).sqrt();
        }
        perimeter
    }

    /// Computes the cross product of three points.
    ///
    /// A positive value indicates a counter-clockwise turn, a negative value
    /// indicates a clockwise turn, and zero indicates collinearity.
    fn cross_product(p1: &Point, p2: &Point, p3: &Point) -> f32 {
        (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x)
    }

    /// Computes the convex hull of the polygon using Graham's scan.
    ///
    /// If the polygon has fewer than 3 points, returns a clone of the
    /// original polygon.
    fn convex_hull(&self) -> Polygon {
        if self.points.len() < 3 {
            return self.clone();
        }

        let mut points = self.points.clone();

        // Find the point with the lowest y-coordinate (and leftmost if tied)
        let mut start_idx = 0;
        for i in 1..points.len() {
            if points[i].y < points[start_idx].y
                || (points[i].y == points[start_idx].y && points[i].x < points[start_idx].x)
            {
                start_idx = i;
            }
        }
        points.swap(0, start_idx);
        let start_point = points[0];

        // Sort points by polar angle with respect to the start point
        points[1..].sort_by(|a, b| {
            let cross = Self::cross_product(&start_point, a, b);
            if cross == 0.0 {
                // If points are collinear, sort by distance from start point
                let dist_a = (a.x - start_point.x).powi(2) + (a.y - start_point.y).powi(2);
                let dist_b = (b.x - start_point.x).powi(2) + (b.y - start_point.y).powi(2);
                dist_a
                    .partial_cmp(&dist_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
            } else if cross > 0.0 {
                // Counter-clockwise turn
                std::cmp::Ordering::Less
            } else {
                // Clockwise turn
                std::cmp::Ordering::Greater
            }
        });

        // Build the convex hull using a stack
        let mut hull = Vec::new();
        for point in points {
            // Remove points that make clockwise turns
            while hull.len() > 1
                && Self::cross_product(&hull[hull.len() - 2], &hull[hull.len() - 1], &point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }

        Polygon::new(hull)
    }

    /// Computes the minimum-area rotated rectangle that encloses the polygon.
    ///
    /// Runs the rotating calipers algorithm over the convex hull. If the
    /// polygon has fewer than 3 points, returns a rectangle with zero
    /// dimensions.
    pub fn min_area_rect(&self) -> MinAreaRect {
        if self.points.len() < 3 {
            return MinAreaRect {
                center: Point::new(0.0, 0.0),
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            };
        }

        let hull = self.convex_hull();
        let hull_points = &hull.points;

        // Degenerate hulls (collinear input) fall back to the axis-aligned
        // extent of the original points.
        if hull_points.len() < 3 {
            let Some((min_x, max_x)) = self.points.iter().map(|p| p.x).minmax().into_option()
            else {
                return MinAreaRect {
                    center: Point::new(0.0, 0.0),
                    width: 0.0,
                    height: 0.0,
                    angle: 0.0,
                };
            };
            let Some((min_y, max_y)) = self.points.iter().map(|p| p.y).minmax().into_option()
            else {
                return MinAreaRect {
                    center: Point::new(0.0, 0.0),
                    width: 0.0,
                    height: 0.0,
                    angle: 0.0,
                };
            };

            return MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            };
        }

        let mut min_area = f32::MAX;
        let mut min_rect = MinAreaRect {
            center: Point::new(0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };

        let n = hull_points.len();
        for i in 0..n {
            let j = (i + 1) % n;

            let edge_x = hull_points[j].x - hull_points[i].x;
            let edge_y = hull_points[j].y - hull_points[i].y;
            let edge_length = (edge_x * edge_x + edge_y * edge_y).sqrt();

            // Skip degenerate edges
            if edge_length < f32::EPSILON {
                continue;
            }

            // Normalized edge direction and its perpendicular
            let nx = edge_x / edge_length;
            let ny = edge_y / edge_length;
            let px = -ny;
            let py = nx;

            // Project all hull points onto the edge and perpendicular axes
            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;

            for point in hull_points.iter() {
                let proj_n = nx * (point.x - hull_points[i].x) + ny * (point.y - hull_points[i].y);
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);

                let proj_p = px * (point.x - hull_points[i].x) + py * (point.y - hull_points[i].y);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;

            if area < min_area {
                min_area = area;

                let center_n = (min_n + max_n) / 2.0;
                let center_p = (min_p + max_p) / 2.0;

                let center_x = hull_points[i].x + center_n * nx + center_p * px;
                let center_y = hull_points[i].y + center_n * ny + center_p * py;

                let angle_rad = f32::atan2(ny, nx);
                let angle_deg = angle_rad * 180.0 / PI;

                min_rect = MinAreaRect {
                    center: Point::new(center_x, center_y),
                    width,
                    height,
                    angle: angle_deg,
                };
            }
        }

        min_rect
    }
}

/// A rotated rectangle with minimum area that encloses a shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinAreaRect {
    /// The center point of the rectangle.
    pub center: Point,
    /// The width of the rectangle.
    pub width: f32,
    /// The height of the rectangle.
    pub height: f32,
    /// The rotation angle of the rectangle in degrees.
    pub angle: f32,
}

impl MinAreaRect {
    /// Gets the four corner points of the rectangle.
    ///
    /// Corners are produced by rotating the axis-aligned corners around the
    /// center; no particular image-space ordering is guaranteed. Callers that
    /// need a canonical corner order apply their own sorting.
    pub fn corner_points(&self) -> [Point; 4] {
        let cos_a = (self.angle * PI / 180.0).cos();
        let sin_a = (self.angle * PI / 180.0).sin();

        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;

        let corners = [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)];
        corners.map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        })
    }

    /// Gets the length of the longer side of the rectangle.
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

/// A quadrilateral with integer corner coordinates.
///
/// Corners are ordered top-left, top-right, bottom-right, bottom-left.
/// Serializes transparently as four `[x, y]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quadrilateral {
    /// The four corners as `[x, y]` pairs.
    pub points: [[i32; 2]; 4],
}

impl Quadrilateral {
    /// Creates a new quadrilateral from four corner pairs.
    pub fn new(points: [[i32; 2]; 4]) -> Self {
        Self { points }
    }

    /// Corner coordinates as floating-point points.
    pub fn as_f32_points(&self) -> [Point; 4] {
        self.points.map(|[x, y]| Point::new(x as f32, y as f32))
    }

    /// Maps corners back to source-image coordinates by dividing out the
    /// detection resize ratios, truncating toward zero.
    ///
    /// Truncation (not rounding) is deliberate; downstream consumers clamp
    /// when they sample pixels.
    pub fn rescale(&self, ratio_w: f32, ratio_h: f32) -> Self {
        Self {
            points: self
                .points
                .map(|[x, y]| [(x as f32 / ratio_w) as i32, (y as f32 / ratio_h) as i32]),
        }
    }
}

/// A buffer for processing scanlines when scoring a region of a
/// probability map.
pub(crate) struct ScanlineBuffer {
    /// Intersections of the scanline with polygon edges.
    intersections: Vec<f32>,
}

impl ScanlineBuffer {
    /// Creates a new scanline buffer sized for a ring of `capacity` points.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            intersections: Vec::with_capacity(capacity),
        }
    }

    /// Processes one scanline: finds intersections with the ring's edges and
    /// accumulates probability scores over the pixels inside.
    ///
    /// Returns the accumulated line score and the number of pixels counted.
    pub(crate) fn process_scanline(
        &mut self,
        y: f32,
        ring: &[Point],
        start_x: usize,
        end_x: usize,
        pred: &ndarray::ArrayView2<f32>,
    ) -> (f32, usize) {
        self.intersections.clear();

        let n = ring.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let p1 = &ring[i];
            let p2 = &ring[j];

            // Check if the edge crosses the scanline
            if ((p1.y <= y && y < p2.y) || (p2.y <= y && y < p1.y))
                && (p2.y - p1.y).abs() > f32::EPSILON
            {
                let x = p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y);
                self.intersections.push(x);
            }
        }

        self.intersections
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut line_score = 0.0;
        let mut line_pixels = 0;

        // Pairs of intersections bound the segments inside the ring
        for chunk in self.intersections.chunks(2) {
            if chunk.len() == 2 {
                let x1 = chunk[0].max(start_x as f32) as usize;
                let x2 = chunk[1].min(end_x as f32) as usize;

                if x1 < x2 && x1 >= start_x && x2 <= end_x {
                    for x in x1..x2 {
                        if (y as usize) < pred.shape()[0] && x < pred.shape()[1] {
                            line_score += pred[[y as usize, x]];
                            line_pixels += 1;
                        }
                    }
                }
            }
        }

        (line_score, line_pixels)
    }
}
