//! Perspective rectification of detected text regions.
//!
//! A detected quadrilateral is cropped to its bounding box, warped to an
//! axis-aligned rectangle sized by its edge lengths, and rotated upright
//! when the result is markedly taller than wide.

use crate::core::OcrError;
use crate::processors::{Point, Quadrilateral};
use crate::utils::math::clampf;
use image::{Rgb, RgbImage, imageops};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use tracing::debug;

/// Euclidean distance between two points.
fn distance(p1: &Point, p2: &Point) -> f32 {
    (p1.x - p2.x).hypot(p1.y - p2.y)
}

/// Extracts and straightens the region of `src_image` enclosed by `quad`.
///
/// The image is first cropped to the quadrilateral's bounding box (clamped
/// into the image), then warped so the quadrilateral's corners map onto an
/// axis-aligned rectangle. The target width is the length of the top edge
/// and the target height the length of the left edge, both truncated to
/// whole pixels. Samples that fall outside the cropped region replicate the
/// nearest edge pixel. If the rectified region is at least 1.5x taller than
/// it is wide, it is rotated a quarter turn to bring the text horizontal.
///
/// # Errors
///
/// Returns [`OcrError::InvalidInput`] if the clamped bounding box or either
/// target dimension is empty, or if the perspective system cannot be solved.
/// Callers typically treat this as a per-region rejection rather than a
/// pipeline failure.
pub fn rectify(src_image: &RgbImage, quad: &Quadrilateral) -> Result<RgbImage, OcrError> {
    let corners = quad.as_f32_points();

    // Bounding box of the corners, clamped into the source image.
    let mut min_x = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for p in &corners {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let left = min_x.max(0.0) as u32;
    let top = min_y.max(0.0) as u32;
    let right = max_x.min(src_image.width() as f32) as u32;
    let bottom = max_y.min(src_image.height() as f32) as u32;

    if right <= left || bottom <= top {
        return Err(OcrError::invalid_input("empty crop region"));
    }

    let img_crop = imageops::crop_imm(src_image, left, top, right - left, bottom - top).to_image();

    // Corners relative to the cropped image.
    let points = corners.map(|p| Point::new(p.x - left as f32, p.y - top as f32));

    // Target size from single edge lengths, truncated.
    let target_width = distance(&points[0], &points[1]) as u32;
    let target_height = distance(&points[0], &points[3]) as u32;

    if target_width == 0 || target_height == 0 {
        return Err(OcrError::invalid_input("degenerate region dimensions"));
    }

    let pts_std = [
        Point::new(0.0, 0.0),
        Point::new(target_width as f32, 0.0),
        Point::new(target_width as f32, target_height as f32),
        Point::new(0.0, target_height as f32),
    ];

    let transform_matrix = get_perspective_transform(&points, &pts_std)?;
    let dst_img = warp_perspective(&img_crop, &transform_matrix, target_width, target_height)?;

    // Bring vertical text horizontal.
    if dst_img.height() as f32 >= dst_img.width() as f32 * 1.5 {
        debug!(
            "rotating rectified region due to aspect ratio: {}x{}",
            dst_img.width(),
            dst_img.height()
        );
        Ok(imageops::rotate270(&dst_img))
    } else {
        Ok(dst_img)
    }
}

/// Solves for the 3x3 matrix mapping `src_points` onto `dst_points`.
///
/// The eight unknown coefficients come from an 8x8 linear system, one pair
/// of equations per point correspondence. Returns
/// [`OcrError::InvalidInput`] when the system is singular.
fn get_perspective_transform(
    src_points: &[Point; 4],
    dst_points: &[Point; 4],
) -> Result<Matrix3<f32>, OcrError> {
    let mut a = nalgebra::DMatrix::<f32>::zeros(8, 8);
    let mut b = nalgebra::DVector::<f32>::zeros(8);

    for i in 0..4 {
        let src = &src_points[i];
        let dst = &dst_points[i];

        a.set_row(
            i * 2,
            &nalgebra::RowDVector::from_row_slice(&[
                src.x,
                src.y,
                1.0,
                0.0,
                0.0,
                0.0,
                -src.x * dst.x,
                -src.y * dst.x,
            ]),
        );
        b[i * 2] = dst.x;

        a.set_row(
            i * 2 + 1,
            &nalgebra::RowDVector::from_row_slice(&[
                0.0,
                0.0,
                0.0,
                src.x,
                src.y,
                1.0,
                -src.x * dst.y,
                -src.y * dst.y,
            ]),
        );
        b[i * 2 + 1] = dst.y;
    }

    let decomp = a.lu();
    let solution = decomp
        .solve(&b)
        .ok_or_else(|| OcrError::invalid_input("cannot solve perspective transform"))?;

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// Inverse-mapped perspective warp with bilinear sampling, one rayon task
/// per output row. Source coordinates are clamped into the image so
/// out-of-bounds samples replicate the nearest edge pixel.
fn warp_perspective(
    src_image: &RgbImage,
    transform_matrix: &Matrix3<f32>,
    dst_width: u32,
    dst_height: u32,
) -> Result<RgbImage, OcrError> {
    let inv_matrix = transform_matrix
        .try_inverse()
        .ok_or_else(|| OcrError::invalid_input("cannot invert transformation matrix"))?;

    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let (src_width, src_height) = src_image.dimensions();
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let dst_point = Vector3::new(dst_x as f32, dst_y as f32, 1.0);
                let src_point = inv_matrix * dst_point;

                let mut final_pixel = Rgb([0, 0, 0]);

                // Points at infinity stay black.
                if src_point.z.abs() > f32::EPSILON {
                    let src_x = clampf(src_point.x / src_point.z, 0.0, (src_width - 1) as f32);
                    let src_y = clampf(src_point.y / src_point.z, 0.0, (src_height - 1) as f32);
                    final_pixel = bilinear_interpolate(src_image, src_x, src_y);
                }

                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&final_pixel.0);
            }
        });

    Ok(dst_image)
}

/// Pixel value at fractional coordinates, interpolated from the four
/// nearest neighbors.
fn bilinear_interpolate(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x1 = x.floor() as u32;
    let y1 = y.floor() as u32;
    let x2 = (x1 + 1).min(image.width() - 1);
    let y2 = (y1 + 1).min(image.height() - 1);

    let dx = x - x1 as f32;
    let dy = y - y1 as f32;

    let p11 = image.get_pixel(x1, y1);
    let p12 = image.get_pixel(x1, y2);
    let p21 = image.get_pixel(x2, y1);
    let p22 = image.get_pixel(x2, y2);

    let mut result = [0u8; 3];
    for (i, result_channel) in result.iter_mut().enumerate() {
        let val = (1.0 - dx) * (1.0 - dy) * p11.0[i] as f32
            + dx * (1.0 - dy) * p21.0[i] as f32
            + (1.0 - dx) * dy * p12.0[i] as f32
            + dx * dy * p22.0[i] as f32;
        *result_channel = val.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 25) as u8;
                let g = (y * 60) as u8;
                let b = ((x + y) * 10) as u8;
                image.put_pixel(x, y, Rgb([r, g, b]));
            }
        }
        image
    }

    #[test]
    fn distance_is_euclidean() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(3.0, 4.0);
        assert_eq!(distance(&p1, &p2), 5.0);
    }

    #[test]
    fn rectify_identity_is_pixel_exact() {
        let image = gradient_image(10, 4);
        let quad = Quadrilateral::new([[0, 0], [10, 0], [10, 4], [0, 4]]);

        let out = rectify(&image, &quad).unwrap();

        assert_eq!(out.dimensions(), (10, 4));
        for y in 0..4 {
            for x in 0..10 {
                assert_eq!(out.get_pixel(x, y), image.get_pixel(x, y), "at ({x},{y})");
            }
        }
    }

    #[test]
    fn rectify_rotates_tall_regions() {
        // 4x10 region: height >= 1.5 * width, so the result comes back
        // rotated to 10x4 with the original top row along the left edge.
        let mut image = RgbImage::new(4, 10);
        for x in 0..4 {
            image.put_pixel(x, 0, Rgb([255, 0, 0]));
        }
        let quad = Quadrilateral::new([[0, 0], [4, 0], [4, 10], [0, 10]]);

        let out = rectify(&image, &quad).unwrap();

        assert_eq!(out.dimensions(), (10, 4));
        for y in 0..4 {
            assert_eq!(*out.get_pixel(0, y), Rgb([255, 0, 0]));
        }
        assert_eq!(*out.get_pixel(9, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn rectify_replicates_edges_outside_source() {
        // The quad reaches two pixels past each side of the image; the
        // out-of-range samples must replicate the border, not go black.
        let mut image = RgbImage::new(10, 4);
        for y in 0..4 {
            for x in 0..10 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let quad = Quadrilateral::new([[-2, 0], [12, 0], [12, 4], [-2, 4]]);

        let out = rectify(&image, &quad).unwrap();

        assert_eq!(out.dimensions(), (14, 4));
        for y in 0..4 {
            for x in 0..14 {
                assert_eq!(*out.get_pixel(x, y), Rgb([255, 255, 255]), "at ({x},{y})");
            }
        }
    }

    #[test]
    fn rectify_rejects_empty_region() {
        let image = gradient_image(10, 4);
        let quad = Quadrilateral::new([[2, 2], [2, 2], [2, 2], [2, 2]]);

        assert!(rectify(&image, &quad).is_err());
    }

    #[test]
    fn rectify_rejects_zero_width_target() {
        let image = gradient_image(10, 4);
        // Non-empty bounding box but a zero-length top edge.
        let quad = Quadrilateral::new([[0, 0], [0, 0], [5, 4], [5, 4]]);

        assert!(rectify(&image, &quad).is_err());
    }

    #[test]
    fn perspective_transform_maps_points() {
        let src_points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let dst_points = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];

        let transform = get_perspective_transform(&src_points, &dst_points).unwrap();

        let mapped = transform * Vector3::new(0.5, 0.5, 1.0);
        assert!((mapped.x / mapped.z - 1.0).abs() < 1e-4);
        assert!((mapped.y / mapped.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn singular_transform_is_rejected() {
        let image = RgbImage::new(2, 2);
        let matrix = Matrix3::new(1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0);

        assert!(warp_perspective(&image, &matrix, 2, 2).is_err());
    }

    #[test]
    fn bilinear_interpolate_center_averages_neighbors() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        image.put_pixel(1, 1, Rgb([255, 255, 0]));

        let pixel = bilinear_interpolate(&image, 0.5, 0.5);
        assert_eq!(pixel.0, [128, 128, 64]);
    }
}
