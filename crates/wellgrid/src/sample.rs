//! Circular ROI sampling of green and blue channel intensities.

use crate::raster::Raster;

/// Aggregated channel intensities for one well ROI.
///
/// `pixel_count == 0` means the ROI fell entirely outside the image;
/// the means are reported as 0 and the well is flagged incomplete
/// downstream instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChannelSample {
    /// Mean green intensity over the ROI (0-255).
    pub green_mean: f64,
    /// Mean blue intensity over the ROI (0-255).
    pub blue_mean: f64,
    /// Number of pixels inside both the circle and the image.
    pub pixel_count: usize,
}

impl ChannelSample {
    /// Sample for an ROI with no usable pixels.
    pub fn empty() -> Self {
        Self {
            green_mean: 0.0,
            blue_mean: 0.0,
            pixel_count: 0,
        }
    }
}

/// Aggregate green/blue intensities over a circular ROI.
///
/// A pixel at integer position (x, y) is included iff
/// `(x - cx)^2 + (y - cy)^2 <= radius^2` and (x, y) lies inside the
/// image. The scan covers only the circle's bounding box, clipped to
/// the image edges.
pub fn sample_well<R: Raster>(raster: &R, center: (f64, f64), radius: f64) -> ChannelSample {
    let (cx, cy) = center;
    let width = raster.width() as i64;
    let height = raster.height() as i64;

    let x_min = ((cx - radius).floor() as i64).max(0);
    let x_max = ((cx + radius).ceil() as i64).min(width - 1);
    let y_min = ((cy - radius).floor() as i64).max(0);
    let y_max = ((cy + radius).ceil() as i64).min(height - 1);
    if x_min > x_max || y_min > y_max {
        return ChannelSample::empty();
    }

    let r_sq = radius * radius;
    let mut green_sum: u64 = 0;
    let mut blue_sum: u64 = 0;
    let mut count: usize = 0;

    for y in y_min..=y_max {
        let dy = y as f64 - cy;
        for x in x_min..=x_max {
            let dx = x as f64 - cx;
            if dx * dx + dy * dy > r_sq {
                continue;
            }
            let [_, g, b] = raster.pixel_at(x as u32, y as u32);
            green_sum += g as u64;
            blue_sum += b as u64;
            count += 1;
        }
    }

    if count == 0 {
        return ChannelSample::empty();
    }
    ChannelSample {
        green_mean: green_sum as f64 / count as f64,
        blue_mean: blue_sum as f64 / count as f64,
        pixel_count: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    fn uniform(width: u32, height: u32, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([0, g, b]))
    }

    #[test]
    fn uniform_roi_reports_exact_means() {
        let img = uniform(200, 200, 120, 80);
        let sample = sample_well(&img, (100.0, 100.0), 36.0);

        assert_relative_eq!(sample.green_mean, 120.0);
        assert_relative_eq!(sample.blue_mean, 80.0);

        // Discrete disc area tracks pi*r^2 to within the boundary band.
        let expected = std::f64::consts::PI * 36.0 * 36.0;
        let band = 2.0 * std::f64::consts::PI * 36.0;
        assert!(
            (sample.pixel_count as f64 - expected).abs() < band,
            "pixel_count {} too far from pi*r^2 = {:.1}",
            sample.pixel_count,
            expected
        );
    }

    #[test]
    fn tiny_disc_has_known_pixel_count() {
        // radius 1.5 around an integer center: offsets with dx^2+dy^2 <= 2.25
        // are the 3x3 neighborhood, 9 pixels.
        let img = uniform(10, 10, 50, 200);
        let sample = sample_well(&img, (5.0, 5.0), 1.5);
        assert_eq!(sample.pixel_count, 9);
        assert_relative_eq!(sample.green_mean, 50.0);
        assert_relative_eq!(sample.blue_mean, 200.0);
    }

    #[test]
    fn roi_is_clipped_at_image_edges() {
        // Center on the corner pixel: only the in-bounds quadrant remains.
        let img = uniform(8, 8, 30, 60);
        let sample = sample_well(&img, (0.0, 0.0), 1.5);
        assert_eq!(sample.pixel_count, 4);
        assert_relative_eq!(sample.green_mean, 30.0);
    }

    #[test]
    fn fully_outside_roi_reports_zero() {
        let img = uniform(8, 8, 30, 60);
        let sample = sample_well(&img, (100.0, 100.0), 3.0);
        assert_eq!(sample, ChannelSample::empty());

        let negative = sample_well(&img, (-50.0, 4.0), 3.0);
        assert_eq!(negative.pixel_count, 0);
    }

    #[test]
    fn mixed_roi_averages_only_inside_pixels() {
        // Left half bright, right half dark; ROI centered on the seam.
        let mut img = uniform(20, 20, 0, 0);
        for y in 0..20 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([0, 200, 100]));
            }
        }
        let sample = sample_well(&img, (9.5, 10.0), 2.0);
        assert!(sample.pixel_count > 0);
        // Symmetric seam ROI: half the pixels at 200, half at 0.
        assert_relative_eq!(sample.green_mean, 100.0);
        assert_relative_eq!(sample.blue_mean, 50.0);
    }
}
