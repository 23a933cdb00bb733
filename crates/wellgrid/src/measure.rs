//! Per-well measurement pipeline: decode, sample every center, transform.

use rayon::prelude::*;

use crate::grid::{well_centers, well_label, GeometryError, GridParams, WellCenter};
use crate::photometry::transform;
use crate::raster::{decode_rgb, DecodeError, Raster};
use crate::sample::sample_well;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors that abort a plate analysis before any measurement is produced.
#[derive(Debug)]
pub enum AnalysisError {
    /// Grid parameters failed validation.
    Geometry(GeometryError),
    /// Image bytes could not be decoded.
    Decode(DecodeError),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geometry(err) => write!(f, "invalid grid geometry: {}", err),
            Self::Decode(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Geometry(err) => Some(err),
            Self::Decode(err) => Some(err),
        }
    }
}

impl From<GeometryError> for AnalysisError {
    fn from(err: GeometryError) -> Self {
        Self::Geometry(err)
    }
}

impl From<DecodeError> for AnalysisError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err)
    }
}

// ── Types ──────────────────────────────────────────────────────────────────

/// Full measurement record for one well of one analysis run.
///
/// Produced per analysis and superseded wholesale by re-analysis, never
/// merged.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellMeasurement {
    /// 0-based row index.
    pub row: usize,
    /// 0-based column index.
    pub column: usize,
    /// Mean green intensity over the ROI.
    pub green_mean: f64,
    /// Mean blue intensity over the ROI.
    pub blue_mean: f64,
    /// Blue mean / green mean.
    pub blue_to_green_ratio: f64,
    /// Absorbance of the green channel.
    pub green_absorbance: f64,
    /// Absorbance of the blue channel.
    pub blue_absorbance: f64,
    /// Green absorbance / blue absorbance.
    pub absorbance_ratio: f64,
    /// Number of ROI pixels inside the image.
    pub pixel_count: usize,
    /// Concentration resolved from the calibration curve, sample wells only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_concentration: Option<f64>,
}

impl WellMeasurement {
    /// True when the ROI sampled no pixels (well outside the image).
    ///
    /// Incomplete wells carry zeroed means and sentinel photometry; they
    /// are reported but excluded from calibration.
    pub fn is_incomplete(&self) -> bool {
        self.pixel_count == 0
    }

    /// Conventional label for this well's position, e.g. "A1".
    pub fn label(&self) -> String {
        well_label(self.row, self.column)
    }
}

// ── Operations ─────────────────────────────────────────────────────────────

/// Measure every well of the grid in one image.
///
/// Pure with respect to persistence: no classification is consulted and
/// `calculated_concentration` is left unset. Geometry is validated before
/// the image bytes are touched; either failure aborts with no output.
/// Output order is row-major regardless of worker scheduling, so repeated
/// runs over identical input are byte-for-byte identical.
pub fn analyze(
    image_bytes: &[u8],
    params: &GridParams,
) -> Result<Vec<WellMeasurement>, AnalysisError> {
    let centers = well_centers(params)?;
    let raster = decode_rgb(image_bytes)?;
    tracing::debug!(
        "decoded plate image {}x{} for a {}x{} grid",
        Raster::width(&raster),
        Raster::height(&raster),
        params.rows,
        params.columns,
    );
    Ok(measure_wells(&raster, &centers, params.sampling_radius()))
}

/// Sample and transform the given well centers over one raster.
///
/// Wells are independent, so sampling fans out across the rayon pool;
/// the collect keeps the input order.
pub fn measure_wells<R: Raster + Sync>(
    raster: &R,
    centers: &[WellCenter],
    radius: f64,
) -> Vec<WellMeasurement> {
    let measurements: Vec<WellMeasurement> = centers
        .par_iter()
        .map(|center| measure_one(raster, center, radius))
        .collect();

    let incomplete = measurements.iter().filter(|m| m.is_incomplete()).count();
    if incomplete > 0 {
        tracing::warn!(
            "{} of {} wells sampled no pixels (ROI outside the image)",
            incomplete,
            measurements.len(),
        );
    }
    tracing::info!("measured {} wells (radius {:.1}px)", measurements.len(), radius);
    measurements
}

fn measure_one<R: Raster>(raster: &R, center: &WellCenter, radius: f64) -> WellMeasurement {
    let sample = sample_well(raster, (center.x, center.y), radius);
    let photo = transform(&sample);
    WellMeasurement {
        row: center.row,
        column: center.column,
        green_mean: sample.green_mean,
        blue_mean: sample.blue_mean,
        blue_to_green_ratio: photo.blue_to_green_ratio,
        green_absorbance: photo.green_absorbance,
        blue_absorbance: photo.blue_absorbance,
        absorbance_ratio: photo.absorbance_ratio,
        pixel_count: sample.pixel_count,
        calculated_concentration: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photometry::MAX_ABSORBANCE;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    fn uniform_plate_png(g: u8, b: u8) -> Vec<u8> {
        png_bytes(&RgbImage::from_pixel(300, 200, Rgb([0, g, b])))
    }

    fn small_grid() -> GridParams {
        GridParams {
            rows: 2,
            columns: 3,
            x_origin: 60,
            y_origin: 60,
            x_end: 240,
            y_end: 140,
            well_diameter: 40,
        }
    }

    #[test]
    fn analyze_measures_every_well_in_row_major_order() {
        let bytes = uniform_plate_png(120, 80);
        let wells = analyze(&bytes, &small_grid()).expect("analysis succeeds");

        assert_eq!(wells.len(), 6);
        let positions: Vec<(usize, usize)> = wells.iter().map(|w| (w.row, w.column)).collect();
        assert_eq!(
            positions,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );

        for well in &wells {
            assert_relative_eq!(well.green_mean, 120.0);
            assert_relative_eq!(well.blue_mean, 80.0);
            assert_relative_eq!(well.blue_to_green_ratio, 80.0 / 120.0);
            assert!(well.pixel_count > 0);
            assert!(!well.is_incomplete());
            assert_eq!(well.calculated_concentration, None);
        }
        assert_eq!(wells[5].label(), "B3");
    }

    #[test]
    fn analyze_is_deterministic() {
        let bytes = uniform_plate_png(93, 41);
        let first = analyze(&bytes, &small_grid()).expect("analysis succeeds");
        let second = analyze(&bytes, &small_grid()).expect("analysis succeeds");
        assert_eq!(first, second);

        let first_json = serde_json::to_string(&first).expect("serializable");
        let second_json = serde_json::to_string(&second).expect("serializable");
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn geometry_is_checked_before_decode() {
        let bad_grid = GridParams {
            rows: 0,
            ..small_grid()
        };
        // Bytes are garbage too; the geometry error must win.
        let err = analyze(&[1, 2, 3], &bad_grid).expect_err("invalid grid");
        assert!(matches!(err, AnalysisError::Geometry(_)));
    }

    #[test]
    fn undecodable_bytes_abort_the_analysis() {
        let err = analyze(&[1, 2, 3], &small_grid()).expect_err("garbage bytes");
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn out_of_image_wells_degrade_to_incomplete() {
        // Grid extends far past the 300x200 image; the last column of
        // wells has no pixels but the plate still analyzes.
        let params = GridParams {
            rows: 1,
            columns: 3,
            x_origin: 60,
            y_origin: 100,
            x_end: 1000,
            y_end: 100,
            well_diameter: 40,
        };
        let bytes = uniform_plate_png(120, 80);
        let wells = analyze(&bytes, &params).expect("analysis succeeds");

        assert_eq!(wells.len(), 3);
        assert!(!wells[0].is_incomplete());
        assert!(wells[2].is_incomplete());
        assert_relative_eq!(wells[2].green_mean, 0.0);
        assert_relative_eq!(wells[2].blue_mean, 0.0);
        assert_relative_eq!(wells[2].blue_to_green_ratio, 0.0);
        assert_relative_eq!(wells[2].green_absorbance, MAX_ABSORBANCE);
    }

    #[test]
    fn incomplete_wells_serialize_without_concentration() {
        let bytes = uniform_plate_png(10, 10);
        let wells = analyze(&bytes, &small_grid()).expect("analysis succeeds");
        let json = serde_json::to_string(&wells[0]).expect("serializable");
        assert!(!json.contains("calculated_concentration"));
        assert!(json.contains("\"pixel_count\""));
    }
}
