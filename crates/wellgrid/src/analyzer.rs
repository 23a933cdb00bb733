//! High-level plate analysis API.
//!
//! [`PlateAnalyzer`] is the primary entry point: it reads well classes
//! from a [`WellStore`], measures the classified wells of an image,
//! maintains the per-plate calibration, and writes measurement batches
//! back through the store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::calibration::{CalibrationCache, PlateCalibration};
use crate::curve::{group_standard_points, resolve_concentration, CurveError, StandardPoint};
use crate::grid::{validate_grid, GeometryError, GridParams, WellCenter};
use crate::measure::{measure_wells, AnalysisError, WellMeasurement};
use crate::raster::{decode_rgb, DecodeError};
use crate::store::{StoreError, WellClass, WellKind, WellStore};
use crate::PlateId;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors surfaced by [`PlateAnalyzer`] operations.
#[derive(Debug)]
pub enum AnalyzerError {
    /// Measuring the plate failed before any output was produced.
    Analysis(AnalysisError),
    /// The well store rejected a read or write.
    Store(StoreError),
    /// No usable standard curve could be fit.
    Calibration(CurveError),
}

impl std::fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis(err) => err.fmt(f),
            Self::Store(err) => err.fmt(f),
            Self::Calibration(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Analysis(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Calibration(err) => Some(err),
        }
    }
}

impl From<AnalysisError> for AnalyzerError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

impl From<GeometryError> for AnalyzerError {
    fn from(err: GeometryError) -> Self {
        Self::Analysis(AnalysisError::Geometry(err))
    }
}

impl From<DecodeError> for AnalyzerError {
    fn from(err: DecodeError) -> Self {
        Self::Analysis(AnalysisError::Decode(err))
    }
}

impl From<StoreError> for AnalyzerError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<CurveError> for AnalyzerError {
    fn from(err: CurveError) -> Self {
        Self::Calibration(err)
    }
}

// ── Analyzer ───────────────────────────────────────────────────────────────

/// Plate analysis service over a well store.
///
/// Create once, analyze many plates; the calibration cache lives with
/// the analyzer.
pub struct PlateAnalyzer<S: WellStore> {
    store: S,
    cache: CalibrationCache,
}

impl<S: WellStore> PlateAnalyzer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: CalibrationCache::new(),
        }
    }

    /// Access the underlying well store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Measure every classified well, refit the plate's calibration, and
    /// persist the batch.
    ///
    /// Empty positions are skipped entirely. The plate's previous
    /// measurements are replaced as one unit, so re-analysis never leaves
    /// stale wells beside fresh ones. Sample wells get a concentration
    /// when a curve could be fit; otherwise a warning is logged and the
    /// measurements persist with concentrations absent.
    pub fn analyze_and_persist(
        &self,
        plate_id: PlateId,
        image_bytes: &[u8],
        params: &GridParams,
    ) -> Result<Vec<WellMeasurement>, AnalyzerError> {
        let mut classes = self.store.classifications(plate_id)?;
        classes.retain(|c| c.kind != WellKind::Empty);
        classes.sort_by_key(|c| (c.row, c.column));

        validate_grid(params)?;
        let raster = decode_rgb(image_bytes)?;

        // Centers come from the class list, not the full grid, so plates
        // with unused regions only pay for the wells they use.
        let spacing_x = params.spacing_x();
        let spacing_y = params.spacing_y();
        let centers: Vec<WellCenter> = classes
            .iter()
            .map(|c| WellCenter {
                row: c.row,
                column: c.column,
                x: params.x_origin as f64 + c.column as f64 * spacing_x,
                y: params.y_origin as f64 + c.row as f64 * spacing_y,
            })
            .collect();

        let mut measurements = measure_wells(&raster, &centers, params.sampling_radius());

        // The image changed, so any cached curve is stale regardless of
        // whether the refit below succeeds.
        self.cache.invalidate(plate_id);
        let pairs = standard_pairs(&classes, &measurements);
        let points = group_standard_points(&pairs);
        let calibration = match self.cache.recompute(plate_id, &points) {
            Ok(calibration) => Some(calibration),
            Err(err) => {
                tracing::warn!("no calibration for plate {}: {}", plate_id, err);
                None
            }
        };

        if let Some(calibration) = &calibration {
            for (class, measurement) in classes.iter().zip(measurements.iter_mut()) {
                if class.kind == WellKind::Sample && !measurement.is_incomplete() {
                    measurement.calculated_concentration = Some(resolve_concentration(
                        measurement.blue_to_green_ratio,
                        &calibration.regression,
                    ));
                }
            }
        }

        self.store
            .replace_measurements(plate_id, measurements.clone())?;

        let standards = classes
            .iter()
            .filter(|c| c.kind == WellKind::Standard)
            .count();
        let samples = classes.iter().filter(|c| c.kind == WellKind::Sample).count();
        tracing::info!(
            "plate {}: persisted {} measurements ({} standards, {} samples)",
            plate_id,
            measurements.len(),
            standards,
            samples,
        );
        Ok(measurements)
    }

    /// Cached calibration for a plate, fit from stored measurements on miss.
    pub fn calibration(&self, plate_id: PlateId) -> Result<Arc<PlateCalibration>, AnalyzerError> {
        if let Some(hit) = self.cache.get(plate_id) {
            return Ok(hit);
        }
        let points = self.stored_standard_points(plate_id)?;
        Ok(self.cache.get_or_compute(plate_id, &points)?)
    }

    /// Refit the calibration from stored measurements, replacing the cache.
    ///
    /// A failed refit leaves any previously cached calibration in place.
    pub fn recalculate_calibration(
        &self,
        plate_id: PlateId,
    ) -> Result<Arc<PlateCalibration>, AnalyzerError> {
        let points = self.stored_standard_points(plate_id)?;
        Ok(self.cache.recompute(plate_id, &points)?)
    }

    /// Drop the plate's cached calibration; the caller signals that the
    /// image or classification changed.
    pub fn invalidate_calibration(&self, plate_id: PlateId) -> bool {
        self.cache.invalidate(plate_id)
    }

    fn stored_standard_points(
        &self,
        plate_id: PlateId,
    ) -> Result<Vec<StandardPoint>, AnalyzerError> {
        let classes = self.store.classifications(plate_id)?;
        let measurements = self.store.measurements(plate_id)?;
        let by_position: HashMap<(usize, usize), &WellMeasurement> = measurements
            .iter()
            .map(|m| ((m.row, m.column), m))
            .collect();

        let mut pairs = Vec::new();
        for class in classes.iter().filter(|c| c.kind == WellKind::Standard) {
            let Some(concentration) = class.standard_concentration else {
                continue;
            };
            let Some(measurement) = by_position.get(&(class.row, class.column)) else {
                continue;
            };
            if measurement.is_incomplete() {
                continue;
            }
            pairs.push((concentration, measurement.blue_to_green_ratio));
        }
        Ok(group_standard_points(&pairs))
    }
}

/// Pair each complete standard well with its known concentration.
///
/// Classes and measurements must be in the same order. Incomplete wells
/// are excluded so sentinel photometry never reaches the regression.
fn standard_pairs(classes: &[WellClass], measurements: &[WellMeasurement]) -> Vec<(f64, f64)> {
    classes
        .iter()
        .zip(measurements)
        .filter(|(class, measurement)| {
            class.kind == WellKind::Standard && !measurement.is_incomplete()
        })
        .filter_map(|(class, measurement)| {
            class
                .standard_concentration
                .map(|concentration| (concentration, measurement.blue_to_green_ratio))
        })
        .collect()
}
