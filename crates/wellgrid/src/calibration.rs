//! Per-plate calibration cache with copy-on-write replacement.
//!
//! A fitted curve is published as an immutable [`PlateCalibration`] behind
//! an `Arc`; recomputation builds a fresh value and swaps the map entry,
//! so readers either see the old calibration or the new one, never a
//! half-updated mix.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::curve::{fit_standard_curve, CurveError, RegressionResult, StandardPoint};
use crate::PlateId;

/// A fitted standard curve together with the points that produced it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlateCalibration {
    /// Plate the curve belongs to.
    pub plate_id: PlateId,
    /// Fitted line and goodness of fit.
    pub regression: RegressionResult,
    /// Averaged calibration points, ascending concentration.
    pub source_points: Vec<StandardPoint>,
}

/// Read-through cache of fitted calibrations, keyed by plate.
#[derive(Debug, Default)]
pub struct CalibrationCache {
    entries: RwLock<HashMap<PlateId, Arc<PlateCalibration>>>,
}

impl CalibrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored calibration for a plate, if any.
    pub fn get(&self, plate_id: PlateId) -> Option<Arc<PlateCalibration>> {
        self.entries.read().get(&plate_id).cloned()
    }

    /// Return the stored calibration or fit and store one from `points`.
    pub fn get_or_compute(
        &self,
        plate_id: PlateId,
        points: &[StandardPoint],
    ) -> Result<Arc<PlateCalibration>, CurveError> {
        if let Some(hit) = self.get(plate_id) {
            return Ok(hit);
        }
        self.recompute(plate_id, points)
    }

    /// Unconditionally refit and replace the stored calibration.
    ///
    /// The fit runs outside the lock; on failure any previously cached
    /// calibration stays in place untouched.
    pub fn recompute(
        &self,
        plate_id: PlateId,
        points: &[StandardPoint],
    ) -> Result<Arc<PlateCalibration>, CurveError> {
        let regression = fit_standard_curve(points)?;
        let calibration = Arc::new(PlateCalibration {
            plate_id,
            regression,
            source_points: points.to_vec(),
        });
        self.entries
            .write()
            .insert(plate_id, Arc::clone(&calibration));
        tracing::debug!(
            "calibration for plate {} refit from {} points (slope {:.4})",
            plate_id,
            calibration.regression.point_count,
            calibration.regression.slope,
        );
        Ok(calibration)
    }

    /// Drop the stored calibration, forcing the next read to refit.
    ///
    /// Returns whether an entry was present.
    pub fn invalidate(&self, plate_id: PlateId) -> bool {
        self.entries.write().remove(&plate_id).is_some()
    }

    /// Number of plates with a cached calibration.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
