//! Well classification and measurement storage seam.
//!
//! The engine consumes well classes (who is a standard, what concentration
//! it carries) and writes measurement batches; everything else about
//! durable storage belongs to the caller. [`MemoryStore`] is the reference
//! implementation used by the CLI and tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::measure::WellMeasurement;
use crate::PlateId;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by well stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No plate registered under this id.
    UnknownPlate {
        /// The requested plate id.
        plate_id: PlateId,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPlate { plate_id } => write!(f, "no plate with id {}", plate_id),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Types ──────────────────────────────────────────────────────────────────

/// Role of a well on the plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKind {
    /// Known concentration; feeds the standard curve.
    Standard,
    /// Unknown concentration; resolved via the curve.
    Sample,
    /// Measured and reported, no concentration resolution.
    Control,
    /// Reagent-only well, measured and reported.
    Blank,
    /// Unused position, excluded from all computation and reporting.
    Empty,
}

/// Externally supplied classification of one well.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellClass {
    /// 0-based row index.
    pub row: usize,
    /// 0-based column index.
    pub column: usize,
    /// Role of the well.
    pub kind: WellKind,
    /// Known concentration, required for standard wells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_concentration: Option<f64>,
    /// Free-form sample name, sample wells only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,
    /// Dilution applied before plating; not interpreted by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dilution_factor: Option<f64>,
    /// Replicate group tag; not interpreted by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate_group: Option<String>,
}

// ── Store trait ────────────────────────────────────────────────────────────

/// Persistence collaborator for well classes and measurement batches.
///
/// Implementations must replace a plate's measurements as one unit so a
/// concurrent reader never observes a partially updated well set.
pub trait WellStore {
    /// Well classes for a plate, including empty positions.
    fn classifications(&self, plate_id: PlateId) -> Result<Vec<WellClass>, StoreError>;

    /// Replace all of a plate's measurements with a new batch.
    fn replace_measurements(
        &self,
        plate_id: PlateId,
        measurements: Vec<WellMeasurement>,
    ) -> Result<(), StoreError>;

    /// Stored measurements for a plate, in the order they were written.
    fn measurements(&self, plate_id: PlateId) -> Result<Vec<WellMeasurement>, StoreError>;
}

// ── In-memory implementation ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct PlateRecord {
    classes: Vec<WellClass>,
    measurements: Vec<WellMeasurement>,
}

/// Thread-safe in-memory well store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    plates: RwLock<HashMap<PlateId, PlateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plate (or replace its classes), keeping row-major order.
    pub fn set_classifications(&self, plate_id: PlateId, mut classes: Vec<WellClass>) {
        classes.sort_by_key(|c| (c.row, c.column));
        let mut plates = self.plates.write();
        let record = plates.entry(plate_id).or_default();
        record.classes = classes;
    }

    /// Ids of all registered plates, sorted.
    pub fn plate_ids(&self) -> Vec<PlateId> {
        let mut ids: Vec<PlateId> = self.plates.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl WellStore for MemoryStore {
    fn classifications(&self, plate_id: PlateId) -> Result<Vec<WellClass>, StoreError> {
        self.plates
            .read()
            .get(&plate_id)
            .map(|record| record.classes.clone())
            .ok_or(StoreError::UnknownPlate { plate_id })
    }

    fn replace_measurements(
        &self,
        plate_id: PlateId,
        measurements: Vec<WellMeasurement>,
    ) -> Result<(), StoreError> {
        let mut plates = self.plates.write();
        let record = plates
            .get_mut(&plate_id)
            .ok_or(StoreError::UnknownPlate { plate_id })?;
        record.measurements = measurements;
        Ok(())
    }

    fn measurements(&self, plate_id: PlateId) -> Result<Vec<WellMeasurement>, StoreError> {
        self.plates
            .read()
            .get(&plate_id)
            .map(|record| record.measurements.clone())
            .ok_or(StoreError::UnknownPlate { plate_id })
    }
}
