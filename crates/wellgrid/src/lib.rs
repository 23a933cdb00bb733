//! Plate-photo analysis for colorimetric protein assays.
//!
//! The crate turns a photographed assay plate into per-well photometry
//! and concentrations:
//!
//! 1. [`grid`] maps plate geometry to well-center coordinates.
//! 2. [`raster`] decodes the plate photo and abstracts pixel access.
//! 3. [`sample`] averages the pixels inside each well's circular window.
//! 4. [`photometry`] converts channel means to absorbance and ratios.
//! 5. [`measure`] runs the pipeline over every well of a plate image.
//! 6. [`curve`] fits the standard curve and resolves concentrations.
//! 7. [`calibration`] caches fitted curves per plate.
//! 8. [`analyzer`] ties measurement, storage, and calibration together.
//!
//! [`layout`] reads plate layout documents and [`store`] defines the
//! persistence seam the analyzer writes through.

pub mod analyzer;
pub mod calibration;
pub mod curve;
pub mod grid;
pub mod layout;
pub mod measure;
pub mod photometry;
pub mod raster;
pub mod sample;
pub mod store;

/// Identifier of a plate; allocating ids is the caller's concern.
pub type PlateId = u64;

pub use analyzer::{AnalyzerError, PlateAnalyzer};
pub use calibration::{CalibrationCache, PlateCalibration};
pub use curve::{
    fit_standard_curve, group_standard_points, resolve_concentration, CurveError,
    RegressionResult, StandardPoint,
};
pub use grid::{validate_grid, well_centers, well_label, GeometryError, GridParams, WellCenter};
pub use layout::PlateLayout;
pub use measure::{analyze, AnalysisError, WellMeasurement};
pub use photometry::{absorbance, Photometry, MAX_ABSORBANCE};
pub use raster::{decode_rgb, DecodeError, Raster};
pub use sample::{sample_well, ChannelSample};
pub use store::{MemoryStore, StoreError, WellClass, WellKind, WellStore};
