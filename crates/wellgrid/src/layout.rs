//! Plate layout document: per-well classification as versioned JSON.
//!
//! Layout JSON follows the `wellgrid.layout.v1` schema: a named grid shape
//! plus one entry per used well, addressed by its conventional label
//! ("A1", "B12"). Positions not listed are implicitly empty.

use std::collections::HashSet;
use std::path::Path;

use crate::grid::parse_well_label;
use crate::store::{WellClass, WellKind};

const LAYOUT_SCHEMA_V1: &str = "wellgrid.layout.v1";

/// One well entry of the layout document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutWell {
    /// Well label, e.g. "A1".
    pub position: String,
    /// Role of the well.
    pub kind: WellKind,
    /// Known concentration, required when `kind` is `standard`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_concentration: Option<f64>,
    /// Free-form sample name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,
    /// Dilution applied before plating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dilution_factor: Option<f64>,
    /// Replicate group tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate_group: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PlateLayoutDocV1 {
    schema: String,
    name: String,
    rows: usize,
    columns: usize,
    wells: Vec<LayoutWell>,
}

/// Validated runtime plate layout.
#[derive(Debug, Clone)]
pub struct PlateLayout {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    classes: Vec<WellClass>,
}

impl PlateLayout {
    /// Load a plate layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data).map_err(Into::into)
    }

    /// Parse a plate layout from a JSON string.
    pub fn from_json_str(data: &str) -> Result<Self, String> {
        let doc: PlateLayoutDocV1 = serde_json::from_str(data).map_err(|e| e.to_string())?;
        Self::from_doc(doc)
    }

    fn from_doc(doc: PlateLayoutDocV1) -> Result<Self, String> {
        if doc.schema != LAYOUT_SCHEMA_V1 {
            return Err(format!(
                "unsupported layout schema '{}' (expected '{}')",
                doc.schema, LAYOUT_SCHEMA_V1
            ));
        }

        validate_layout_doc(&doc)?;

        let mut classes = Vec::with_capacity(doc.wells.len());
        for well in &doc.wells {
            // Positions were validated above; a parse failure here is unreachable.
            let (row, column) = parse_well_label(&well.position)?;
            classes.push(WellClass {
                row,
                column,
                kind: well.kind,
                standard_concentration: well.standard_concentration,
                sample_name: well.sample_name.clone(),
                dilution_factor: well.dilution_factor,
                replicate_group: well.replicate_group.clone(),
            });
        }
        classes.sort_by_key(|c| (c.row, c.column));

        Ok(Self {
            name: doc.name,
            rows: doc.rows,
            columns: doc.columns,
            classes,
        })
    }

    /// Well classes in row-major order.
    pub fn classes(&self) -> &[WellClass] {
        &self.classes
    }

    /// Consume the layout, yielding its well classes.
    pub fn into_classes(self) -> Vec<WellClass> {
        self.classes
    }

    /// Number of wells with the given kind.
    pub fn count_of(&self, kind: WellKind) -> usize {
        self.classes.iter().filter(|c| c.kind == kind).count()
    }

    /// Distinct standard concentrations present on the plate.
    pub fn standard_concentrations(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .classes
            .iter()
            .filter(|c| c.kind == WellKind::Standard)
            .filter_map(|c| c.standard_concentration)
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        values
    }
}

fn validate_layout_doc(doc: &PlateLayoutDocV1) -> Result<(), String> {
    if doc.name.trim().is_empty() {
        return Err("layout name must not be empty".to_string());
    }
    if doc.rows == 0 || doc.columns == 0 {
        return Err("layout must have >= 1 row and column".to_string());
    }

    let mut seen = HashSet::new();
    for well in &doc.wells {
        let (row, column) = parse_well_label(&well.position)?;
        if row >= doc.rows || column >= doc.columns {
            return Err(format!(
                "well '{}' lies outside the {}x{} grid",
                well.position, doc.rows, doc.columns
            ));
        }
        if !seen.insert((row, column)) {
            return Err(format!("duplicate well position '{}'", well.position));
        }

        if well.kind == WellKind::Standard {
            match well.standard_concentration {
                Some(c) if c.is_finite() && c >= 0.0 => {}
                Some(_) => {
                    return Err(format!(
                        "standard well '{}' has a non-finite or negative concentration",
                        well.position
                    ))
                }
                None => {
                    return Err(format!(
                        "standard well '{}' is missing its concentration",
                        well.position
                    ))
                }
            }
        }

        if let Some(dilution) = well.dilution_factor {
            if !dilution.is_finite() || dilution <= 0.0 {
                return Err(format!(
                    "well '{}' has an invalid dilution factor",
                    well.position
                ));
            }
        }
    }

    Ok(())
}
