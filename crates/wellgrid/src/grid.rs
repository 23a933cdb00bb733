//! Plate grid geometry: well centers, sampling radius, and position labels.
//!
//! The grid is described by its corner well centers, not by plate edges:
//! `(x_origin, y_origin)` is the center of well (0, 0) and `(x_end, y_end)`
//! is the center of well (rows-1, columns-1). Intermediate centers are
//! spaced evenly between them.

// Shrink applied to the nominal well diameter before sampling, so the
// ROI stays clear of the well rim and neighboring wells.
const WELL_SHRINK_FACTOR: f64 = 0.85;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by grid parameter validation.
///
/// Geometry is checked before any pixel access, so a bad grid never
/// produces a partial analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Grid has zero rows or zero columns.
    EmptyGrid {
        /// Requested row count.
        rows: usize,
        /// Requested column count.
        columns: usize,
    },
    /// Well diameter must be positive.
    ZeroDiameter,
    /// Horizontal span is degenerate for a multi-column grid.
    BadHorizontalSpan {
        /// Center x of column 0.
        x_origin: i32,
        /// Center x of the last column.
        x_end: i32,
    },
    /// Vertical span is degenerate for a multi-row grid.
    BadVerticalSpan {
        /// Center y of row 0.
        y_origin: i32,
        /// Center y of the last row.
        y_end: i32,
    },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyGrid { rows, columns } => {
                write!(f, "grid must have >= 1 row and column, got {}x{}", rows, columns)
            }
            Self::ZeroDiameter => write!(f, "well diameter must be > 0"),
            Self::BadHorizontalSpan { x_origin, x_end } => {
                write!(
                    f,
                    "x_end ({}) must be > x_origin ({}) when columns > 1",
                    x_end, x_origin
                )
            }
            Self::BadVerticalSpan { y_origin, y_end } => {
                write!(
                    f,
                    "y_end ({}) must be > y_origin ({}) when rows > 1",
                    y_end, y_origin
                )
            }
        }
    }
}

impl std::error::Error for GeometryError {}

// ── Types ──────────────────────────────────────────────────────────────────

/// Pixel-space description of a rectangular well grid.
///
/// Supplied per analysis call; never persisted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridParams {
    /// Number of rows (A, B, C, ...).
    pub rows: usize,
    /// Number of columns (1, 2, 3, ...).
    pub columns: usize,
    /// Center x of well (0, 0) in pixels.
    pub x_origin: i32,
    /// Center y of well (0, 0) in pixels.
    pub y_origin: i32,
    /// Center x of the last column in pixels.
    pub x_end: i32,
    /// Center y of the last row in pixels.
    pub y_end: i32,
    /// Nominal well diameter in pixels.
    pub well_diameter: u32,
}

impl GridParams {
    /// Sampling radius in pixels: the shrunk diameter, halved.
    pub fn sampling_radius(&self) -> f64 {
        (self.well_diameter as f64 * WELL_SHRINK_FACTOR).round() / 2.0
    }

    /// Center-to-center spacing along x, 0 for a single column.
    pub fn spacing_x(&self) -> f64 {
        axis_spacing(self.x_origin, self.x_end, self.columns)
    }

    /// Center-to-center spacing along y, 0 for a single row.
    pub fn spacing_y(&self) -> f64 {
        axis_spacing(self.y_origin, self.y_end, self.rows)
    }

    /// Total number of wells on the grid.
    pub fn well_count(&self) -> usize {
        self.rows * self.columns
    }
}

/// Derived pixel center of one well.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellCenter {
    /// 0-based row index.
    pub row: usize,
    /// 0-based column index.
    pub column: usize,
    /// Center x in pixels (fractional).
    pub x: f64,
    /// Center y in pixels (fractional).
    pub y: f64,
}

// ── Operations ─────────────────────────────────────────────────────────────

/// Validate grid parameters without touching any image data.
pub fn validate_grid(params: &GridParams) -> Result<(), GeometryError> {
    if params.rows < 1 || params.columns < 1 {
        return Err(GeometryError::EmptyGrid {
            rows: params.rows,
            columns: params.columns,
        });
    }
    if params.well_diameter == 0 {
        return Err(GeometryError::ZeroDiameter);
    }
    if params.columns > 1 && params.x_end <= params.x_origin {
        return Err(GeometryError::BadHorizontalSpan {
            x_origin: params.x_origin,
            x_end: params.x_end,
        });
    }
    if params.rows > 1 && params.y_end <= params.y_origin {
        return Err(GeometryError::BadVerticalSpan {
            y_origin: params.y_origin,
            y_end: params.y_end,
        });
    }
    Ok(())
}

/// Derive every well center in row-major order (row 0 first, column 0 first).
pub fn well_centers(params: &GridParams) -> Result<Vec<WellCenter>, GeometryError> {
    validate_grid(params)?;

    let spacing_x = params.spacing_x();
    let spacing_y = params.spacing_y();

    let mut centers = Vec::with_capacity(params.well_count());
    for row in 0..params.rows {
        let y = params.y_origin as f64 + row as f64 * spacing_y;
        for column in 0..params.columns {
            let x = params.x_origin as f64 + column as f64 * spacing_x;
            centers.push(WellCenter { row, column, x, y });
        }
    }
    Ok(centers)
}

fn axis_spacing(origin: i32, end: i32, count: usize) -> f64 {
    if count > 1 {
        (end - origin) as f64 / (count - 1) as f64
    } else {
        0.0
    }
}

// ── Position labels ────────────────────────────────────────────────────────

/// Row letters for a 0-based row index ("A".."Z", then "AA", "AB", ...).
pub fn row_letters(row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = row + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Conventional well label for a 0-based (row, column), e.g. (0, 0) -> "A1".
pub fn well_label(row: usize, column: usize) -> String {
    format!("{}{}", row_letters(row), column + 1)
}

/// Parse a well label ("A1", "H12", "AA3") into 0-based (row, column).
pub fn parse_well_label(label: &str) -> Result<(usize, usize), String> {
    let label = label.trim();
    let split = label
        .find(|c: char| !c.is_ascii_alphabetic())
        .ok_or_else(|| format!("well label '{}' has no column number", label))?;
    if split == 0 {
        return Err(format!("well label '{}' has no row letters", label));
    }

    let (letters, digits) = label.split_at(split);
    let mut row: usize = 0;
    for c in letters.chars() {
        let v = (c.to_ascii_uppercase() as u8 - b'A') as usize;
        row = row * 26 + v + 1;
    }
    let row = row - 1;

    let column: usize = digits
        .parse::<usize>()
        .ok()
        .filter(|&c| c >= 1)
        .ok_or_else(|| format!("well label '{}' has an invalid column number", label))?;

    Ok((row, column - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plate_96() -> GridParams {
        GridParams {
            rows: 8,
            columns: 12,
            x_origin: 100,
            y_origin: 80,
            x_end: 1200,
            y_end: 900,
            well_diameter: 85,
        }
    }

    #[test]
    fn corner_wells_land_on_grid_endpoints() {
        let centers = well_centers(&plate_96()).expect("valid grid");
        assert_eq!(centers.len(), 96);

        let first = &centers[0];
        assert_eq!((first.row, first.column), (0, 0));
        assert_relative_eq!(first.x, 100.0);
        assert_relative_eq!(first.y, 80.0);

        let last = centers.last().expect("non-empty");
        assert_eq!((last.row, last.column), (7, 11));
        assert_relative_eq!(last.x, 1200.0, epsilon = 1e-9);
        assert_relative_eq!(last.y, 900.0, epsilon = 1e-9);
    }

    #[test]
    fn centers_are_row_major() {
        let params = plate_96();
        let centers = well_centers(&params).expect("valid grid");
        for (i, c) in centers.iter().enumerate() {
            assert_eq!(c.row, i / params.columns);
            assert_eq!(c.column, i % params.columns);
        }
    }

    #[test]
    fn single_column_maps_to_origin() {
        let params = GridParams {
            rows: 4,
            columns: 1,
            x_origin: 50,
            y_origin: 10,
            x_end: 50,
            y_end: 70,
            well_diameter: 10,
        };
        assert_relative_eq!(params.spacing_x(), 0.0);
        let centers = well_centers(&params).expect("valid grid");
        assert!(centers.iter().all(|c| c.x == 50.0));
        assert_relative_eq!(centers[3].y, 70.0);
    }

    #[test]
    fn single_row_maps_to_origin() {
        let params = GridParams {
            rows: 1,
            columns: 3,
            x_origin: 0,
            y_origin: 25,
            x_end: 200,
            y_end: 25,
            well_diameter: 10,
        };
        assert_relative_eq!(params.spacing_y(), 0.0);
        let centers = well_centers(&params).expect("valid grid");
        assert!(centers.iter().all(|c| c.y == 25.0));
        assert_relative_eq!(centers[1].x, 100.0);
    }

    #[test]
    fn sampling_radius_uses_shrunk_diameter() {
        // round(85 * 0.85) = round(72.25) = 72, halved.
        assert_relative_eq!(plate_96().sampling_radius(), 36.0);
        let small = GridParams {
            well_diameter: 10,
            ..plate_96()
        };
        // round(8.5) = 9.
        assert_relative_eq!(small.sampling_radius(), 4.5);
    }

    #[test]
    fn rejects_empty_grid() {
        let params = GridParams {
            rows: 0,
            ..plate_96()
        };
        assert_eq!(
            validate_grid(&params),
            Err(GeometryError::EmptyGrid { rows: 0, columns: 12 })
        );
    }

    #[test]
    fn rejects_zero_diameter() {
        let params = GridParams {
            well_diameter: 0,
            ..plate_96()
        };
        assert_eq!(validate_grid(&params), Err(GeometryError::ZeroDiameter));
    }

    #[test]
    fn rejects_inverted_horizontal_span() {
        let params = GridParams {
            x_end: 100,
            ..plate_96()
        };
        assert_eq!(
            validate_grid(&params),
            Err(GeometryError::BadHorizontalSpan {
                x_origin: 100,
                x_end: 100,
            })
        );
    }

    #[test]
    fn rejects_inverted_vertical_span() {
        let params = GridParams {
            y_end: 79,
            ..plate_96()
        };
        assert_eq!(
            validate_grid(&params),
            Err(GeometryError::BadVerticalSpan {
                y_origin: 80,
                y_end: 79,
            })
        );
    }

    #[test]
    fn equal_span_is_valid_for_single_row_and_column() {
        let params = GridParams {
            rows: 1,
            columns: 1,
            x_origin: 5,
            y_origin: 5,
            x_end: 5,
            y_end: 5,
            well_diameter: 3,
        };
        assert!(validate_grid(&params).is_ok());
        let centers = well_centers(&params).expect("valid grid");
        assert_eq!(centers.len(), 1);
    }

    #[test]
    fn labels_follow_plate_convention() {
        assert_eq!(well_label(0, 0), "A1");
        assert_eq!(well_label(1, 1), "B2");
        assert_eq!(well_label(7, 11), "H12");
        assert_eq!(well_label(25, 0), "Z1");
        assert_eq!(well_label(26, 0), "AA1");
        assert_eq!(well_label(27, 3), "AB4");
    }

    #[test]
    fn labels_parse_back() {
        for &(row, column) in &[(0, 0), (7, 11), (25, 5), (26, 0), (51, 23)] {
            let label = well_label(row, column);
            assert_eq!(parse_well_label(&label), Ok((row, column)));
        }
        assert_eq!(parse_well_label(" b2 "), Ok((1, 1)));
    }

    #[test]
    fn bad_labels_are_rejected() {
        assert!(parse_well_label("12").is_err());
        assert!(parse_well_label("A").is_err());
        assert!(parse_well_label("A0").is_err());
        assert!(parse_well_label("").is_err());
        assert!(parse_well_label("A1x").is_err());
    }
}
