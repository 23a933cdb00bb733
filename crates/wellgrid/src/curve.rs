//! Standard-curve regression: grouping, least squares, and resolution.
//!
//! The model is fit with the blue/green ratio as the independent variable
//! and concentration as the dependent variable,
//! `concentration = slope * ratio + intercept`, matching how unknown
//! samples are resolved from a measured ratio. Fitting the inverse
//! direction and inverting algebraically would add avoidable error.

use std::cmp::Ordering;

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by standard-curve fitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    /// Too few usable standard points for a line fit.
    InsufficientData {
        /// Required minimum number of points with distinct ratios.
        needed: usize,
        /// Usable points provided.
        got: usize,
    },
}

impl std::fmt::Display for CurveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { needed, got } => {
                write!(
                    f,
                    "insufficient calibration data: need {} standard points with distinct ratios, got {}",
                    needed, got
                )
            }
        }
    }
}

impl std::error::Error for CurveError {}

// ── Types ──────────────────────────────────────────────────────────────────

/// One averaged calibration point: known concentration and measured ratio.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StandardPoint {
    /// Known concentration supplied with the standard wells.
    pub concentration: f64,
    /// Mean blue/green ratio over the replicate wells at this concentration.
    pub ratio: f64,
}

/// Fitted line `concentration = slope * ratio + intercept` with fit quality.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegressionResult {
    /// Slope of the fitted line.
    pub slope: f64,
    /// Intercept of the fitted line.
    pub intercept: f64,
    /// Coefficient of determination, absent when the concentrations have
    /// zero variance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_squared: Option<f64>,
    /// Number of points the line was fit to.
    pub point_count: usize,
}

// ── Operations ─────────────────────────────────────────────────────────────

/// Collapse raw standard-well readings into one point per concentration.
///
/// Input pairs are `(concentration, ratio)`, one per standard well.
/// Replicates (equal concentrations) are averaged; the output is sorted
/// by ascending concentration.
pub fn group_standard_points(pairs: &[(f64, f64)]) -> Vec<StandardPoint> {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut points = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let concentration = sorted[i].0;
        let mut ratio_sum = 0.0;
        let mut n = 0usize;
        while i < sorted.len() && sorted[i].0 == concentration {
            ratio_sum += sorted[i].1;
            n += 1;
            i += 1;
        }
        points.push(StandardPoint {
            concentration,
            ratio: ratio_sum / n as f64,
        });
    }
    points
}

/// Ordinary least squares over the standard points.
///
/// Requires at least 2 points with distinct ratios; with all ratios equal
/// the line is vertical and no slope exists. `r_squared` is computed
/// against the concentration values and reported as `None` when they have
/// zero variance instead of dividing by zero.
pub fn fit_standard_curve(points: &[StandardPoint]) -> Result<RegressionResult, CurveError> {
    let n = points.len();
    if n < 2 {
        return Err(CurveError::InsufficientData { needed: 2, got: n });
    }
    let distinct = distinct_ratio_count(points);
    if distinct < 2 {
        return Err(CurveError::InsufficientData {
            needed: 2,
            got: distinct,
        });
    }

    let n_f = n as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for p in points {
        sum_x += p.ratio;
        sum_y += p.concentration;
        sum_xx += p.ratio * p.ratio;
        sum_xy += p.ratio * p.concentration;
    }

    // Denominator is n * sum((x - mean_x)^2), nonzero once ratios differ.
    let slope = (n_f * sum_xy - sum_x * sum_y) / (n_f * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n_f;

    let mean_y = sum_y / n_f;
    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for p in points {
        let predicted = slope * p.ratio + intercept;
        ss_tot += (p.concentration - mean_y) * (p.concentration - mean_y);
        ss_res += (p.concentration - predicted) * (p.concentration - predicted);
    }
    let r_squared = if ss_tot > 0.0 {
        Some(1.0 - ss_res / ss_tot)
    } else {
        None
    };

    Ok(RegressionResult {
        slope,
        intercept,
        r_squared,
        point_count: n,
    })
}

/// Resolve an unknown concentration from a measured ratio.
pub fn resolve_concentration(ratio: f64, regression: &RegressionResult) -> f64 {
    regression.slope * ratio + regression.intercept
}

fn distinct_ratio_count(points: &[StandardPoint]) -> usize {
    let mut ratios: Vec<f64> = points.iter().map(|p| p.ratio).collect();
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    ratios.dedup();
    ratios.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    fn point(concentration: f64, ratio: f64) -> StandardPoint {
        StandardPoint {
            concentration,
            ratio,
        }
    }

    #[test]
    fn two_point_fit_is_exact() {
        let points = [point(0.5, 1.0), point(1.0, 2.0)];
        let fit = fit_standard_curve(&points).expect("two distinct points");
        assert_relative_eq!(fit.slope, 0.5);
        assert_relative_eq!(fit.intercept, 0.0);
        assert_eq!(fit.point_count, 2);
        let r2 = fit.r_squared.expect("variance present");
        assert_relative_eq!(r2, 1.0);
    }

    #[test]
    fn resolves_concentration_from_ratio() {
        let points = [point(0.5, 1.0), point(1.0, 2.0)];
        let fit = fit_standard_curve(&points).expect("two distinct points");
        assert_relative_eq!(resolve_concentration(1.5, &fit), 0.75);
        assert_relative_eq!(resolve_concentration(0.0, &fit), 0.0);
    }

    #[test]
    fn grouping_averages_replicates_and_sorts() {
        let pairs = [(1.0, 2.0), (0.5, 1.1), (0.5, 0.9), (0.25, 0.6)];
        let points = group_standard_points(&pairs);
        assert_eq!(points.len(), 3);
        assert_relative_eq!(points[0].concentration, 0.25);
        assert_relative_eq!(points[0].ratio, 0.6);
        assert_relative_eq!(points[1].concentration, 0.5);
        assert_relative_eq!(points[1].ratio, 1.0);
        assert_relative_eq!(points[2].concentration, 1.0);
        assert_relative_eq!(points[2].ratio, 2.0);
    }

    #[test]
    fn grouping_empty_input_is_empty() {
        assert!(group_standard_points(&[]).is_empty());
    }

    #[test]
    fn too_few_points_is_an_error() {
        assert_eq!(
            fit_standard_curve(&[]),
            Err(CurveError::InsufficientData { needed: 2, got: 0 })
        );
        assert_eq!(
            fit_standard_curve(&[point(1.0, 0.5)]),
            Err(CurveError::InsufficientData { needed: 2, got: 1 })
        );
    }

    #[test]
    fn duplicate_ratios_are_an_error() {
        // Two concentrations measured at the same ratio: vertical line.
        let points = [point(0.5, 1.0), point(1.0, 1.0)];
        assert_eq!(
            fit_standard_curve(&points),
            Err(CurveError::InsufficientData { needed: 2, got: 1 })
        );
    }

    #[test]
    fn zero_concentration_variance_reports_undefined_r_squared() {
        let points = [point(0.5, 1.0), point(0.5, 2.0)];
        let fit = fit_standard_curve(&points).expect("distinct ratios");
        assert_relative_eq!(fit.slope, 0.0);
        assert_relative_eq!(fit.intercept, 0.5);
        assert_eq!(fit.r_squared, None);
    }

    #[test]
    fn imperfect_fit_has_r_squared_below_one() {
        let points = [point(0.0, 0.0), point(1.0, 1.0), point(1.5, 2.0)];
        let fit = fit_standard_curve(&points).expect("distinct ratios");
        let r2 = fit.r_squared.expect("variance present");
        assert!(r2 > 0.9 && r2 < 1.0, "r^2 = {}", r2);
    }

    #[test]
    fn noisy_line_recovers_slope_and_intercept() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<StandardPoint> = (0..25)
            .map(|i| {
                let ratio = 0.1 * i as f64;
                let noise = (rng.gen::<f64>() - 0.5) * 0.02;
                point(2.0 * ratio + 1.0 + noise, ratio)
            })
            .collect();

        let fit = fit_standard_curve(&points).expect("noisy line fits");
        assert_relative_eq!(fit.slope, 2.0, epsilon = 0.05);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 0.05);
        assert!(fit.r_squared.expect("variance present") > 0.999);
        assert_eq!(fit.point_count, 25);
    }

    #[test]
    fn fit_direction_matches_resolution() {
        // Steep ratio response: concentration changes slowly with ratio.
        // Fitting the inverse direction would give a wildly different line.
        let points = [point(0.1, 0.0), point(0.2, 10.0)];
        let fit = fit_standard_curve(&points).expect("two distinct points");
        assert_relative_eq!(fit.slope, 0.01);
        assert_relative_eq!(fit.intercept, 0.1);
        assert_relative_eq!(resolve_concentration(5.0, &fit), 0.15);
    }

    #[test]
    fn serialized_result_omits_undefined_r_squared() {
        let fit = RegressionResult {
            slope: 1.0,
            intercept: 0.0,
            r_squared: None,
            point_count: 2,
        };
        let json = serde_json::to_string(&fit).expect("serializable");
        assert!(!json.contains("r_squared"));

        let with_r2 = RegressionResult {
            r_squared: Some(0.75),
            ..fit
        };
        let json = serde_json::to_string(&with_r2).expect("serializable");
        assert!(json.contains("\"r_squared\":0.75"));
    }
}
