//! Colorimetric transforms from channel means to ratio and absorbance.
//!
//! Pure functions of the channel means; the Bradford signal is the
//! blue/green ratio, with Beer-Lambert style absorbances kept alongside
//! for diagnostics.

use crate::sample::ChannelSample;

/// Absorbance reported for a fully dark channel (mean of 0).
///
/// `-log10(0/255)` diverges; this finite sentinel is stored instead and
/// excluded from ratio computation so it never reaches the regression.
pub const MAX_ABSORBANCE: f64 = 999.0;

/// Beer-Lambert style absorbance of an 8-bit channel mean.
///
/// `absorbance(255) == 0`; a mean of 0 yields [`MAX_ABSORBANCE`].
pub fn absorbance(mean: f64) -> f64 {
    if mean > 0.0 {
        -(mean / 255.0).log10()
    } else {
        MAX_ABSORBANCE
    }
}

/// Primary colorimetric signal: blue mean over green mean.
///
/// A zero green mean is physically implausible but must not abort the
/// batch; the ratio is reported as 0 in that case.
pub fn blue_to_green_ratio(green_mean: f64, blue_mean: f64) -> f64 {
    if green_mean > 0.0 {
        blue_mean / green_mean
    } else {
        0.0
    }
}

/// Green absorbance over blue absorbance, 0 when undefined.
///
/// The blue absorbance must be finite, positive, and not the dark-channel
/// sentinel for the quotient to be meaningful.
pub fn absorbance_ratio(green_absorbance: f64, blue_absorbance: f64) -> f64 {
    if blue_absorbance.is_finite() && blue_absorbance > 0.0 && blue_absorbance != MAX_ABSORBANCE {
        green_absorbance / blue_absorbance
    } else {
        0.0
    }
}

/// Derived photometric quantities for one well.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Photometry {
    /// Blue mean / green mean.
    pub blue_to_green_ratio: f64,
    /// Absorbance of the green channel.
    pub green_absorbance: f64,
    /// Absorbance of the blue channel.
    pub blue_absorbance: f64,
    /// Green absorbance / blue absorbance.
    pub absorbance_ratio: f64,
}

/// Compute all photometric quantities from one channel sample.
pub fn transform(sample: &ChannelSample) -> Photometry {
    let green_absorbance = absorbance(sample.green_mean);
    let blue_absorbance = absorbance(sample.blue_mean);
    Photometry {
        blue_to_green_ratio: blue_to_green_ratio(sample.green_mean, sample.blue_mean),
        green_absorbance,
        blue_absorbance,
        absorbance_ratio: absorbance_ratio(green_absorbance, blue_absorbance),
    }
}
