//! Safety and image-quality formulas
//!
//! Pure functions shared by the scan console preview and the resolution
//! engine. Keeping one implementation of each quantity guarantees that what
//! the player sees before a scan is what decides the scan.

use super::hardware::{GradientTier, MagnetStrength, ModelCount, PulseSequence, ShimmingVector};

/// rASF coefficient
pub const SAFETY_COEFFICIENT: f64 = 5.37;
/// rASF exponent applied to the model count
pub const SAFETY_EXPONENT: f64 = -0.75;

/// Power headroom numerator: SNR power scaling is `min(1, POWER_HEADROOM / sf)`
pub const POWER_HEADROOM: f64 = 1.5;

/// Gradient demand reference: demand reaches zero at this voxel size (mm)
pub const GRADIENT_REFERENCE_RESOLUTION: f64 = 3.5;
/// Slew units per mm of resolution below the reference
pub const GRADIENT_SLEW_PER_MM: f64 = 80.0;
/// EPI readout multiplies gradient demand
pub const EPI_GRADIENT_MULTIPLIER: f64 = 1.5;

/// Demand at which PNS risk reaches 100%
pub const PNS_THRESHOLD_DEMAND: f64 = 250.0;
/// Display risk above which the console warns about PNS
pub const PNS_WARNING_PERCENT: f64 = 85.0;

/// Shim error below which the console grid turns green
pub const SHIM_GOOD_THRESHOLD: f64 = 15.0;
/// Shim error above which a scan aborts with geometric distortion
pub const SHIM_ABORT_THRESHOLD: f64 = 60.0;

/// Scans longer than this (minutes) risk subject motion
pub const MOTION_RISK_DURATION: f64 = 10.0;

/// RF safety factor for `n` virtual observation points
///
/// Strictly decreasing in `n`: fewer observation points means a more
/// conservative model and less transmit power.
pub fn safety_factor(n: ModelCount) -> f64 {
    1.0 + SAFETY_COEFFICIENT * f64::from(n.get()).powf(SAFETY_EXPONENT)
}

/// Safety factor sampled at n = 2, 4, ..., 64 for the console chart
pub fn safety_factor_curve() -> Vec<(u32, f64)> {
    (ModelCount::MIN..=ModelCount::MAX)
        .step_by(2)
        .map(|n| (n, safety_factor(ModelCount::clamped(n))))
        .collect()
}

/// Baseline SNR at 1mm, 4 minutes, full power
pub fn base_snr(magnet: MagnetStrength) -> f64 {
    match magnet {
        MagnetStrength::T3 => 40.0,
        MagnetStrength::T7 => 70.0,
        MagnetStrength::T11_7 => 100.0,
    }
}

/// Relative signal of each sequence (SE > GRE > EPI)
pub fn sequence_multiplier(sequence: PulseSequence) -> f64 {
    match sequence {
        PulseSequence::Se => 1.5,
        PulseSequence::Gre => 1.0,
        PulseSequence::Epi => 0.8,
    }
}

/// Fraction of nominal transmit power the safety model allows
pub fn power_clamp(safety_factor: f64) -> f64 {
    (POWER_HEADROOM / safety_factor).min(1.0)
}

/// Predicted signal-to-noise ratio
///
/// `resolution` in mm (cubic voxel-volume penalty), `duration` in minutes
/// (square-root averaging gain, normalized to 1 at 4 minutes).
pub fn predicted_snr(
    magnet: MagnetStrength,
    resolution: f64,
    duration: f64,
    sequence: PulseSequence,
    safety_factor: f64,
) -> f64 {
    let time_benefit = duration.sqrt() / 2.0;
    base_snr(magnet) * sequence_multiplier(sequence) * power_clamp(safety_factor) * time_benefit
        / resolution.powi(3)
}

/// Requested gradient slew rate (abstract T/m/s units)
pub fn gradient_demand(resolution: f64, sequence: PulseSequence) -> f64 {
    let multiplier = if sequence == PulseSequence::Epi {
        EPI_GRADIENT_MULTIPLIER
    } else {
        1.0
    };
    (GRADIENT_REFERENCE_RESOLUTION - resolution) * GRADIENT_SLEW_PER_MM * multiplier
}

/// Maximum slew rate the gradient hardware delivers
pub fn gradient_capacity(tier: GradientTier) -> f64 {
    match tier {
        GradientTier::Standard => 80.0,
        GradientTier::HighPerf => 200.0,
        GradientTier::Connectome => 300.0,
    }
}

/// Gradient duty cycle for the load meter, capped at 100%
pub fn gradient_load(demand: f64, capacity: f64) -> f64 {
    (demand / capacity * 100.0).min(100.0)
}

/// Uncapped PNS ratio in percent; the scan gate compares this against 100
pub fn pns_ratio(demand: f64) -> f64 {
    demand / PNS_THRESHOLD_DEMAND * 100.0
}

/// PNS risk for display, capped at 100%
pub fn pns_risk(demand: f64) -> f64 {
    pns_ratio(demand).min(100.0)
}

/// Total residual field error (sum of absolute per-axis offsets)
pub fn shim_error(shim: &ShimmingVector) -> f64 {
    shim.x.abs() + shim.y.abs() + shim.z.abs()
}

/// Image blur contributions for the console preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurEstimate {
    pub shim: f64,
    pub motion: f64,
    pub total: f64,
}

pub fn blur_estimate(shim_error: f64, resolution: f64, duration: f64) -> BlurEstimate {
    let shim = shim_error / 20.0;
    let motion = if duration > MOTION_RISK_DURATION {
        (duration - MOTION_RISK_DURATION) * 0.5
    } else {
        0.0
    };
    BlurEstimate {
        shim,
        motion,
        total: shim + motion + (3.0 - resolution),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sf(n: u32) -> f64 {
        safety_factor(ModelCount::clamped(n))
    }

    #[test]
    fn test_safety_factor_reference_points() {
        assert!((sf(2) - 4.19).abs() < 0.01);
        // 1 + 5.37 * 64^-0.75
        assert!((sf(64) - 1.237).abs() < 0.001);
    }

    #[test]
    fn test_safety_factor_strictly_decreasing() {
        for n in ModelCount::MIN..ModelCount::MAX {
            assert!(sf(n) > sf(n + 1), "not decreasing at n={}", n);
        }
    }

    #[test]
    fn test_safety_factor_curve_samples() {
        let curve = safety_factor_curve();
        assert_eq!(curve.len(), 32);
        assert_eq!(curve.first().map(|p| p.0), Some(2));
        assert_eq!(curve.last().map(|p| p.0), Some(64));
    }

    #[test]
    fn test_gradient_demand_scenario() {
        let demand = gradient_demand(0.5, PulseSequence::Epi);
        assert!((demand - 360.0).abs() < 1e-9);
        assert!(demand > gradient_capacity(GradientTier::Standard));
    }

    #[test]
    fn test_pns_display_capped_but_ratio_not() {
        assert_eq!(pns_risk(500.0), 100.0);
        assert!((pns_ratio(500.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_shim_error_sums_absolute_offsets() {
        let shim = ShimmingVector::new(40.0, -40.0, 40.0);
        assert_eq!(shim_error(&shim), 120.0);
    }

    #[test]
    fn test_snr_sequence_ordering() {
        let snr = |seq| predicted_snr(MagnetStrength::T7, 1.0, 4.0, seq, 1.0);
        assert!(snr(PulseSequence::Se) > snr(PulseSequence::Gre));
        assert!(snr(PulseSequence::Gre) > snr(PulseSequence::Epi));
        // Full power, 4 minutes, 1mm, GRE: base value
        assert!((snr(PulseSequence::Gre) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_clamp_never_exceeds_one() {
        assert_eq!(power_clamp(sf(64)), 1.0);
        assert!(power_clamp(sf(2)) < 0.36);
    }

    #[test]
    fn test_blur_estimate() {
        let blur = blur_estimate(40.0, 2.0, 14.0);
        assert_eq!(blur.shim, 2.0);
        assert_eq!(blur.motion, 2.0);
        assert_eq!(blur.total, 5.0);
        assert_eq!(blur_estimate(0.0, 3.0, 10.0).motion, 0.0);
    }

    proptest! {
        #[test]
        fn prop_gradient_demand_decreases_with_resolution(a in 0.2f64..3.0, b in 0.2f64..3.0) {
            prop_assume!(a < b);
            for seq in [PulseSequence::Gre, PulseSequence::Se, PulseSequence::Epi] {
                prop_assert!(gradient_demand(a, seq) > gradient_demand(b, seq));
            }
        }

        #[test]
        fn prop_epi_demand_is_one_and_a_half_times(res in 0.2f64..3.0) {
            let gre = gradient_demand(res, PulseSequence::Gre);
            let se = gradient_demand(res, PulseSequence::Se);
            let epi = gradient_demand(res, PulseSequence::Epi);
            prop_assert_eq!(gre, se);
            prop_assert!((epi - 1.5 * gre).abs() < 1e-9);
        }
    }
}
