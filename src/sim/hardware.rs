//! Scanner hardware and scan configuration records
//!
//! Everything the MRI resolution engine reads. Values are validated or
//! clamped on construction, so the engine can take them as given.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main magnet field strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagnetStrength {
    #[serde(rename = "3T")]
    T3,
    #[serde(rename = "7T")]
    T7,
    #[serde(rename = "11.7T")]
    T11_7,
}

impl MagnetStrength {
    pub const ALL: [MagnetStrength; 3] = [Self::T3, Self::T7, Self::T11_7];

    pub fn as_str(&self) -> &'static str {
        match self {
            MagnetStrength::T3 => "3T",
            MagnetStrength::T7 => "7T",
            MagnetStrength::T11_7 => "11.7T",
        }
    }

    pub fn tesla(&self) -> f64 {
        match self {
            MagnetStrength::T3 => 3.0,
            MagnetStrength::T7 => 7.0,
            MagnetStrength::T11_7 => 11.7,
        }
    }

    /// Ultra-high-field magnets need parallel transmit for a homogeneous B1+
    pub fn needs_parallel_transmit(&self) -> bool {
        matches!(self, MagnetStrength::T7 | MagnetStrength::T11_7)
    }
}

impl fmt::Display for MagnetStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cryogenic cooling system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoolingSystem {
    Standard,
    /// Superfluid helium (below 2.17K), required at 11.7T
    Superfluid,
}

/// RF receive coil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoilType {
    Birdcage,
    Avanti2,
}

/// Gradient system tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GradientTier {
    #[default]
    Standard,
    HighPerf,
    Connectome,
}

/// Pulse sequence family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PulseSequence {
    /// Gradient echo
    #[default]
    Gre,
    /// Spin echo
    Se,
    /// Echo-planar imaging (fast, gradient hungry)
    Epi,
}

impl PulseSequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseSequence::Gre => "GRE",
            PulseSequence::Se => "SE",
            PulseSequence::Epi => "EPI",
        }
    }
}

/// Fully specified scanner configuration
///
/// Built from the store's partially filled setup once every required item
/// has been purchased. Immutable for the duration of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabConfiguration {
    pub magnet: MagnetStrength,
    pub cooling: CoolingSystem,
    pub coil: CoilType,
    pub gradient: GradientTier,
    pub parallel_transmit: bool,
}

/// Resolution bounds (mm)
pub const RESOLUTION_RANGE: (f64, f64) = (0.2, 3.0);
/// Duration bounds (minutes)
pub const DURATION_RANGE: (f64, f64) = (1.0, 20.0);

/// Pulse sequence parameters chosen in the scan console
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParameters {
    pub sequence: PulseSequence,
    /// Isotropic voxel size in mm
    pub resolution: f64,
    /// Acquisition time in minutes
    pub duration: f64,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            sequence: PulseSequence::Gre,
            resolution: 2.0,
            duration: 5.0,
        }
    }
}

impl ScanParameters {
    /// Build parameters, clamping slider values into their documented ranges
    pub fn new(sequence: PulseSequence, resolution: f64, duration: f64) -> Self {
        Self {
            sequence,
            resolution: resolution.clamp(RESOLUTION_RANGE.0, RESOLUTION_RANGE.1),
            duration: duration.clamp(DURATION_RANGE.0, DURATION_RANGE.1),
        }
    }
}

/// Per-axis shim limit (Hz)
pub const SHIM_LIMIT: f64 = 100.0;

/// Residual B0 offsets on each axis after manual shimming
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShimmingVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for ShimmingVector {
    fn default() -> Self {
        Self {
            x: 20.0,
            y: -30.0,
            z: 15.0,
        }
    }
}

impl ShimmingVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let clamp = |v: f64| v.clamp(-SHIM_LIMIT, SHIM_LIMIT);
        Self {
            x: clamp(x),
            y: clamp(y),
            z: clamp(z),
        }
    }
}

/// Number of virtual observation points in the RF safety model
///
/// The safety-factor formula is undefined for n <= 0 and calibrated for
/// 2..=64, so values outside that range never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ModelCount(u32);

impl ModelCount {
    pub const MIN: u32 = 2;
    pub const MAX: u32 = 64;

    pub fn new(n: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::InvalidModelCount(n))
        }
    }

    /// Clamp an arbitrary slider value into range
    pub fn clamped(n: u32) -> Self {
        Self(n.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for ModelCount {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u32> for ModelCount {
    type Error = Error;

    fn try_from(n: u32) -> Result<Self> {
        Self::new(n)
    }
}

impl From<ModelCount> for u32 {
    fn from(n: ModelCount) -> u32 {
        n.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_count_bounds() {
        assert!(ModelCount::new(0).is_err());
        assert!(ModelCount::new(1).is_err());
        assert_eq!(ModelCount::new(2).map(ModelCount::get), Ok(2));
        assert_eq!(ModelCount::new(64).map(ModelCount::get), Ok(64));
        assert_eq!(ModelCount::new(65), Err(Error::InvalidModelCount(65)));
        assert_eq!(ModelCount::clamped(0).get(), 2);
        assert_eq!(ModelCount::clamped(500).get(), 64);
    }

    #[test]
    fn test_model_count_rejected_when_deserializing() {
        assert!(serde_json::from_str::<ModelCount>("0").is_err());
        assert_eq!(serde_json::from_str::<ModelCount>("16").unwrap().get(), 16);
    }

    #[test]
    fn test_scan_parameters_clamped() {
        let params = ScanParameters::new(PulseSequence::Epi, 0.01, 45.0);
        assert_eq!(params.resolution, 0.2);
        assert_eq!(params.duration, 20.0);
    }

    #[test]
    fn test_shimming_clamped() {
        let shim = ShimmingVector::new(250.0, -250.0, 5.0);
        assert_eq!((shim.x, shim.y, shim.z), (100.0, -100.0, 5.0));
    }

    #[test]
    fn test_magnet_serde_names() {
        let json = serde_json::to_string(&MagnetStrength::T11_7).unwrap();
        assert_eq!(json, "\"11.7T\"");
        assert!(MagnetStrength::T7.needs_parallel_transmit());
        assert!(!MagnetStrength::T3.needs_parallel_transmit());
    }
}
