//! Source configuration
//!
//! Each source module is selected by an internally tagged enum, so the
//! configuration dictionary names the module with a `type` key:
//!
//! ```
//! use diskflow::sources::SourceConfig;
//!
//! let json = r#"[
//!     { "type": "gravity", "update_disk_height": true,
//!       "contributors": [ { "type": "point_mass", "mass": 1.0 } ] },
//!     { "type": "viscosity", "model": { "type": "alpha", "alpha": 0.01 } }
//! ]"#;
//! let sources: Vec<SourceConfig> = serde_json::from_str(json).unwrap();
//! assert_eq!(sources.len(), 2);
//! ```
//!
//! An unknown `type` fails deserialization; a known but unsupported
//! combination fails when the chain is built.

use serde::{Deserialize, Serialize};

fn unit() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn default_cvis() -> f64 {
    0.5
}

fn default_cooling_cvis() -> f64 {
    0.1
}

/// One entry of the source chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Gravity(GravityConfig),
    Viscosity(ViscosityConfig),
    DiskCooling(CoolingConfig),
    RotatingFrame(RotatingFrameConfig),
}

// ===================================== Gravity =====================================

/// Gravity module parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityConfig {
    /// Gravitational constant
    #[serde(default = "unit")]
    pub gn: f64,

    /// Contributors, evaluated in order
    #[serde(default)]
    pub contributors: Vec<ContributorConfig>,

    /// Track the disk scale height
    #[serde(default)]
    pub update_disk_height: bool,

    /// Keep the `ρ v·a` work term; switch off when the energy equation
    /// receives gravity elsewhere
    #[serde(default = "yes")]
    pub energy_source: bool,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            gn: 1.0,
            contributors: Vec::new(),
            update_disk_height: false,
            energy_source: true,
        }
    }
}

/// Gravity contributor selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContributorConfig {
    PointMass(PointMassConfig),
    SelfGravity(SelfGravityConfig),
}

/// Shape of a point-mass potential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotentialKind {
    /// `-GM / sqrt(d² + ε²)`
    #[default]
    Newton,
    /// `-GM / (d - r_s)`
    PaczynskiWiita,
}

/// Point mass parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMassConfig {
    pub mass: f64,

    /// Cartesian position
    #[serde(default)]
    pub position: [f64; 3],

    /// Plummer softening length
    #[serde(default)]
    pub softening: f64,

    #[serde(default)]
    pub potential: PotentialKind,

    /// Required for the Paczyński–Wiita potential
    #[serde(default)]
    pub schwarzschild_radius: f64,
}

impl PointMassConfig {
    /// Newtonian point mass at the origin
    pub fn newton(mass: f64) -> Self {
        Self {
            mass,
            position: [0.0; 3],
            softening: 0.0,
            potential: PotentialKind::Newton,
            schwarzschild_radius: 0.0,
        }
    }
}

/// Self-gravity parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelfGravityConfig {
    /// Softening length of the disk Green's function
    #[serde(default)]
    pub softening: f64,
}

// ===================================== Viscosity =====================================

/// Viscosity prescription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViscosityModel {
    /// Constant dynamic and bulk viscosity
    Molecular {
        dynconst: f64,
        #[serde(default)]
        bulkconst: f64,
    },
    /// Shakura–Sunyaev `η = α ρ c_s² / |Ω|`
    Alpha { alpha: f64 },
    /// Duschl `η = β ρ r² |Ω|`
    Beta { beta: f64 },
    /// Constant kinematic viscosity `η = ν ρ`
    Pringle { nu: f64 },
    /// `η = α c_s h ρ` from the tracked disk height; not supported
    AlphaAlt { alpha: f64 },
}

impl ViscosityModel {
    pub fn name(&self) -> &'static str {
        match self {
            ViscosityModel::Molecular { .. } => "molecular",
            ViscosityModel::Alpha { .. } => "alpha",
            ViscosityModel::Beta { .. } => "beta",
            ViscosityModel::Pringle { .. } => "pringle",
            ViscosityModel::AlphaAlt { .. } => "alpha-alt",
        }
    }
}

/// Radial damping of the viscosity towards the domain edges
///
/// The mask is a product of two smooth steps of width `width`, rising from 0
/// at `inner` and falling to 0 at `outer` (cylindrical radius).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    pub inner: f64,
    pub outer: f64,
    pub width: f64,
}

/// Viscosity module parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViscosityConfig {
    pub model: ViscosityModel,

    /// Courant-like factor of the diffusive time-step limit
    #[serde(default = "default_cvis")]
    pub cvis: f64,

    #[serde(default)]
    pub envelope: Option<EnvelopeConfig>,
}

impl ViscosityConfig {
    pub fn new(model: ViscosityModel) -> Self {
        Self { model, cvis: default_cvis(), envelope: None }
    }
}

// ===================================== Cooling =====================================

/// Source of the orbital frequency in the cooling time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoolingMethod {
    /// Keplerian `Ω = sqrt(GM / r³)`
    Gammie {
        #[serde(default = "unit")]
        mass: f64,
        #[serde(default = "unit")]
        gn: f64,
    },
    /// Constant `Ω` of a shearing box
    GammieShearingBox { omega: f64 },
}

/// Disk cooling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolingConfig {
    pub method: CoolingMethod,

    /// Cooling time in units of `1/Ω`
    pub b_cool: f64,

    #[serde(default = "default_cooling_cvis")]
    pub cvis: f64,
}

// ===================================== Rotating frame =====================================

/// Rotating frame parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatingFrameConfig {
    /// Frame rate; defaults to the mesh's `omega`
    #[serde(default)]
    pub omega: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravity_defaults() {
        let config: SourceConfig = serde_json::from_str(r#"{ "type": "gravity" }"#).unwrap();
        match config {
            SourceConfig::Gravity(g) => {
                assert_eq!(g.gn, 1.0);
                assert!(g.energy_source);
                assert!(!g.update_disk_height);
                assert!(g.contributors.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_contributor_is_rejected() {
        let json = r#"{ "type": "gravity", "contributors": [ { "type": "monopole" } ] }"#;
        let err = serde_json::from_str::<SourceConfig>(json).unwrap_err();
        assert!(err.to_string().contains("monopole"));
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(serde_json::from_str::<SourceConfig>(r#"{ "type": "magnetism" }"#).is_err());
    }

    #[test]
    fn test_viscosity_model_parsing() {
        let json = r#"{ "type": "viscosity", "model": { "type": "alpha_alt", "alpha": 0.1 }, "cvis": 0.3 }"#;
        let config: SourceConfig = serde_json::from_str(json).unwrap();
        match config {
            SourceConfig::Viscosity(v) => {
                assert_eq!(v.model.name(), "alpha-alt");
                assert_eq!(v.cvis, 0.3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
