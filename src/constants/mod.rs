//! Physiological defaults shared by the normalizer, the evaluator and the
//! code generators.

use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};


/// Name of the membrane voltage symbol, in mV
pub const VOLTAGE_SYMBOL: &str = "v";
/// Name of the temperature symbol when the temperature factor is constant
pub const DEFAULT_TEMPERATURE_SYMBOL: &str = "temp";
/// Default temperature in degrees Celsius
pub const DEFAULT_TEMPERATURE: f64 = 36.;
/// Voltages closer than this (in mV) to a singular point use the limit formula
pub const TRAP_TOLERANCE: f64 = 1e-4;
/// Converts rates in 1/ms into 1/s so they share units with frequencies in Hz
pub const FREQUENCY_SCALE: f64 = 1e3;
/// Time constant used by generated C++ for instantaneous variables, in ms
pub const INSTANTANEOUS_TIME_CONSTANT: f64 = 1e-5;

/// Ions a channel can carry or depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ion {
    Na,
    K,
    Ca,
}

impl Ion {
    pub fn symbol(&self) -> &'static str {
        match self {
            Ion::Na => "na",
            Ion::K => "k",
            Ion::Ca => "ca",
        }
    }

    pub fn from_symbol(name: &str) -> Option<Ion> {
        match name {
            "na" => Some(Ion::Na),
            "k" => Some(Ion::K),
            "ca" => Some(Ion::Ca),
            _ => None,
        }
    }

    /// Default intracellular concentration in mM
    pub fn default_concentration(&self) -> f64 {
        match self {
            Ion::Na => 10.,
            Ion::K => 54.4,
            Ion::Ca => 1e-4,
        }
    }

    /// Default reversal potential in mV
    pub fn default_reversal(&self) -> f64 {
        match self {
            Ion::Na => 50.,
            Ion::K => -85.,
            Ion::Ca => 50.,
        }
    }
}

impl Display for Ion {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Default concentration for a concentration symbol such as `ca`
pub fn default_concentration(name: &str) -> Option<f64> {
    Ion::from_symbol(name).map(|ion| ion.default_concentration())
}
