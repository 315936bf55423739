//! Isotope-specific constants of the q-SIP molecular weight model.

use crate::error::SipError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Heavy isotope used to label the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Isotope {
    /// Carbon-13.
    C13,
    /// Oxygen-18.
    O18,
}

impl Isotope {
    /// Natural abundance of the heavy isotope in unlabeled DNA.
    pub fn natural_abundance(self) -> f64 {
        match self {
            Isotope::C13 => 0.01111233,
            Isotope::O18 => 0.002000429,
        }
    }

    /// Molecular weight of a fully labeled nucleotide, given the unlabeled
    /// weight and the GC fraction.
    ///
    /// The number of carbon atoms per nucleotide depends on GC content; the
    /// number of oxygen atoms does not.
    pub fn max_heavy_weight(self, mlight: f64, gc: f64) -> f64 {
        match self {
            Isotope::C13 => -0.4987282 * gc + 9.974564 + mlight,
            Isotope::O18 => 12.07747 + mlight,
        }
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Isotope::C13 => "13C",
            Isotope::O18 => "18O",
        }
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Isotope {
    type Err = SipError;

    /// Parse `13C` or `18O`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "13C" => Ok(Isotope::C13),
            "18O" => Ok(Isotope::O18),
            _ => Err(SipError::UnknownIsotope(s.to_string())),
        }
    }
}

impl TryFrom<String> for Isotope {
    type Error = SipError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Isotope> for String {
    fn from(isotope: Isotope) -> Self {
        isotope.name().to_string()
    }
}

impl Default for Isotope {
    fn default() -> Self {
        Isotope::C13
    }
}
