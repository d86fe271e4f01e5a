//! # Blood Groups
//!
//! The eight canonical ABO/Rh blood groups. Serialized in their clinical
//! notation (`"A+"`, `"O-"`, ...) which is also what the HTTP surface accepts
//! in query strings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Total number of canonical blood groups.
pub const BLOOD_GROUP_COUNT: usize = 8;

/// An ABO/Rh blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    /// All groups in canonical order. Aggregates iterate this array so that
    /// every group is reported even when it has no data.
    pub const ALL: [BloodGroup; BLOOD_GROUP_COUNT] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    /// Clinical notation, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl std::fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = ValidationError;

    /// Parse clinical notation. Case-sensitive: `"ab+"` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A+" => Ok(Self::APositive),
            "A-" => Ok(Self::ANegative),
            "B+" => Ok(Self::BPositive),
            "B-" => Ok(Self::BNegative),
            "AB+" => Ok(Self::AbPositive),
            "AB-" => Ok(Self::AbNegative),
            "O+" => Ok(Self::OPositive),
            "O-" => Ok(Self::ONegative),
            other => Err(ValidationError::UnknownBloodGroup(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_groups_unique() {
        let mut seen = std::collections::HashSet::new();
        for g in BloodGroup::ALL {
            assert!(seen.insert(g), "duplicate group: {g}");
        }
        assert_eq!(seen.len(), BLOOD_GROUP_COUNT);
    }

    #[test]
    fn as_str_parses_back() {
        for g in BloodGroup::ALL {
            let parsed: BloodGroup = g.as_str().parse().unwrap();
            assert_eq!(parsed, g);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("C+".parse::<BloodGroup>().is_err());
        assert!("ab+".parse::<BloodGroup>().is_err());
        assert!("".parse::<BloodGroup>().is_err());
    }

    #[test]
    fn serde_matches_as_str() {
        for g in BloodGroup::ALL {
            let json = serde_json::to_string(&g).unwrap();
            assert_eq!(json, format!("\"{}\"", g.as_str()));
        }
        let parsed: BloodGroup = serde_json::from_str("\"AB-\"").unwrap();
        assert_eq!(parsed, BloodGroup::AbNegative);
    }
}
