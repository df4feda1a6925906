//! Gauge-level risk classes.
//!
//! Thresholds were derived from long-term daily water level observations at
//! the Cerknica gauge (1954–2025).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound (inclusive, cm) of `Normal`.
pub const NORMAL_MAX_CM: f64 = 346.0;
/// Upper bound (inclusive, cm) of `Elevated`.
pub const ELEVATED_MAX_CM: f64 = 441.0;
/// Upper bound (inclusive, cm) of `VeryHigh`.
pub const VERY_HIGH_MAX_CM: f64 = 521.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskClass {
    Normal,
    Elevated,
    VeryHigh,
    Extreme,
}

impl RiskClass {
    pub const ALL: [RiskClass; 4] = [
        RiskClass::Normal,
        RiskClass::Elevated,
        RiskClass::VeryHigh,
        RiskClass::Extreme,
    ];

    pub fn classify(level_cm: f64) -> Self {
        if level_cm <= NORMAL_MAX_CM {
            RiskClass::Normal
        } else if level_cm <= ELEVATED_MAX_CM {
            RiskClass::Elevated
        } else if level_cm <= VERY_HIGH_MAX_CM {
            RiskClass::VeryHigh
        } else {
            RiskClass::Extreme
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskClass::Normal => "Normal",
            RiskClass::Elevated => "Elevated",
            RiskClass::VeryHigh => "Very High",
            RiskClass::Extreme => "Extreme",
        }
    }

    /// Badge colour, `#rrggbb`.
    pub fn color(self) -> &'static str {
        match self {
            RiskClass::Normal => "#4CAF50",
            RiskClass::Elevated => "#FFC107",
            RiskClass::VeryHigh => "#FF5722",
            RiskClass::Extreme => "#B00020",
        }
    }

    /// Legend text for the class's level band.
    pub fn band(self) -> &'static str {
        match self {
            RiskClass::Normal => "≤346",
            RiskClass::Elevated => "346–441",
            RiskClass::VeryHigh => "441–521",
            RiskClass::Extreme => ">521",
        }
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive_upper_bounds() {
        assert_eq!(RiskClass::classify(346.0), RiskClass::Normal);
        assert_eq!(RiskClass::classify(346.01), RiskClass::Elevated);
        assert_eq!(RiskClass::classify(441.0), RiskClass::Elevated);
        assert_eq!(RiskClass::classify(441.01), RiskClass::VeryHigh);
        assert_eq!(RiskClass::classify(521.0), RiskClass::VeryHigh);
        assert_eq!(RiskClass::classify(521.01), RiskClass::Extreme);
    }

    #[test]
    fn extremes_are_total() {
        assert_eq!(RiskClass::classify(-50.0), RiskClass::Normal);
        assert_eq!(RiskClass::classify(10_000.0), RiskClass::Extreme);
    }

    #[test]
    fn classes_are_ordered_by_severity() {
        let mut prev = RiskClass::Normal;
        for cm in 0..700 {
            let class = RiskClass::classify(f64::from(cm));
            assert!(class >= prev);
            prev = class;
        }
        assert_eq!(RiskClass::ALL.map(RiskClass::color)[3], "#B00020");
    }
}
