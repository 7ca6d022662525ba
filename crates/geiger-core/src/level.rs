//! Radiation level classification for display

/// Coarse classification of a dose rate
///
/// Used to colour the readout and the remote dashboard. This is an
/// orientation aid, not a health assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RadiationLevel {
    /// Typical natural background
    Safe,
    /// Elevated background
    Moderate,
    /// Well above background
    High,
    Extreme,
}

impl RadiationLevel {
    /// Classify a dose rate in µSv/h
    ///
    /// - Safe: below 0.3
    /// - Moderate: 0.3 to below 1.0
    /// - High: 1.0 to below 10.0
    /// - Extreme: 10.0 and above
    pub fn assess(rate_usv_h: f32) -> Self {
        if rate_usv_h < 0.3 {
            Self::Safe
        } else if rate_usv_h < 1.0 {
            Self::Moderate
        } else if rate_usv_h < 10.0 {
            Self::High
        } else {
            // NaN lands here too, so a broken reading never looks harmless
            Self::Extreme
        }
    }

    /// Display colour as 0xRRGGBB
    pub const fn rgb(self) -> u32 {
        match self {
            Self::Safe => 0x7274EE,
            Self::Moderate => 0xD8C12C,
            Self::High => 0xFF5722,
            Self::Extreme => 0xF44336,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Safe => "Safe Level",
            Self::Moderate => "Moderate Level",
            Self::High => "High Level",
            Self::Extreme => "Extreme Level",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(RadiationLevel::assess(0.0), RadiationLevel::Safe);
        assert_eq!(RadiationLevel::assess(0.29), RadiationLevel::Safe);
        assert_eq!(RadiationLevel::assess(0.3), RadiationLevel::Moderate);
        assert_eq!(RadiationLevel::assess(1.0), RadiationLevel::High);
        assert_eq!(RadiationLevel::assess(9.99), RadiationLevel::High);
        assert_eq!(RadiationLevel::assess(10.0), RadiationLevel::Extreme);
        assert_eq!(RadiationLevel::assess(f32::NAN), RadiationLevel::Extreme);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(RadiationLevel::Safe < RadiationLevel::Moderate);
        assert!(RadiationLevel::High < RadiationLevel::Extreme);
    }
}
