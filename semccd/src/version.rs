//! DigitalMicrograph version numbers.

use std::fmt;

/// Lowest version that applies pre-counting defect correction itself.
const PRE_COUNTING_CORRECTION: i32 = 50302;

/// A decoded `GS_GetDMVersion` value.
///
/// The plugin reports `10000 * (major + 2) + 100 * minor + sub`, with two
/// legacy exceptions: GMS 1.x values below 40000, and GMS 2.3.0, which
/// reports 31100 and is normalized to 40300 here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmVersion {
    /// Normalized version number.
    pub raw: i32,
    /// Major version.
    pub major: i32,
    /// Minor version; unknown for 1.x.
    pub minor: Option<i32>,
    /// Sub-minor version; unknown for 1.x.
    pub sub: Option<i32>,
}

impl DmVersion {
    /// Decodes the raw value returned by the plugin.
    pub const fn from_long(raw: i32) -> Self {
        match raw {
            31100..40000 => Self::known(40300, 2, 3, 0),
            ..40000 => Self {
                raw,
                major: 1,
                minor: None,
                sub: None,
            },
            // minor is 0 or 1 here; 1 is the only one seen with K2 cameras
            40000 => Self::known(raw, 2, 1, 0),
            _ => {
                let major = raw / 10000 - 2;
                let rest = raw - (major + 2) * 10000;
                Self::known(raw, major, rest / 100, rest % 100)
            }
        }
    }

    /// Version with every component known.
    const fn known(raw: i32, major: i32, minor: i32, sub: i32) -> Self {
        Self {
            raw,
            major,
            minor: Some(minor),
            sub: Some(sub),
        }
    }

    /// Correction flags to request with an acquisition.
    ///
    /// GMS 3.3.2 and later apply defect correction before counting, so
    /// only defect correction (1) is asked for; older versions get none.
    pub const fn correction_flags(&self) -> i32 {
        if self.raw >= PRE_COUNTING_CORRECTION { 1 } else { 0 }
    }
}

impl fmt::Display for DmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.minor, self.sub) {
            (Some(minor), Some(sub)) => write!(f, "{}.{minor}.{sub}", self.major),
            _ => write!(f, "{}.x", self.major),
        }
    }
}
