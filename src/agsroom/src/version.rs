//! Room file revision detection and per-revision capabilities.
//!
//! Every compiled room starts with a little-endian u16 revision number.
//! The revision governs how the rest of the file is shaped: whether strings
//! are length-prefixed or fixed-width, whether block lengths are 32 or 64
//! bits wide, and whether hotspots carry script names at all.

use thiserror::Error;

/// Errors from revision detection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("file too small: need at least 2 bytes for the revision field, got {0}")]
    TooSmall(usize),

    #[error("unknown room revision {0}")]
    Unknown(u16),
}

/// Known on-disk room file revisions.
///
/// The raw values are the numbers actually stored in the first two bytes of
/// a room file. Names follow the editor release that introduced the
/// revision. The set is closed: anything outside it fails detection rather
/// than being guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum RoomVersion {
    Pre114v3 = 3,
    Pre114v4 = 4,
    Pre114v5 = 5,
    Pre114v6 = 6,
    V114 = 8,
    V200 = 9,
    V208 = 10,
    V214 = 11,
    V240 = 12,
    V241 = 13,
    V250a = 14,
    V250b = 15,
    V251 = 16,
    V253 = 17,
    V255a = 18,
    V255b = 19,
    V261 = 20,
    V262 = 21,
    V270 = 22,
    V272 = 23,
    V300a = 24,
    V300b = 25,
    V303a = 26,
    V303b = 27,
    V3404 = 28,
    V3415 = 29,
    V350 = 30,
    V360 = 31,
    V361 = 32,
    V370 = 33,
}

/// What a given revision supports, derived once and passed around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Hotspots (and objects) carry script identifiers.
    pub script_names: bool,
    /// Strings are `[u32 length][bytes]` rather than fixed-width NUL-padded.
    pub length_prefixed_strings: bool,
    /// Block lengths are u64 rather than u32.
    pub wide_block_lengths: bool,
    /// Width of fixed-width strings when `length_prefixed_strings` is false.
    pub legacy_string_len: usize,
}

/// Fixed-width string size used by pre-3.4.1.5 rooms.
const LEGACY_STRING_LEN: usize = 30;

impl RoomVersion {
    /// Map a raw on-disk revision number to a known revision.
    pub fn from_raw(raw: u16) -> Option<Self> {
        use RoomVersion::*;
        Some(match raw {
            3 => Pre114v3,
            4 => Pre114v4,
            5 => Pre114v5,
            6 => Pre114v6,
            8 => V114,
            9 => V200,
            10 => V208,
            11 => V214,
            12 => V240,
            13 => V241,
            14 => V250a,
            15 => V250b,
            16 => V251,
            17 => V253,
            18 => V255a,
            19 => V255b,
            20 => V261,
            21 => V262,
            22 => V270,
            23 => V272,
            24 => V300a,
            25 => V300b,
            26 => V303a,
            27 => V303b,
            28 => V3404,
            29 => V3415,
            30 => V350,
            31 => V360,
            32 => V361,
            33 => V370,
            _ => return None,
        })
    }

    /// Raw on-disk revision number.
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Read the revision field from the start of a room file.
    pub fn detect(bytes: &[u8]) -> Result<Self, VersionError> {
        if bytes.len() < 2 {
            return Err(VersionError::TooSmall(bytes.len()));
        }
        let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
        Self::from_raw(raw).ok_or(VersionError::Unknown(raw))
    }

    /// Derive the capability flags for this revision.
    ///
    /// Pure and total: no I/O, no state, safe to call repeatedly.
    pub fn capabilities(self) -> Capabilities {
        use RoomVersion::*;
        Capabilities {
            script_names: self >= V270,
            length_prefixed_strings: self >= V3415,
            wide_block_lengths: self >= V350,
            legacy_string_len: LEGACY_STRING_LEN,
        }
    }
}

impl std::fmt::Display for RoomVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (raw {})", self, self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_too_small() {
        assert_eq!(RoomVersion::detect(&[]), Err(VersionError::TooSmall(0)));
        assert_eq!(RoomVersion::detect(&[31]), Err(VersionError::TooSmall(1)));
    }

    #[test]
    fn test_detect_boundary_values() {
        // min-1, min, max, max+1
        assert_eq!(RoomVersion::detect(&[2, 0]), Err(VersionError::Unknown(2)));
        assert_eq!(RoomVersion::detect(&[3, 0]), Ok(RoomVersion::Pre114v3));
        assert_eq!(RoomVersion::detect(&[33, 0]), Ok(RoomVersion::V370));
        assert_eq!(
            RoomVersion::detect(&[34, 0]),
            Err(VersionError::Unknown(34))
        );
        // value inside the numeric range but not in the closed set
        assert_eq!(RoomVersion::detect(&[7, 0]), Err(VersionError::Unknown(7)));
    }

    #[test]
    fn test_detect_is_little_endian() {
        // 0x0021 = 33, not 0x2100
        assert_eq!(RoomVersion::detect(&[0x21, 0x00]), Ok(RoomVersion::V370));
    }

    #[test]
    fn test_capabilities_total_and_deterministic() {
        for raw in 0..=u16::MAX {
            if let Some(v) = RoomVersion::from_raw(raw) {
                assert_eq!(v.capabilities(), v.capabilities());
            }
        }
    }

    #[test]
    fn test_capability_thresholds() {
        let caps = RoomVersion::V262.capabilities();
        assert!(!caps.script_names);
        assert!(!caps.length_prefixed_strings);

        let caps = RoomVersion::V270.capabilities();
        assert!(caps.script_names);
        assert!(!caps.length_prefixed_strings);
        assert_eq!(caps.legacy_string_len, 30);

        let caps = RoomVersion::V3415.capabilities();
        assert!(caps.length_prefixed_strings);
        assert!(!caps.wide_block_lengths);

        let caps = RoomVersion::V350.capabilities();
        assert!(caps.wide_block_lengths);

        let caps = RoomVersion::V370.capabilities();
        assert!(caps.script_names && caps.length_prefixed_strings && caps.wide_block_lengths);
    }
}
