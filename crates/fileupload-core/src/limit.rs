//! Byte-count ceilings.
//!
//! Configuration traditionally spells "no limit" as `-1`. [`SizeLimit`] keeps
//! that external contract (it converts from and serializes to a signed
//! integer) while the rest of the crate matches on an explicit variant.

use serde::{Deserialize, Serialize};

/// A byte-count ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum SizeLimit {
    /// No ceiling; never faults regardless of the observed byte count.
    #[default]
    Unlimited,
    /// At most this many bytes are permitted.
    Limited(u64),
}

impl SizeLimit {
    /// Convert a signed configuration value. Any negative value means unlimited.
    #[must_use]
    pub fn from_signed(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(max) => Self::Limited(max),
            Err(_) => Self::Unlimited,
        }
    }

    /// The signed configuration value, `-1` for unlimited.
    #[must_use]
    pub fn to_signed(self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::Limited(max) => i64::try_from(max).unwrap_or(i64::MAX),
        }
    }

    /// Returns the ceiling, or `None` when unlimited.
    #[must_use]
    pub fn max(self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Limited(max) => Some(max),
        }
    }

    /// Returns true if this limit never faults.
    #[must_use]
    pub fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Returns true if `size` bytes fit within the ceiling.
    #[must_use]
    pub fn allows(self, size: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => size <= max,
        }
    }

    /// Bytes that may still be delivered after `consumed` bytes.
    ///
    /// `None` when unlimited.
    #[must_use]
    pub fn remaining(self, consumed: u64) -> Option<u64> {
        self.max().map(|max| max.saturating_sub(consumed))
    }
}

impl From<i64> for SizeLimit {
    fn from(value: i64) -> Self {
        Self::from_signed(value)
    }
}

impl From<SizeLimit> for i64 {
    fn from(limit: SizeLimit) -> Self {
        limit.to_signed()
    }
}

impl From<Option<u64>> for SizeLimit {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unlimited, Self::Limited)
    }
}

impl std::fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Limited(max) => write!(f, "{max} bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_are_unlimited() {
        assert_eq!(SizeLimit::from_signed(-1), SizeLimit::Unlimited);
        assert_eq!(SizeLimit::from_signed(-42), SizeLimit::Unlimited);
        assert_eq!(SizeLimit::from_signed(0), SizeLimit::Limited(0));
        assert_eq!(SizeLimit::from_signed(30), SizeLimit::Limited(30));
    }

    #[test]
    fn signed_round_trip_keeps_sentinel() {
        assert_eq!(SizeLimit::Unlimited.to_signed(), -1);
        assert_eq!(SizeLimit::Limited(200).to_signed(), 200);
        assert_eq!(SizeLimit::Limited(u64::MAX).to_signed(), i64::MAX);
    }

    #[test]
    fn unlimited_allows_everything() {
        assert!(SizeLimit::Unlimited.allows(u64::MAX));
        assert_eq!(SizeLimit::Unlimited.remaining(10), None);
    }

    #[test]
    fn limited_remaining_saturates() {
        let limit = SizeLimit::Limited(40);
        assert!(limit.allows(40));
        assert!(!limit.allows(41));
        assert_eq!(limit.remaining(33), Some(7));
        assert_eq!(limit.remaining(50), Some(0));
    }

    #[test]
    fn serde_uses_signed_integer() {
        let json = serde_json::to_string(&SizeLimit::Unlimited).unwrap();
        assert_eq!(json, "-1");
        let parsed: SizeLimit = serde_json::from_str("300").unwrap();
        assert_eq!(parsed, SizeLimit::Limited(300));
    }
}
