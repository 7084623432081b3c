use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Access request state, stored as TEXT in the access_requests table.
/// PENDING and APPROVED are the "active" states; a device carries at
/// most one active request at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Completed => "COMPLETED",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(anyhow::anyhow!("unknown request status: {other}")),
        }
    }
}

/// Requested access window. Advisory only: no timer in this engine
/// expires an approval, the value is surfaced to approvers and auditors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseDuration {
    OneHour,
    TwoHours,
    FourHours,
    OneDay,
}

impl LeaseDuration {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::OneDay => "24h",
        }
    }
}

impl fmt::Display for LeaseDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaseDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Self::OneHour),
            "2h" => Ok(Self::TwoHours),
            "4h" => Ok(Self::FourHours),
            "24h" => Ok(Self::OneDay),
            other => Err(anyhow::anyhow!("unknown duration: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(RequestStatus::Pending.is_active());
        assert!(RequestStatus::Approved.is_active());
        assert!(!RequestStatus::Rejected.is_active());
        assert!(!RequestStatus::Completed.is_active());
    }

    #[test]
    fn duration_parses_the_fixed_set() {
        for (text, want) in [
            ("1h", LeaseDuration::OneHour),
            ("2h", LeaseDuration::TwoHours),
            ("4h", LeaseDuration::FourHours),
            ("24h", LeaseDuration::OneDay),
        ] {
            assert_eq!(text.parse::<LeaseDuration>().unwrap(), want);
        }
        assert!("3h".parse::<LeaseDuration>().is_err());
    }
}
