use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Per-device lifecycle state, stored as TEXT in the devices table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Safe,
    PendingApproval,
    Approved,
    InUse,
    PendingReset,
}

/// Events that drive the device lifecycle. Each corresponds to one
/// workflow operation; reveal only appears here as the first-read
/// transition (repeat reveals are plain reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Request,
    Approve,
    Reject,
    FirstReveal,
    Complete,
    Reset,
}

impl DeviceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::InUse => "IN_USE",
            Self::PendingReset => "PENDING_RESET",
        }
    }

    /// The full transition table. Illegal pairs fail without mutating
    /// anything; a request against a non-SAFE device is the one case
    /// that reports `DeviceBusy` instead of `InvalidTransition`, since
    /// the device is simply occupied by another request.
    pub fn apply(self, event: DeviceEvent) -> Result<Self, EngineError> {
        match (self, event) {
            (Self::Safe, DeviceEvent::Request) => Ok(Self::PendingApproval),
            (_, DeviceEvent::Request) => Err(EngineError::DeviceBusy),

            (Self::PendingApproval, DeviceEvent::Approve) => Ok(Self::Approved),
            (Self::PendingApproval, DeviceEvent::Reject) => Ok(Self::Safe),

            (Self::Approved, DeviceEvent::FirstReveal) => Ok(Self::InUse),

            (Self::InUse, DeviceEvent::Complete) => Ok(Self::PendingReset),

            // Rotation is legal for an idle device, a device currently in
            // use (forced return) and a device waiting for rotation. It is
            // not legal mid-approval: the pending decision has to land first.
            (Self::Safe | Self::InUse | Self::PendingReset, DeviceEvent::Reset) => Ok(Self::Safe),

            (from, event) => Err(EngineError::invalid_transition(
                from.as_str(),
                event.name(),
            )),
        }
    }
}

impl DeviceEvent {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::FirstReveal => "reveal",
            Self::Complete => "complete",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAFE" => Ok(Self::Safe),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "APPROVED" => Ok(Self::Approved),
            "IN_USE" => Ok(Self::InUse),
            "PENDING_RESET" => Ok(Self::PendingReset),
            other => Err(anyhow::anyhow!("unknown device status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_only_from_safe() {
        assert_eq!(
            DeviceStatus::Safe.apply(DeviceEvent::Request).unwrap(),
            DeviceStatus::PendingApproval
        );

        for busy in [
            DeviceStatus::PendingApproval,
            DeviceStatus::Approved,
            DeviceStatus::InUse,
            DeviceStatus::PendingReset,
        ] {
            assert!(matches!(
                busy.apply(DeviceEvent::Request),
                Err(EngineError::DeviceBusy)
            ));
        }
    }

    #[test]
    fn approve_and_reject_leave_pending_approval() {
        assert_eq!(
            DeviceStatus::PendingApproval
                .apply(DeviceEvent::Approve)
                .unwrap(),
            DeviceStatus::Approved
        );
        assert_eq!(
            DeviceStatus::PendingApproval
                .apply(DeviceEvent::Reject)
                .unwrap(),
            DeviceStatus::Safe
        );
        assert!(matches!(
            DeviceStatus::Safe.apply(DeviceEvent::Approve),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reveal_transitions_once() {
        assert_eq!(
            DeviceStatus::Approved
                .apply(DeviceEvent::FirstReveal)
                .unwrap(),
            DeviceStatus::InUse
        );
        assert!(
            DeviceStatus::InUse
                .apply(DeviceEvent::FirstReveal)
                .is_err()
        );
    }

    #[test]
    fn reset_allowed_states() {
        for from in [
            DeviceStatus::Safe,
            DeviceStatus::InUse,
            DeviceStatus::PendingReset,
        ] {
            assert_eq!(from.apply(DeviceEvent::Reset).unwrap(), DeviceStatus::Safe);
        }
        assert!(
            DeviceStatus::PendingApproval
                .apply(DeviceEvent::Reset)
                .is_err()
        );
        assert!(DeviceStatus::Approved.apply(DeviceEvent::Reset).is_err());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            DeviceStatus::Safe,
            DeviceStatus::PendingApproval,
            DeviceStatus::Approved,
            DeviceStatus::InUse,
            DeviceStatus::PendingReset,
        ] {
            assert_eq!(status.as_str().parse::<DeviceStatus>().unwrap(), status);
        }
        assert!("BROKEN".parse::<DeviceStatus>().is_err());
    }
}
