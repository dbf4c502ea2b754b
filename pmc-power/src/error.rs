//! Power subsystem error handling.
//!
//! Errors are plain status values carried up the call chain; nothing in
//! the power core panics on a hardware or sequencing failure.

use core::fmt;

use crate::api::DeviceId;
use crate::state::{PowerEvent, PowerState};

/// Power subsystem error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// Domain id out of range or not initialized
    InvalidDomain(u32),

    /// Domain slot already initialized
    DomainBusy(u32),

    /// Child list of the parent domain is full
    TooManyChildren(u32),

    /// Event has no transition from the current state; the state is
    /// left unchanged
    InvalidTransition {
        state: PowerState,
        event: PowerEvent,
    },

    /// Poll budget exhausted while waiting for a hardware completion
    Timeout(u32),

    /// A device-level power request was denied
    RequestDenied(DeviceId),
}

impl PowerError {
    /// Convert to a status code suitable for persisted error registers
    pub fn as_error_code(&self) -> u32 {
        match self {
            PowerError::InvalidDomain(id) => 0x2000 + id,
            PowerError::DomainBusy(id) => 0x2100 + id,
            PowerError::TooManyChildren(id) => 0x2200 + id,
            PowerError::InvalidTransition { .. } => 0x2300,
            PowerError::Timeout(id) => 0x2400 + id,
            PowerError::RequestDenied(_) => 0x2500,
        }
    }

    /// Get a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            PowerError::InvalidDomain(_) => "Invalid power domain id",
            PowerError::DomainBusy(_) => "Power domain already initialized",
            PowerError::TooManyChildren(_) => "Parent child list full",
            PowerError::InvalidTransition { .. } => "Event rejected in current state",
            PowerError::Timeout(_) => "Power transition poll budget exhausted",
            PowerError::RequestDenied(_) => "Device power request denied",
        }
    }
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::InvalidTransition { state, event } => write!(
                f,
                "PowerError: event {} rejected in state {} (code: {:#x})",
                event.as_str(),
                state.as_str(),
                self.as_error_code()
            ),
            _ => write!(
                f,
                "PowerError: {} (code: {:#x})",
                self.description(),
                self.as_error_code()
            ),
        }
    }
}

/// Result type used throughout the power subsystem
pub type Result<T = ()> = core::result::Result<T, PowerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        assert_ne!(
            PowerError::InvalidDomain(1).as_error_code(),
            PowerError::DomainBusy(1).as_error_code()
        );
        assert_ne!(
            PowerError::Timeout(0).as_error_code(),
            PowerError::InvalidTransition {
                state: PowerState::Off,
                event: PowerEvent::PwrDown,
            }
            .as_error_code()
        );
    }

    #[test]
    fn test_display_names_transition() {
        let err = PowerError::InvalidTransition {
            state: PowerState::Off,
            event: PowerEvent::PwrDown,
        };
        let text = std::format!("{}", err);
        assert!(text.contains("PWR_DOWN"));
        assert!(text.contains("OFF"));
    }
}
