//! Power domain states and events.

/// Per-domain power state.
///
/// `Lbist`, `ScanClear`, `Bisr` and `Mist` are reserved for built-in
/// self-test phases and are never produced by the sequencing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Rail down, domain released
    Off,
    /// Rail down, domain initialized and ready for a power-up request
    Standby,
    /// Waiting for the parent domain's use-count to reach the recorded target
    PwrUpParent,
    /// Own power assertion issued, waiting for hardware completion
    PwrUpSelf,
    /// Rail up and counted
    On,
    /// Own power release issued, waiting for hardware completion
    PwrDownSelf,
    /// Waiting for the parent release to be reflected in its use-count
    PwrDownParent,
    /// Logic built-in self-test phase
    Lbist,
    /// Scan clear phase
    ScanClear,
    /// Bit repair phase
    Bisr,
    /// Memory built-in self-test phase
    Mist,
}

impl PowerState {
    /// State name for log output
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Off => "OFF",
            PowerState::Standby => "STANDBY",
            PowerState::PwrUpParent => "PWR_UP_PARENT",
            PowerState::PwrUpSelf => "PWR_UP_SELF",
            PowerState::On => "ON",
            PowerState::PwrDownSelf => "PWR_DOWN_SELF",
            PowerState::PwrDownParent => "PWR_DOWN_PARENT",
            PowerState::Lbist => "LBIST",
            PowerState::ScanClear => "SCAN_CLEAR",
            PowerState::Bisr => "BISR",
            PowerState::Mist => "MIST",
        }
    }

    /// A settled state needs no further timer delivery.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            PowerState::PwrUpParent
                | PowerState::PwrUpSelf
                | PowerState::PwrDownSelf
                | PowerState::PwrDownParent
        )
    }
}

/// Events accepted by the domain state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    /// Request to bring the domain up (fan-in: counted per requester)
    PwrUp,
    /// Parent rail confirmed up
    ParentUpDone,
    /// Own rail confirmed up
    SelfUpDone,
    /// Request to release the domain
    PwrDown,
    /// Own rail confirmed down
    SelfDownDone,
    /// Parent release confirmed
    ParentDownDone,
    /// Periodic poll tick for a pending transition
    Timer,
}

impl PowerEvent {
    /// Event name for log output
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerEvent::PwrUp => "PWR_UP",
            PowerEvent::ParentUpDone => "PARENT_UP_DONE",
            PowerEvent::SelfUpDone => "SELF_UP_DONE",
            PowerEvent::PwrDown => "PWR_DOWN",
            PowerEvent::SelfDownDone => "SELF_DOWN_DONE",
            PowerEvent::ParentDownDone => "PARENT_DOWN_DONE",
            PowerEvent::Timer => "TIMER",
        }
    }
}
