//! Loader error handling.
//!
//! Every pipeline stage returns `Result`; a failure code propagates to
//! the top of the boot flow where it is persisted for the next stage to
//! inspect. Validation failures are terminal for the load in progress.

use core::fmt;

use pmc_power::{DeviceId, PowerError};

use crate::handoff::HandoffCpu;
use crate::source::BootSource;

/// Loader error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// Boot source selector has no registered handler
    UnsupportedBootSource(u32),

    /// No image with this id in the loaded subsystem table
    ImageIdNotFound(u32),

    /// Secondary boot device selector not mapped on this platform
    UnsupportedSecondaryBoot(u32),

    /// No staged copy of this image in the deferred catalog
    DeferredImageNotFound(u32),

    /// Operation needs a completed full boot
    NoActiveSubsystem,

    /// Pending handoff list is full
    TooManyHandoffs,

    /// Image header table failed structural validation
    HeaderTable,

    /// Image header record failed checksum or range validation
    ImageHeader,

    /// Partition header record failed checksum or range validation
    PartitionHeader,

    /// Secure gate rejected the container or its policy
    SecureValidation,

    /// Container IDCODE does not match the device
    IdCodeMismatch,

    /// Container extended IDCODE does not match the device
    ExtIdCodeMismatch,

    /// Device extended IDCODE is unprogrammed on a non-legacy device
    InvalidZeroExtIdCode,

    /// Wake-up request for a handoff core was denied
    WakeUpFailed(HandoffCpu),

    /// Boot interface initialization failed
    DeviceInit(BootSource),

    /// Boot interface data transfer failed
    DeviceCopy(BootSource),

    /// Exclusive access to a boot peripheral was denied
    DeviceAccess(DeviceId),

    /// Power sequencing failure during partition load
    Power(PowerError),
}

impl LoaderError {
    /// Convert to a status code suitable for persisted error registers
    pub fn as_error_code(&self) -> u32 {
        match self {
            LoaderError::UnsupportedBootSource(src) => 0x3000 + (src & 0xFF),
            LoaderError::ImageIdNotFound(_) => 0x3100,
            LoaderError::UnsupportedSecondaryBoot(sbd) => 0x3200 + (sbd & 0xF),
            LoaderError::DeferredImageNotFound(_) => 0x3300,
            LoaderError::NoActiveSubsystem => 0x3400,
            LoaderError::TooManyHandoffs => 0x3500,
            LoaderError::HeaderTable => 0x3600,
            LoaderError::ImageHeader => 0x3610,
            LoaderError::PartitionHeader => 0x3620,
            LoaderError::SecureValidation => 0x3700,
            LoaderError::IdCodeMismatch => 0x3800,
            LoaderError::ExtIdCodeMismatch => 0x3810,
            LoaderError::InvalidZeroExtIdCode => 0x3820,
            LoaderError::WakeUpFailed(_) => 0x3900,
            LoaderError::DeviceInit(src) => 0x3A00 + src.id(),
            LoaderError::DeviceCopy(src) => 0x3B00 + src.id(),
            LoaderError::DeviceAccess(_) => 0x3C00,
            LoaderError::Power(err) => err.as_error_code(),
        }
    }

    /// Get a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            LoaderError::UnsupportedBootSource(_) => "Unsupported boot source",
            LoaderError::ImageIdNotFound(_) => "Image id not found",
            LoaderError::UnsupportedSecondaryBoot(_) => "Unsupported secondary boot device",
            LoaderError::DeferredImageNotFound(_) => "Image not in deferred catalog",
            LoaderError::NoActiveSubsystem => "No active subsystem context",
            LoaderError::TooManyHandoffs => "Pending handoff list full",
            LoaderError::HeaderTable => "Image header table validation failed",
            LoaderError::ImageHeader => "Image header validation failed",
            LoaderError::PartitionHeader => "Partition header validation failed",
            LoaderError::SecureValidation => "Secure validation failed",
            LoaderError::IdCodeMismatch => "IDCODE mismatch",
            LoaderError::ExtIdCodeMismatch => "Extended IDCODE mismatch",
            LoaderError::InvalidZeroExtIdCode => "Extended IDCODE unprogrammed",
            LoaderError::WakeUpFailed(_) => "Core wake-up failed",
            LoaderError::DeviceInit(_) => "Boot device init failed",
            LoaderError::DeviceCopy(_) => "Boot device copy failed",
            LoaderError::DeviceAccess(_) => "Boot device access denied",
            LoaderError::Power(_) => "Power sequencing failed",
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::WakeUpFailed(cpu) => write!(
                f,
                "LoaderError: wake-up failed for {} (code: {:#x})",
                cpu.name(),
                self.as_error_code()
            ),
            LoaderError::Power(err) => write!(f, "LoaderError: {}", err),
            _ => write!(
                f,
                "LoaderError: {} (code: {:#x})",
                self.description(),
                self.as_error_code()
            ),
        }
    }
}

impl From<PowerError> for LoaderError {
    fn from(err: PowerError) -> Self {
        LoaderError::Power(err)
    }
}

/// Result type used throughout the loader
pub type Result<T = ()> = core::result::Result<T, LoaderError>;
