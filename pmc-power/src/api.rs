//! Device-level power API consumed by the boot loader.
//!
//! The loader does not drive individual rails for core wake-up or boot
//! peripheral access; it goes through this subsystem-facing interface,
//! which the platform power firmware implements on top of the domain
//! tree and the per-device reset/clock controls.

use bitflags::bitflags;

use crate::error::Result;

/// Wakeable processor cores and boot-path peripherals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    /// Application core 0
    Acpu0,
    /// Application core 1
    Acpu1,
    /// Realtime core 0
    Rpu0,
    /// Realtime core 1
    Rpu1,
    /// Platform services processor
    Psm,
    /// Quad SPI controller
    Qspi,
    /// Octal SPI controller
    Ospi,
    /// SD/eMMC controller 0
    Sdio0,
    /// SD/eMMC controller 1
    Sdio1,
    /// USB controller 0
    Usb0,
}

impl DeviceId {
    /// Device name for log output
    pub fn name(&self) -> &'static str {
        match self {
            DeviceId::Acpu0 => "ACPU0",
            DeviceId::Acpu1 => "ACPU1",
            DeviceId::Rpu0 => "RPU0",
            DeviceId::Rpu1 => "RPU1",
            DeviceId::Psm => "PSM",
            DeviceId::Qspi => "QSPI",
            DeviceId::Ospi => "OSPI",
            DeviceId::Sdio0 => "SDIO0",
            DeviceId::Sdio1 => "SDIO1",
            DeviceId::Usb0 => "USB0",
        }
    }
}

/// Identity of the subsystem issuing a power request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    /// The platform management controller itself (boot-time requests)
    Pmc,
    /// A loaded subsystem, by id
    Subsystem(u32),
}

bitflags! {
    /// Capabilities requested along with exclusive device access
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Register access to the device
        const ACCESS = 1 << 0;
        /// Retain device context across suspend
        const CONTEXT = 1 << 1;
        /// Device may wake the requester
        const WAKEUP = 1 << 2;
    }
}

/// Default quality-of-service value for boot-time device requests
pub const DEFAULT_QOS: u32 = 100;

/// Power services the loader consumes during boot and resume.
pub trait SubsystemPower {
    /// Wake a core at `address` (when `set_address` is set) or at its
    /// previously configured vector. `ack` requests a completion
    /// acknowledgement from the power firmware.
    fn request_wake_up(
        &mut self,
        requester: Requester,
        device: DeviceId,
        set_address: bool,
        address: u64,
        ack: bool,
    ) -> Result<()>;

    /// Acquire exclusive access to a boot peripheral
    fn request_device(
        &mut self,
        requester: Requester,
        device: DeviceId,
        capabilities: Capabilities,
        qos: u32,
        ack: bool,
    ) -> Result<()>;

    /// Release a previously acquired boot peripheral
    fn release_device(&mut self, requester: Requester, device: DeviceId) -> Result<()>;
}
