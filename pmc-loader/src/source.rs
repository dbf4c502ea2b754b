//! Boot source selectors and the raw boot-mode word.
//!
//! The boot-mode word keeps the source selector in its low byte. A
//! secondary boot chained from an SD-class device cannot carry a full
//! byte address through the device's init path, so the word also packs
//! an address-override flag and a coarse offset above the selector.

use pmc_power::DeviceId;

use crate::error::{LoaderError, Result};

/// Low byte of the boot-mode word selects the source
pub const SOURCE_MASK: u32 = 0xFF;

/// Set when the bits above [`ADDR_SHIFT`] carry a source offset
pub const ADDR_OVERRIDE_FLAG: u32 = 1 << 8;

/// Bit position of the packed source offset
pub const ADDR_SHIFT: u32 = 9;

/// Primary and secondary boot interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootSource {
    /// JTAG / debug streaming interface
    Jtag = 0x0,
    /// Quad SPI, 24-bit addressing
    Qspi24 = 0x1,
    /// Quad SPI, 32-bit addressing
    Qspi32 = 0x2,
    /// SD controller 0
    Sd0 = 0x3,
    /// SD controller 1
    Sd1 = 0x5,
    /// eMMC on SD controller 1
    Emmc = 0x6,
    /// Octal SPI
    Ospi = 0x8,
    /// Slave parallel streaming interface
    Smap = 0xA,
    /// SD controller 1 in low-speed mode
    Sd1Ls = 0xE,
    /// DDR staging area for deferred images
    Ddr = 0xF,
    /// Slave boot interface streaming
    Sbi = 0x10,
}

impl BootSource {
    /// Decode the selector byte of a boot-mode word
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw & SOURCE_MASK {
            0x0 => Ok(BootSource::Jtag),
            0x1 => Ok(BootSource::Qspi24),
            0x2 => Ok(BootSource::Qspi32),
            0x3 => Ok(BootSource::Sd0),
            0x5 => Ok(BootSource::Sd1),
            0x6 => Ok(BootSource::Emmc),
            0x8 => Ok(BootSource::Ospi),
            0xA => Ok(BootSource::Smap),
            0xE => Ok(BootSource::Sd1Ls),
            0xF => Ok(BootSource::Ddr),
            0x10 => Ok(BootSource::Sbi),
            other => Err(LoaderError::UnsupportedBootSource(other)),
        }
    }

    /// Selector value of this source
    pub fn id(&self) -> u32 {
        *self as u32
    }

    /// Source name for log output
    pub fn name(&self) -> &'static str {
        match self {
            BootSource::Jtag => "JTAG",
            BootSource::Qspi24 => "QSPI24",
            BootSource::Qspi32 => "QSPI32",
            BootSource::Sd0 => "SD0",
            BootSource::Sd1 => "SD1",
            BootSource::Emmc => "EMMC",
            BootSource::Ospi => "OSPI",
            BootSource::Smap => "SMAP",
            BootSource::Sd1Ls => "SD1_LS",
            BootSource::Ddr => "DDR",
            BootSource::Sbi => "SBI",
        }
    }

    /// Random-access flash source
    pub fn is_flash(&self) -> bool {
        matches!(
            self,
            BootSource::Qspi24
                | BootSource::Qspi32
                | BootSource::Sd0
                | BootSource::Sd1
                | BootSource::Emmc
                | BootSource::Ospi
                | BootSource::Sd1Ls
        )
    }

    /// Raw flash searched in multiboot strides. SD-class sources carry
    /// a filesystem; the selected file already is the image, so the
    /// boot address is used as given.
    pub fn honors_multiboot(&self) -> bool {
        matches!(
            self,
            BootSource::Qspi24 | BootSource::Qspi32 | BootSource::Ospi
        )
    }

    /// Streaming slave interface; reset on a failed load so the host
    /// can retry
    pub fn is_streaming(&self) -> bool {
        matches!(self, BootSource::Jtag | BootSource::Sbi)
    }
}

/// Source offset packed into a boot-mode word, when the override flag
/// is set
pub fn address_override(raw: u32) -> Option<u64> {
    if raw & ADDR_OVERRIDE_FLAG != 0 {
        Some(u64::from(raw >> ADDR_SHIFT))
    } else {
        None
    }
}

/// Pack a source selector and offset into a boot-mode word
pub fn encode_override(source: BootSource, offset: u32) -> u32 {
    source.id() | ADDR_OVERRIDE_FLAG | (offset << ADDR_SHIFT)
}

/// Secondary boot device selector carried in the header table
/// attribute word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbdSelector {
    /// Continue on the primary source
    Same,
    Qspi32,
    Qspi24,
    Sd0,
    Sd1,
    Sd1Ls,
    Emmc,
    Ospi,
    /// Host pushes the secondary container over the streaming interface
    Pcie,
    /// Reserved encoding
    Unknown(u32),
}

impl SbdSelector {
    /// Decode the SBD field value
    pub fn from_field(value: u32) -> Self {
        match value {
            0x0 => SbdSelector::Same,
            0x1 => SbdSelector::Qspi32,
            0x2 => SbdSelector::Qspi24,
            0x3 => SbdSelector::Sd0,
            0x4 => SbdSelector::Sd1,
            0x5 => SbdSelector::Sd1Ls,
            0x6 => SbdSelector::Emmc,
            0x7 => SbdSelector::Ospi,
            0x8 => SbdSelector::Pcie,
            other => SbdSelector::Unknown(other),
        }
    }
}

/// Resolved secondary boot action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryBoot {
    /// No secondary container
    None,
    /// Re-arm the streaming interface for a host-pushed container
    Rearm,
    /// Chain-load a partial container from another source
    Chain { raw_source: u32, address: u64 },
}

/// Map a header-table SBD selector to the follow-up boot action.
///
/// Flash SBDs read from `sbd_address` directly. SD-class SBDs cannot
/// seek from the boot word alone, so the offset is packed into the
/// boot-mode word and the load address is zero.
pub fn map_secondary(selector: SbdSelector, sbd_address: u64) -> Result<SecondaryBoot> {
    match selector {
        SbdSelector::Same => Ok(SecondaryBoot::None),
        SbdSelector::Pcie => Ok(SecondaryBoot::Rearm),
        SbdSelector::Qspi32 => Ok(SecondaryBoot::Chain {
            raw_source: BootSource::Qspi32.id(),
            address: sbd_address,
        }),
        SbdSelector::Qspi24 => Ok(SecondaryBoot::Chain {
            raw_source: BootSource::Qspi24.id(),
            address: sbd_address,
        }),
        SbdSelector::Ospi => Ok(SecondaryBoot::Chain {
            raw_source: BootSource::Ospi.id(),
            address: sbd_address,
        }),
        SbdSelector::Sd0 => Ok(SecondaryBoot::Chain {
            raw_source: encode_override(BootSource::Sd0, sbd_address as u32),
            address: 0,
        }),
        SbdSelector::Sd1 => Ok(SecondaryBoot::Chain {
            raw_source: encode_override(BootSource::Sd1, sbd_address as u32),
            address: 0,
        }),
        SbdSelector::Sd1Ls => Ok(SecondaryBoot::Chain {
            raw_source: encode_override(BootSource::Sd1Ls, sbd_address as u32),
            address: 0,
        }),
        SbdSelector::Emmc => Ok(SecondaryBoot::Chain {
            raw_source: encode_override(BootSource::Emmc, sbd_address as u32),
            address: 0,
        }),
        SbdSelector::Unknown(raw) => Err(LoaderError::UnsupportedSecondaryBoot(raw)),
    }
}

/// Power-manager device backing a boot source, for exclusive
/// request/release around reloads
pub fn device_for_source(source: BootSource) -> Option<DeviceId> {
    match source {
        BootSource::Qspi24 | BootSource::Qspi32 => Some(DeviceId::Qspi),
        BootSource::Ospi => Some(DeviceId::Ospi),
        BootSource::Sd0 => Some(DeviceId::Sdio0),
        BootSource::Sd1 | BootSource::Emmc | BootSource::Sd1Ls => Some(DeviceId::Sdio1),
        _ => None,
    }
}
