//! Platform identity and status register seam.

/// Boot status sentinel written before the first device access
pub const PDI_LOAD_STARTED: u32 = 0x1;

/// Boot status sentinel written after the last image is running
pub const PDI_LOAD_COMPLETE: u32 = 0xF;

/// Byte stride between multiboot image slots on flash sources
pub const IMAGE_SEARCH_STRIDE: u64 = 0x8000;

/// Working-memory base where delay-load images are staged
pub const DDR_STAGING_BASE: u64 = 0x5000_0000;

/// Identity, status and configuration registers the loader touches.
///
/// The real implementation reads the device tap and efuse cache and
/// writes the persisted boot status register; tests substitute a
/// software model.
pub trait PlatformRegs {
    /// Multiboot offset register; selects the flash image slot
    fn multiboot(&self) -> u32;

    /// Device IDCODE from the tap
    fn idcode(&self) -> u32;

    /// Raw extended IDCODE word from the efuse cache
    fn ext_idcode(&self) -> u32;

    /// True on silicon; emulation platforms skip the identity checks
    fn is_silicon(&self) -> bool;

    /// Persist a boot status sentinel for the next boot stage
    fn write_boot_status(&mut self, status: u32);

    /// Application processor configuration register
    fn apu_config(&self) -> u32;

    /// Write back the application processor configuration register
    fn set_apu_config(&mut self, value: u32);

    /// Monotonic millisecond timestamp for per-image load timing
    fn timestamp_ms(&self) -> u64;
}
