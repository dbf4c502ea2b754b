//! Boot-container loader for the platform management controller.
//!
//! The loader pulls a programmable device image (PDI) from a boot
//! source, validates its header chain, copies partitions to their
//! destinations, brings the destination power islands up through
//! [`pmc_power`], and hands the loaded cores off to the power firmware.
//!
//! Hardware sits behind three seams so the pipeline runs unmodified on
//! host-side tests:
//! - [`device::BootDeviceOps`] for the boot interfaces,
//! - [`platform::PlatformRegs`] for the identity/status registers,
//! - [`secure::SecureGate`] for authenticated and encrypted containers.

#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod device;
pub mod error;
pub mod handoff;
pub mod header;
pub mod idcode;
pub mod pipeline;
pub mod platform;
pub mod secure;
pub mod source;

pub use device::{BootDeviceOps, DeviceRegistry, InitRequest};
pub use error::{LoaderError, Result};
pub use handoff::{ExecState, HandoffCpu, HandoffEntry};
pub use header::{
    IhtAttributes, ImageHeader, ImageHeaderTable, MetaHeader, PartitionHeader, IHT_SIZE,
    IMAGE_HEADER_SIZE, PARTITION_HEADER_SIZE,
};
pub use pipeline::{
    BootContext, BootInstance, DeferredImage, PdiKind, SlrRole, SubsystemEntry, SubsystemTable,
    MAX_SUBSYSTEMS, WILDCARD_IMAGE_ID,
};
pub use platform::{PlatformRegs, DDR_STAGING_BASE, IMAGE_SEARCH_STRIDE};
pub use secure::{OpenGate, SecureGate, SecurePolicy};
pub use source::{BootSource, SbdSelector, SecondaryBoot};
