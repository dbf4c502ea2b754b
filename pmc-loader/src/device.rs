//! Boot device handlers and the source-keyed registry.
//!
//! Each boot interface registers one handler; the pipeline resolves
//! handlers by source selector and never names a concrete driver. A
//! platform registers only the interfaces it has strapped, so a lookup
//! miss is a configuration error, not a bug.

use alloc::boxed::Box;
use hashbrown::HashMap;

use crate::error::{LoaderError, Result};
use crate::source::BootSource;

/// Parameters for bringing a boot interface up
#[derive(Debug, Clone, Copy)]
pub struct InitRequest {
    /// Source being initialized (one handler may serve several
    /// selectors, e.g. both QSPI addressing modes)
    pub source: BootSource,
    /// Source offset unpacked from the boot-mode word, for SD-class
    /// secondary boots
    pub address_override: Option<u64>,
}

/// Operations every boot interface handler provides.
pub trait BootDeviceOps {
    /// Bring the interface up for the given source
    fn init(&mut self, request: &InitRequest) -> Result<()>;

    /// Copy `len` bytes from the source offset to a physical
    /// destination address
    fn copy(&mut self, src_offset: u64, dest_address: u64, len: u32) -> Result<()>;

    /// Read header bytes from the source offset into working memory
    fn read(&mut self, src_offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Reset the interface after a failed load; meaningful for
    /// streaming sources only
    fn reset(&mut self) {}
}

/// One registered handler
pub struct DeviceEntry {
    name: &'static str,
    ops: Box<dyn BootDeviceOps>,
}

impl DeviceEntry {
    /// Handler name for log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Mutable access to the handler
    pub fn ops_mut(&mut self) -> &mut dyn BootDeviceOps {
        &mut *self.ops
    }
}

/// Boot-source-keyed handler registry.
#[derive(Default)]
pub struct DeviceRegistry {
    entries: HashMap<BootSource, DeviceEntry>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler for a source, replacing any previous one
    pub fn register(
        &mut self,
        source: BootSource,
        name: &'static str,
        ops: Box<dyn BootDeviceOps>,
    ) {
        self.entries.insert(source, DeviceEntry { name, ops });
    }

    /// True when the source has a registered handler
    pub fn contains(&self, source: BootSource) -> bool {
        self.entries.contains_key(&source)
    }

    /// Resolve the handler for a source
    pub fn lookup_mut(&mut self, source: BootSource) -> Result<&mut DeviceEntry> {
        self.entries
            .get_mut(&source)
            .ok_or(LoaderError::UnsupportedBootSource(source.id()))
    }
}
