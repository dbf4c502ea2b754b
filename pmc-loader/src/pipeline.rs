//! Container load pipeline.
//!
//! [`BootContext`] owns every collaborator the pipeline touches; there
//! is no ambient state, so independent contexts can load containers
//! side by side in tests. One [`BootInstance`] tracks a single
//! container from `pdi_init` through handoff; secondary boots and
//! deferred starts run on fresh instances.

use alloc::boxed::Box;
use alloc::vec::Vec;
use arrayvec::ArrayVec;

use pmc_power::{Capabilities, PowerTree, Requester, SubsystemPower, DEFAULT_QOS};

use crate::device::{DeviceRegistry, InitRequest};
use crate::error::{LoaderError, Result};
use crate::handoff::{configure_apu, HandoffCpu, HandoffEntry};
use crate::header::MetaHeader;
use crate::idcode::id_code_check;
use crate::platform::{
    PlatformRegs, DDR_STAGING_BASE, IMAGE_SEARCH_STRIDE, PDI_LOAD_COMPLETE, PDI_LOAD_STARTED,
};
use crate::secure::{SecureGate, SecurePolicy};
use crate::source::{self, map_secondary, BootSource, SbdSelector, SecondaryBoot};

/// Image id selecting sequential wildcard loading
pub const WILDCARD_IMAGE_ID: u32 = 0xFFFF_FFFF;

/// Capacity of the subsystem table
pub const MAX_SUBSYSTEMS: usize = 16;

/// Capacity of the per-instance pending handoff list
pub const MAX_HANDOFFS: usize = 8;

/// Container flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdiKind {
    /// Boot container; image and partition 0 belong to the boot
    /// firmware itself, loading starts at index 1
    Full,
    /// Runtime container; loading starts at index 0
    Partial,
}

/// Role of this die in a multi-die device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlrRole {
    /// Single-die device
    Monolithic,
    /// Primary die of a stacked device
    Master,
    /// Secondary die; boot interfaces belong to the master
    Slave,
}

/// One container load in progress.
#[derive(Clone)]
pub struct BootInstance {
    pub raw_source: u32,
    pub source: BootSource,
    pub address: u64,
    pub kind: PdiKind,
    pub slr_role: SlrRole,
    image_index: u32,
    partition_index: u32,
    pub meta: Option<MetaHeader>,
    handoffs: ArrayVec<HandoffEntry, MAX_HANDOFFS>,
}

impl BootInstance {
    /// Create an instance; source and address are bound by `pdi_init`
    pub fn new(kind: PdiKind, slr_role: SlrRole) -> Self {
        Self {
            raw_source: 0,
            source: BootSource::Jtag,
            address: 0,
            kind,
            slr_role,
            image_index: 0,
            partition_index: 0,
            meta: None,
            handoffs: ArrayVec::new(),
        }
    }

    /// Next image to load
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Next partition header index
    pub fn partition_index(&self) -> u32 {
        self.partition_index
    }

    /// Handoffs recorded by partition loads and not yet started
    pub fn pending_handoffs(&self) -> &[HandoffEntry] {
        &self.handoffs
    }

    fn add_handoff(&mut self, entry: HandoffEntry) -> Result<()> {
        self.handoffs
            .try_push(entry)
            .map_err(|_| LoaderError::TooManyHandoffs)
    }
}

/// One image recorded for later id-based lookup
#[derive(Debug, Clone, Copy)]
pub struct SubsystemEntry {
    pub image_id: u32,
    pub image_index: u32,
    pub partition_index: u32,
}

/// Images loaded from the boot container, in load order.
///
/// Append-only; once the table is full further loads run normally but
/// are no longer recorded.
#[derive(Default)]
pub struct SubsystemTable {
    entries: ArrayVec<SubsystemEntry, MAX_SUBSYSTEMS>,
}

impl SubsystemTable {
    /// Record a loaded image, silently dropping the record when full
    pub fn record(&mut self, entry: SubsystemEntry) {
        if self.entries.try_push(entry).is_err() {
            log::debug!("subsystem table full, image {} not recorded", entry.image_id);
        }
    }

    /// Look an image up by id
    pub fn find(&self, image_id: u32) -> Option<&SubsystemEntry> {
        self.entries.iter().find(|e| e.image_id == image_id)
    }

    /// Recorded entries in load order
    pub fn entries(&self) -> &[SubsystemEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One delay-load image staged to working memory
#[derive(Debug, Clone, Copy)]
pub struct DeferredImage {
    pub image_id: u32,
    pub staging_address: u64,
    pub partition_index: u32,
    pub partition_count: u32,
}

/// Owner of the load pipeline and all of its collaborators.
pub struct BootContext {
    registry: DeviceRegistry,
    power: PowerTree,
    platform: Box<dyn PlatformRegs>,
    pm: Box<dyn SubsystemPower>,
    secure: Box<dyn SecureGate>,
    subsystems: SubsystemTable,
    deferred: Vec<DeferredImage>,
    active: Option<BootInstance>,
}

impl BootContext {
    pub fn new(
        registry: DeviceRegistry,
        power: PowerTree,
        platform: Box<dyn PlatformRegs>,
        pm: Box<dyn SubsystemPower>,
        secure: Box<dyn SecureGate>,
    ) -> Self {
        Self {
            registry,
            power,
            platform,
            pm,
            secure,
            subsystems: SubsystemTable::default(),
            deferred: Vec::new(),
            active: None,
        }
    }

    /// The power tree driven by partition loads
    pub fn power(&self) -> &PowerTree {
        &self.power
    }

    /// Images recorded during the full boot
    pub fn subsystems(&self) -> &SubsystemTable {
        &self.subsystems
    }

    /// Staged delay-load images
    pub fn deferred(&self) -> &[DeferredImage] {
        &self.deferred
    }

    /// Instance registered by the completed full boot
    pub fn active(&self) -> Option<&BootInstance> {
        self.active.as_ref()
    }

    /// Bind an instance to a source and validate the header chain.
    ///
    /// Secure containers route table authentication and header reads
    /// through the gate; plain containers never touch it.
    pub fn pdi_init(&mut self, inst: &mut BootInstance, raw: u32, address: u64) -> Result<()> {
        self.platform.write_boot_status(PDI_LOAD_STARTED);
        let source = BootSource::from_raw(raw)?;
        inst.raw_source = raw;
        inst.source = source;
        inst.address = address;
        log::info!("loading container from {} at {:#x}", source.name(), address);

        if matches!(inst.slr_role, SlrRole::Master | SlrRole::Monolithic) {
            let request = InitRequest {
                source,
                address_override: source::address_override(raw),
            };
            self.registry.lookup_mut(source)?.ops_mut().init(&request)?;
        } else if !self.registry.contains(source) {
            return Err(LoaderError::UnsupportedBootSource(source.id()));
        }

        let flash_offset = match inst.kind {
            PdiKind::Full => {
                inst.image_index = 1;
                inst.partition_index = 1;
                if source.honors_multiboot() {
                    address + u64::from(self.platform.multiboot()) * IMAGE_SEARCH_STRIDE
                } else {
                    address
                }
            }
            PdiKind::Partial => {
                inst.image_index = 0;
                inst.partition_index = 0;
                address
            }
        };

        let mut meta = {
            let device = self.registry.lookup_mut(source)?.ops_mut();
            MetaHeader::read_table(device, flash_offset)?
        };

        // Policy comes from the attribute bits alone; no other field is
        // trusted until the table authenticates and validates.
        let policy = SecurePolicy::from_attributes(meta.table.flags());
        if policy.secure() {
            self.secure.validate_policy(&policy)?;
            self.secure.authenticate_header_table(&meta.raw_table)?;
        }
        meta.validate_table()?;
        id_code_check(&meta.table, self.platform.as_ref())?;

        if policy.secure() {
            let device = self.registry.lookup_mut(source)?.ops_mut();
            self.secure.read_and_verify_headers(device, &mut meta)?;
        } else {
            let device = self.registry.lookup_mut(source)?.ops_mut();
            meta.read_image_headers(device)?;
            meta.read_partition_headers(device)?;
        }

        inst.meta = Some(meta);
        Ok(())
    }

    /// Full load flow: init, load and start every image, follow the
    /// secondary boot chain.
    ///
    /// A failure on a streaming source resets the interface so the
    /// host can push a corrected container.
    pub fn load_pdi(&mut self, inst: &mut BootInstance, raw: u32, address: u64) -> Result<()> {
        let status = match self.pdi_init(inst, raw, address) {
            Ok(()) => self.load_and_start(inst),
            Err(err) => Err(err),
        };
        if let Err(err) = status {
            log::error!("container load failed: {}", err);
            if let Ok(source) = BootSource::from_raw(raw) {
                if source.is_streaming() {
                    if let Ok(entry) = self.registry.lookup_mut(source) {
                        log::warn!("resetting streaming interface {}", source.name());
                        entry.ops_mut().reset();
                    }
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Load and start every remaining image, then handle the secondary
    /// boot device.
    pub fn load_and_start(&mut self, inst: &mut BootInstance) -> Result<()> {
        let image_count = inst
            .meta
            .as_ref()
            .ok_or(LoaderError::HeaderTable)?
            .table
            .image_count;

        while inst.image_index < image_count {
            let index = inst.image_index;
            let start = self.platform.timestamp_ms();
            self.load_image(inst, WILDCARD_IMAGE_ID)?;
            self.start_image(inst)?;
            let elapsed = self.platform.timestamp_ms().saturating_sub(start);
            log::info!("image {} ready in {} ms", index, elapsed);
        }

        if inst.kind == PdiKind::Full {
            self.active = Some(inst.clone());
        }

        let (selector, sbd_address) = {
            let table = &inst.meta.as_ref().ok_or(LoaderError::HeaderTable)?.table;
            (table.secondary_boot_device(), table.sbd_address())
        };
        // Secondary boot belongs to the die owning the boot interfaces.
        if selector != SbdSelector::Same
            && matches!(inst.slr_role, SlrRole::Master | SlrRole::Monolithic)
        {
            match map_secondary(selector, sbd_address)? {
                SecondaryBoot::None => {}
                SecondaryBoot::Rearm => {
                    let request = InitRequest {
                        source: BootSource::Sbi,
                        address_override: None,
                    };
                    self.registry
                        .lookup_mut(BootSource::Sbi)?
                        .ops_mut()
                        .init(&request)?;
                }
                SecondaryBoot::Chain {
                    raw_source,
                    address,
                } => {
                    log::info!("chaining secondary container, boot word {:#x}", raw_source);
                    let mut secondary = BootInstance::new(PdiKind::Partial, SlrRole::Monolithic);
                    self.load_pdi(&mut secondary, raw_source, address)?;
                }
            }
        }

        self.platform.write_boot_status(PDI_LOAD_COMPLETE);
        Ok(())
    }

    /// Load one image: the next one sequentially for
    /// [`WILDCARD_IMAGE_ID`], or by id through the subsystem table.
    pub fn load_image(&mut self, inst: &mut BootInstance, image_id: u32) -> Result<()> {
        let (index, partition_index) = if image_id == WILDCARD_IMAGE_ID {
            (inst.image_index as usize, inst.partition_index)
        } else {
            let entry = *self
                .subsystems
                .find(image_id)
                .ok_or(LoaderError::ImageIdNotFound(image_id))?;
            (entry.image_index as usize, entry.partition_index)
        };
        let header = *inst
            .meta
            .as_ref()
            .ok_or(LoaderError::HeaderTable)?
            .images
            .get(index)
            .ok_or(LoaderError::ImageHeader)?;
        inst.partition_index = partition_index;
        log::info!("loading image {:#x} ({})", header.image_id, header.name());

        if image_id == WILDCARD_IMAGE_ID && inst.kind == PdiKind::Full {
            self.subsystems.record(SubsystemEntry {
                image_id: header.image_id,
                image_index: index as u32,
                partition_index,
            });
        }

        if header.delay_load() {
            self.stage_image(inst, index)?;
        } else {
            self.load_partitions(inst, index)?;
        }

        // Index advance is unconditional; staged partitions still
        // occupy their header slots.
        inst.image_index = index as u32 + 1;
        inst.partition_index = partition_index + header.partition_count;
        Ok(())
    }

    fn load_partitions(&mut self, inst: &mut BootInstance, image_index: usize) -> Result<()> {
        let (count, flash_offset, start) = {
            let meta = inst.meta.as_ref().ok_or(LoaderError::HeaderTable)?;
            let header = meta.images.get(image_index).ok_or(LoaderError::ImageHeader)?;
            (header.partition_count, meta.flash_offset, inst.partition_index)
        };
        let source = inst.source;

        for offset in 0..count {
            let partition = {
                let meta = inst.meta.as_ref().ok_or(LoaderError::HeaderTable)?;
                *meta
                    .partitions
                    .get((start + offset) as usize)
                    .ok_or(LoaderError::PartitionHeader)?
            };
            let cpu = HandoffCpu::from_field(partition.dest_cpu_field());

            // The destination island must be up before bytes land in it.
            if let Some(cpu) = cpu {
                self.power.request_power_up(cpu.power_domain())?;
            }

            let device = self.registry.lookup_mut(source)?.ops_mut();
            device.copy(
                flash_offset + u64::from(partition.data_offset),
                partition.dest_address(),
                partition.total_len,
            )?;

            if let Some(cpu) = cpu {
                inst.add_handoff(HandoffEntry::from_partition(cpu, &partition))?;
            }
        }
        Ok(())
    }

    fn stage_image(&mut self, inst: &mut BootInstance, image_index: usize) -> Result<()> {
        let (image_id, count, flash_offset, start) = {
            let meta = inst.meta.as_ref().ok_or(LoaderError::HeaderTable)?;
            let header = meta.images.get(image_index).ok_or(LoaderError::ImageHeader)?;
            (
                header.image_id,
                header.partition_count,
                meta.flash_offset,
                inst.partition_index,
            )
        };
        let source = inst.source;
        log::info!("staging image {:#x} for deferred start", image_id);

        for offset in 0..count {
            let partition = {
                let meta = inst.meta.as_ref().ok_or(LoaderError::HeaderTable)?;
                *meta
                    .partitions
                    .get((start + offset) as usize)
                    .ok_or(LoaderError::PartitionHeader)?
            };
            let device = self.registry.lookup_mut(source)?.ops_mut();
            device.copy(
                flash_offset + u64::from(partition.data_offset),
                DDR_STAGING_BASE + u64::from(partition.data_offset),
                partition.total_len,
            )?;
        }

        self.deferred.push(DeferredImage {
            image_id,
            staging_address: DDR_STAGING_BASE,
            partition_index: start,
            partition_count: count,
        });
        if let Some(meta) = inst.meta.as_mut() {
            if let Some(header) = meta.images.get_mut(image_index) {
                header.clear_delay_load();
            }
        }
        Ok(())
    }

    /// Hand the loaded cores off: configure application cores, then
    /// wake each pending core through the power firmware.
    ///
    /// A denied wake-up stops the walk; already-woken cores keep
    /// running and the remaining descriptors stay pending.
    pub fn start_image(&mut self, inst: &mut BootInstance) -> Result<()> {
        for index in 0..inst.handoffs.len() {
            let entry = inst.handoffs[index];
            if entry.cpu.supports_exec_state() {
                configure_apu(
                    self.platform.as_mut(),
                    entry.cpu,
                    entry.exec_state,
                    entry.vector_high,
                );
            }
            // The services processor wakes at its fixed vector.
            let (set_address, address) = if entry.cpu == HandoffCpu::Psm {
                (false, 0)
            } else {
                (true, entry.address)
            };
            log::info!("waking {} at {:#x}", entry.cpu.name(), address);
            self.pm
                .request_wake_up(Requester::Pmc, entry.cpu.device(), set_address, address, false)
                .map_err(|_| LoaderError::WakeUpFailed(entry.cpu))?;
        }
        inst.handoffs.clear();
        Ok(())
    }

    /// Start a previously staged delay-load image from working memory.
    pub fn start_deferred_image(&mut self, image_id: u32) -> Result<()> {
        let record = *self
            .deferred
            .iter()
            .find(|d| d.image_id == image_id)
            .ok_or(LoaderError::DeferredImageNotFound(image_id))?;
        let mut inst = self.active.clone().ok_or(LoaderError::NoActiveSubsystem)?;
        inst.kind = PdiKind::Partial;
        inst.raw_source = BootSource::Ddr.id();
        inst.source = BootSource::Ddr;
        inst.handoffs.clear();

        let image_index = {
            let meta = inst.meta.as_mut().ok_or(LoaderError::HeaderTable)?;
            meta.flash_offset = record.staging_address;
            meta.images
                .iter()
                .position(|h| h.image_id == image_id)
                .ok_or(LoaderError::ImageIdNotFound(image_id))?
        };
        inst.partition_index = record.partition_index;

        // The staging area is read through the regular device path, so
        // its handler gets a fresh init like any other boot source.
        let request = InitRequest {
            source: BootSource::Ddr,
            address_override: None,
        };
        self.registry
            .lookup_mut(BootSource::Ddr)?
            .ops_mut()
            .init(&request)?;

        log::info!("starting deferred image {:#x}", image_id);
        self.load_partitions(&mut inst, image_index)?;
        self.start_image(&mut inst)
    }

    fn reload(&mut self, image_id: u32) -> Result<BootInstance> {
        let mut inst = self.active.clone().ok_or(LoaderError::NoActiveSubsystem)?;
        inst.handoffs.clear();
        let source = inst.source;

        let device = source::device_for_source(source);
        if let Some(device) = device {
            self.pm
                .request_device(Requester::Pmc, device, Capabilities::ACCESS, DEFAULT_QOS, false)
                .map_err(|_| LoaderError::DeviceAccess(device))?;
        }

        let request = InitRequest {
            source,
            address_override: source::address_override(inst.raw_source),
        };
        let init_result = self.registry.lookup_mut(source)?.ops_mut().init(&request);
        let load_result = match init_result {
            Ok(()) => self.load_image(&mut inst, image_id),
            Err(err) => Err(err),
        };

        // The peripheral is released even when the load failed; a
        // failed init never acquired it in a usable state.
        if init_result.is_ok() {
            if let Some(device) = device {
                if let Err(err) = self.pm.release_device(Requester::Pmc, device) {
                    log::warn!("release of {} failed: {}", device.name(), err);
                }
            }
        }

        load_result?;
        Ok(inst)
    }

    /// Reload an image of the active subsystem from the boot source.
    pub fn reload_image(&mut self, image_id: u32) -> Result<()> {
        self.reload(image_id).map(|_| ())
    }

    /// Reload an image and hand its cores off again.
    pub fn restart_image(&mut self, image_id: u32) -> Result<()> {
        let mut inst = self.reload(image_id)?;
        self.start_image(&mut inst)
    }
}
