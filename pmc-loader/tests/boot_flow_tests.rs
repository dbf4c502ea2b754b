//! End-to-end boot flow tests against software models of the boot
//! interfaces, platform registers, power firmware and secure gate.

use std::boxed::Box;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use pmc_loader::header::IMAGE_ATTR_DELAY_LOAD;
use pmc_loader::{
    BootContext, BootDeviceOps, BootInstance, BootSource, DeviceRegistry, HandoffCpu,
    ImageHeader, ImageHeaderTable, InitRequest, LoaderError, MetaHeader, PartitionHeader,
    PdiKind, PlatformRegs, SecureGate, SecurePolicy, SlrRole, DDR_STAGING_BASE, IHT_SIZE,
    IMAGE_HEADER_SIZE, IMAGE_SEARCH_STRIDE, PARTITION_HEADER_SIZE,
};
use pmc_power::{
    domain_id, Capabilities, DeviceId, PowerError, PowerState, PowerTree, Requester,
    SimulatedController, SubsystemPower,
};

const BOOT_IMAGE_ID: u32 = 0x1;
const APP_IMAGE_ID: u32 = 0x1C00_0001;

// Attribute word values, mirrored from the wire format constants.
const CPU_NONE: u32 = 0x0;
const CPU_ACPU0: u32 = 0x1;
const CPU_ACPU1: u32 = 0x2;
const CPU_RPU0: u32 = 0x3;

#[derive(Default)]
struct BusState {
    flash: HashMap<u32, Vec<u8>>,
    ram: HashMap<u64, u8>,
    inits: Vec<(u32, Option<u64>)>,
    resets: Vec<u32>,
    copies: Vec<(u32, u64, u64, u32)>,
}

struct TestDevice {
    source: BootSource,
    bus: Rc<RefCell<BusState>>,
}

impl TestDevice {
    fn fetch(&self, src_offset: u64, len: usize) -> Vec<u8> {
        let bus = self.bus.borrow();
        let mut bytes = vec![0u8; len];
        if self.source == BootSource::Ddr {
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = *bus.ram.get(&(src_offset + i as u64)).unwrap_or(&0);
            }
        } else {
            let data = bus
                .flash
                .get(&self.source.id())
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            for (i, b) in bytes.iter_mut().enumerate() {
                let offset = src_offset as usize + i;
                if offset < data.len() {
                    *b = data[offset];
                }
            }
        }
        bytes
    }
}

impl BootDeviceOps for TestDevice {
    fn init(&mut self, request: &InitRequest) -> pmc_loader::Result<()> {
        self.bus
            .borrow_mut()
            .inits
            .push((request.source.id(), request.address_override));
        Ok(())
    }

    fn copy(&mut self, src_offset: u64, dest_address: u64, len: u32) -> pmc_loader::Result<()> {
        let bytes = self.fetch(src_offset, len as usize);
        let mut bus = self.bus.borrow_mut();
        for (i, b) in bytes.iter().enumerate() {
            bus.ram.insert(dest_address + i as u64, *b);
        }
        bus.copies
            .push((self.source.id(), src_offset, dest_address, len));
        Ok(())
    }

    fn read(&mut self, src_offset: u64, buf: &mut [u8]) -> pmc_loader::Result<()> {
        let bytes = self.fetch(src_offset, buf.len());
        buf.copy_from_slice(&bytes);
        Ok(())
    }

    fn reset(&mut self) {
        self.bus.borrow_mut().resets.push(self.source.id());
    }
}

struct PlatformState {
    multiboot: u32,
    idcode: u32,
    ext_idcode: u32,
    silicon: bool,
    statuses: Vec<u32>,
    apu_config: u32,
    time: u64,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            multiboot: 0,
            idcode: 0,
            ext_idcode: 0,
            silicon: false,
            statuses: Vec::new(),
            apu_config: 0,
            time: 0,
        }
    }
}

struct TestPlatform {
    state: Rc<RefCell<PlatformState>>,
}

impl PlatformRegs for TestPlatform {
    fn multiboot(&self) -> u32 {
        self.state.borrow().multiboot
    }
    fn idcode(&self) -> u32 {
        self.state.borrow().idcode
    }
    fn ext_idcode(&self) -> u32 {
        self.state.borrow().ext_idcode
    }
    fn is_silicon(&self) -> bool {
        self.state.borrow().silicon
    }
    fn write_boot_status(&mut self, status: u32) {
        self.state.borrow_mut().statuses.push(status);
    }
    fn apu_config(&self) -> u32 {
        self.state.borrow().apu_config
    }
    fn set_apu_config(&mut self, value: u32) {
        self.state.borrow_mut().apu_config = value;
    }
    fn timestamp_ms(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.time += 1;
        state.time
    }
}

#[derive(Default)]
struct PmState {
    wakeups: Vec<(DeviceId, bool, u64)>,
    requests: Vec<DeviceId>,
    releases: Vec<DeviceId>,
    fail_wakeup: Option<DeviceId>,
}

struct TestPm {
    state: Rc<RefCell<PmState>>,
}

impl SubsystemPower for TestPm {
    fn request_wake_up(
        &mut self,
        _requester: Requester,
        device: DeviceId,
        set_address: bool,
        address: u64,
        _ack: bool,
    ) -> pmc_power::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_wakeup == Some(device) {
            return Err(PowerError::RequestDenied(device));
        }
        state.wakeups.push((device, set_address, address));
        Ok(())
    }

    fn request_device(
        &mut self,
        _requester: Requester,
        device: DeviceId,
        _capabilities: Capabilities,
        _qos: u32,
        _ack: bool,
    ) -> pmc_power::Result<()> {
        self.state.borrow_mut().requests.push(device);
        Ok(())
    }

    fn release_device(&mut self, _requester: Requester, device: DeviceId) -> pmc_power::Result<()> {
        self.state.borrow_mut().releases.push(device);
        Ok(())
    }
}

/// Records every call and rejects it; a non-secure boot must never
/// reach the gate.
#[derive(Default)]
struct GateState {
    calls: u32,
}

struct SpyGate {
    state: Rc<RefCell<GateState>>,
}

impl SecureGate for SpyGate {
    fn validate_policy(&mut self, _policy: &SecurePolicy) -> pmc_loader::Result<()> {
        self.state.borrow_mut().calls += 1;
        Err(LoaderError::SecureValidation)
    }
    fn authenticate_header_table(&mut self, _raw: &[u8; IHT_SIZE]) -> pmc_loader::Result<()> {
        self.state.borrow_mut().calls += 1;
        Err(LoaderError::SecureValidation)
    }
    fn read_and_verify_headers(
        &mut self,
        _device: &mut dyn BootDeviceOps,
        _meta: &mut MetaHeader,
    ) -> pmc_loader::Result<()> {
        self.state.borrow_mut().calls += 1;
        Err(LoaderError::SecureValidation)
    }
}

struct Fixture {
    bus: Rc<RefCell<BusState>>,
    platform: Rc<RefCell<PlatformState>>,
    pm: Rc<RefCell<PmState>>,
    gate: Rc<RefCell<GateState>>,
    ctx: BootContext,
}

fn fixture() -> Fixture {
    let bus = Rc::new(RefCell::new(BusState::default()));
    let platform = Rc::new(RefCell::new(PlatformState::default()));
    let pm = Rc::new(RefCell::new(PmState::default()));
    let gate = Rc::new(RefCell::new(GateState::default()));

    let mut registry = DeviceRegistry::new();
    for source in [
        BootSource::Jtag,
        BootSource::Qspi24,
        BootSource::Qspi32,
        BootSource::Sd0,
        BootSource::Sd1,
        BootSource::Emmc,
        BootSource::Ospi,
        BootSource::Sd1Ls,
        BootSource::Ddr,
        BootSource::Sbi,
    ] {
        registry.register(
            source,
            source.name(),
            Box::new(TestDevice {
                source,
                bus: Rc::clone(&bus),
            }),
        );
    }

    let mut power = PowerTree::new(Box::new(SimulatedController::new(1)));
    power.init_domain(domain_id::PMC, 0xF110_0000, None).unwrap();
    power
        .init_domain(domain_id::LPD, 0xF111_0000, Some(domain_id::PMC))
        .unwrap();
    power
        .init_domain(domain_id::FPD, 0xF112_0000, Some(domain_id::PMC))
        .unwrap();
    power
        .init_domain(domain_id::ACPU0, 0xF113_0000, Some(domain_id::FPD))
        .unwrap();
    power
        .init_domain(domain_id::ACPU1, 0xF114_0000, Some(domain_id::FPD))
        .unwrap();
    power
        .init_domain(domain_id::RPU, 0xF115_0000, Some(domain_id::LPD))
        .unwrap();

    let ctx = BootContext::new(
        registry,
        power,
        Box::new(TestPlatform {
            state: Rc::clone(&platform),
        }),
        Box::new(TestPm {
            state: Rc::clone(&pm),
        }),
        Box::new(SpyGate {
            state: Rc::clone(&gate),
        }),
    );

    Fixture {
        bus,
        platform,
        pm,
        gate,
        ctx,
    }
}

struct PartSpec {
    cpu_field: u32,
    dest: u64,
    handoff: u64,
    payload: Vec<u8>,
}

struct ImageSpec {
    id: u32,
    name: &'static str,
    delay_load: bool,
    partitions: Vec<PartSpec>,
}

fn boot_image() -> ImageSpec {
    ImageSpec {
        id: BOOT_IMAGE_ID,
        name: "boot",
        delay_load: false,
        partitions: vec![PartSpec {
            cpu_field: CPU_NONE,
            dest: 0xF020_0000,
            handoff: 0,
            payload: vec![0xB0; 16],
        }],
    }
}

fn app_image(id: u32, cpu_field: u32, dest: u64) -> ImageSpec {
    ImageSpec {
        id,
        name: "app",
        delay_load: false,
        partitions: vec![PartSpec {
            cpu_field,
            dest,
            handoff: dest,
            payload: vec![0xA5; 32],
        }],
    }
}

fn build_pdi(images: &[ImageSpec], tweak: impl FnOnce(&mut ImageHeaderTable)) -> Vec<u8> {
    let image_count = images.len() as u32;
    let partition_count: u32 = images.iter().map(|i| i.partitions.len() as u32).sum();
    let ih_offset = IHT_SIZE as u32;
    let ph_offset = ih_offset + image_count * IMAGE_HEADER_SIZE as u32;
    let data_base = ph_offset + partition_count * PARTITION_HEADER_SIZE as u32;

    let mut table = ImageHeaderTable::new(image_count, ih_offset, partition_count, ph_offset);
    tweak(&mut table);

    let mut out = table.encode().to_vec();
    for image in images {
        let mut name = [0u8; 16];
        name[..image.name.len()].copy_from_slice(image.name.as_bytes());
        let header = ImageHeader {
            image_id: image.id,
            name,
            partition_count: image.partitions.len() as u32,
            attributes: if image.delay_load {
                IMAGE_ATTR_DELAY_LOAD
            } else {
                0
            },
        };
        out.extend_from_slice(&header.encode());
    }

    let mut data_offset = data_base;
    let mut payloads = Vec::new();
    for image in images {
        for part in &image.partitions {
            let mut header = PartitionHeader::new(
                part.payload.len() as u32,
                data_offset,
                part.dest,
                part.handoff,
            );
            header.attributes = part.cpu_field;
            out.extend_from_slice(&header.encode());
            payloads.push((part.payload.clone(), data_offset));
            data_offset += part.payload.len() as u32;
        }
    }
    for (payload, _) in &payloads {
        out.extend_from_slice(payload);
    }
    out
}

fn ram_bytes(bus: &Rc<RefCell<BusState>>, base: u64, len: usize) -> Vec<u8> {
    let bus = bus.borrow();
    (0..len)
        .map(|i| *bus.ram.get(&(base + i as u64)).unwrap_or(&0))
        .collect()
}

#[test]
fn test_qspi24_full_boot_without_gate() {
    let mut f = fixture();
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();

    // Gate untouched on a plain container.
    assert_eq!(f.gate.borrow().calls, 0);

    // ACPU0 woken at its handoff address, its island powered up.
    assert_eq!(
        f.pm.borrow().wakeups,
        vec![(DeviceId::Acpu0, true, 0x10_0000)]
    );
    assert_eq!(
        f.ctx.power().state(domain_id::ACPU0).unwrap(),
        PowerState::On
    );
    assert_eq!(f.ctx.power().use_count(domain_id::FPD).unwrap(), 1);

    // Payload landed at the partition destination.
    assert_eq!(ram_bytes(&f.bus, 0x10_0000, 4), vec![0xA5; 4]);

    // Boot status brackets the load.
    let statuses = f.platform.borrow().statuses.clone();
    assert_eq!(statuses.first(), Some(&0x1));
    assert_eq!(statuses.last(), Some(&0xF));

    // The app image is recorded for id-based lookup.
    assert_eq!(f.ctx.subsystems().len(), 1);
    assert!(f.ctx.subsystems().find(APP_IMAGE_ID).is_some());
    assert!(f.ctx.active().is_some());
}

#[test]
fn test_multiboot_offset_selects_image_slot() {
    let mut f = fixture();
    f.platform.borrow_mut().multiboot = 2;
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    let slot = (2 * IMAGE_SEARCH_STRIDE) as usize;
    let mut flash = vec![0u8; slot];
    flash.extend_from_slice(&pdi);
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), flash);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();

    // Every copy reads relative to the multiboot slot.
    let copies = f.bus.borrow().copies.clone();
    assert!(copies.iter().all(|(_, src, _, _)| *src >= slot as u64));
}

#[test]
fn test_multiboot_does_not_shift_sd_boot() {
    // SD boots go through a filesystem; the container sits at the
    // given address no matter the multiboot count.
    let mut f = fixture();
    f.platform.borrow_mut().multiboot = 2;
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    f.bus.borrow_mut().flash.insert(BootSource::Sd0.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx.load_pdi(&mut inst, BootSource::Sd0.id(), 0).unwrap();

    let copies = f.bus.borrow().copies.clone();
    assert!(copies
        .iter()
        .all(|(_, src, _, _)| *src < IMAGE_SEARCH_STRIDE));
    assert_eq!(ram_bytes(&f.bus, 0x10_0000, 4), vec![0xA5; 4]);
}

#[test]
fn test_sd0_with_sd1_secondary_boot() {
    let mut f = fixture();
    let primary = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |table| {
            // SBD field 0x4 selects SD1.
            table.attributes |= 0x4 << 6;
            table.set_sbd_address(0x20);
        },
    );
    let secondary = build_pdi(&[app_image(0x1C00_0002, CPU_ACPU1, 0x20_0000)], |_| {});
    {
        let mut bus = f.bus.borrow_mut();
        bus.flash.insert(BootSource::Sd0.id(), primary);
        bus.flash.insert(BootSource::Sd1.id(), secondary);
    }

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx.load_pdi(&mut inst, BootSource::Sd0.id(), 0).unwrap();

    // SD1 was initialized with the packed offset and loaded from
    // address zero.
    let inits = f.bus.borrow().inits.clone();
    assert!(inits.contains(&(BootSource::Sd1.id(), Some(0x20))));

    // Both app cores woken.
    let wakeups = f.pm.borrow().wakeups.clone();
    assert_eq!(wakeups.len(), 2);
    assert_eq!(wakeups[1], (DeviceId::Acpu1, true, 0x20_0000));
    assert_eq!(ram_bytes(&f.bus, 0x20_0000, 4), vec![0xA5; 4]);
}

#[test]
fn test_delay_load_staged_then_started() {
    let mut f = fixture();
    let mut deferred = app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000);
    deferred.delay_load = true;
    let pdi = build_pdi(&[boot_image(), deferred], |_| {});
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();

    // Staged, not started: no wake-up yet, payload in working memory,
    // nothing at the real destination.
    assert!(f.pm.borrow().wakeups.is_empty());
    assert_eq!(f.ctx.deferred().len(), 1);
    assert_eq!(f.ctx.deferred()[0].partition_index, 1);
    assert_eq!(ram_bytes(&f.bus, 0x10_0000, 4), vec![0; 4]);

    let inits_before = f.bus.borrow().inits.len();
    f.ctx.start_deferred_image(APP_IMAGE_ID).unwrap();

    // The staging device got a fresh init for the deferred start.
    let inits = f.bus.borrow().inits.clone();
    assert_eq!(inits.len(), inits_before + 1);
    assert_eq!(inits.last(), Some(&(BootSource::Ddr.id(), None)));

    // Copied from staging to the destination, core woken.
    assert_eq!(ram_bytes(&f.bus, 0x10_0000, 4), vec![0xA5; 4]);
    assert_eq!(
        f.pm.borrow().wakeups,
        vec![(DeviceId::Acpu0, true, 0x10_0000)]
    );
    let copies = f.bus.borrow().copies.clone();
    assert!(copies
        .iter()
        .any(|(src, from, _, _)| *src == BootSource::Ddr.id() && *from >= DDR_STAGING_BASE));
}

#[test]
fn test_deferred_miss_has_no_side_effects() {
    let mut f = fixture();
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();
    let wakeups_before = f.pm.borrow().wakeups.len();
    let copies_before = f.bus.borrow().copies.len();

    assert_eq!(
        f.ctx.start_deferred_image(0xDEAD_BEEF),
        Err(LoaderError::DeferredImageNotFound(0xDEAD_BEEF))
    );
    assert_eq!(f.pm.borrow().wakeups.len(), wakeups_before);
    assert_eq!(f.bus.borrow().copies.len(), copies_before);
}

#[test]
fn test_idcode_mismatch_aborts_load() {
    let mut f = fixture();
    {
        let mut platform = f.platform.borrow_mut();
        platform.silicon = true;
        platform.idcode = 0x24CA_8093;
        platform.ext_idcode = 0x21;
    }
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |table| {
            table.idcode = 0x1111_1111;
            table.ext_idcode = 0x21;
        },
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert_eq!(
        f.ctx.load_pdi(&mut inst, BootSource::Qspi24.id(), 0),
        Err(LoaderError::IdCodeMismatch)
    );
    // No partition copy and no completion sentinel.
    assert!(f.bus.borrow().copies.is_empty());
    let statuses = f.platform.borrow().statuses.clone();
    assert!(!statuses.contains(&0xF));
}

#[test]
fn test_idcode_match_passes_on_silicon() {
    let mut f = fixture();
    {
        let mut platform = f.platform.borrow_mut();
        platform.silicon = true;
        platform.idcode = 0x24CA_8093;
        platform.ext_idcode = 0x21;
    }
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |table| {
            table.idcode = 0x24CA_8093;
            table.ext_idcode = 0x21;
        },
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();
}

#[test]
fn test_unsupported_source_rejected() {
    let mut f = fixture();
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert_eq!(
        f.ctx.load_pdi(&mut inst, 0x4, 0),
        Err(LoaderError::UnsupportedBootSource(0x4))
    );
}

#[test]
fn test_streaming_interface_reset_on_failure() {
    let mut f = fixture();
    // No container pushed: the interface reads zeros and the header
    // table fails validation.
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert_eq!(
        f.ctx.load_pdi(&mut inst, BootSource::Sbi.id(), 0),
        Err(LoaderError::HeaderTable)
    );
    assert_eq!(f.bus.borrow().resets, vec![BootSource::Sbi.id()]);

    // The same failure on a flash source leaves the interface alone.
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert!(f.ctx.load_pdi(&mut inst, BootSource::Qspi24.id(), 0).is_err());
    assert_eq!(f.bus.borrow().resets.len(), 1);
}

#[test]
fn test_wakeup_failure_stops_handoffs() {
    let mut f = fixture();
    f.pm.borrow_mut().fail_wakeup = Some(DeviceId::Acpu1);
    let mut multi = app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000);
    multi.partitions.push(PartSpec {
        cpu_field: CPU_ACPU1,
        dest: 0x20_0000,
        handoff: 0x20_0000,
        payload: vec![0xA6; 16],
    });
    multi.partitions.push(PartSpec {
        cpu_field: CPU_RPU0,
        dest: 0x30_0000,
        handoff: 0x30_0000,
        payload: vec![0xA7; 16],
    });
    let pdi = build_pdi(&[boot_image(), multi], |_| {});
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert_eq!(
        f.ctx.load_pdi(&mut inst, BootSource::Qspi24.id(), 0),
        Err(LoaderError::WakeUpFailed(HandoffCpu::Acpu1))
    );

    // ACPU0 was woken before the failure; RPU0 never attempted.
    let wakeups = f.pm.borrow().wakeups.clone();
    assert_eq!(wakeups.len(), 1);
    assert_eq!(wakeups[0].0, DeviceId::Acpu0);
}

#[test]
fn test_restart_image_reacquires_device() {
    let mut f = fixture();
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();

    f.ctx.restart_image(APP_IMAGE_ID).unwrap();

    let pm = f.pm.borrow();
    assert_eq!(pm.requests, vec![DeviceId::Qspi]);
    assert_eq!(pm.releases, vec![DeviceId::Qspi]);
    assert_eq!(pm.wakeups.len(), 2);
    assert_eq!(pm.wakeups[1], (DeviceId::Acpu0, true, 0x10_0000));
}

#[test]
fn test_reload_unknown_image_fails() {
    let mut f = fixture();
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |_| {},
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);
    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    f.ctx
        .load_pdi(&mut inst, BootSource::Qspi24.id(), 0)
        .unwrap();

    assert_eq!(
        f.ctx.reload_image(0x7777),
        Err(LoaderError::ImageIdNotFound(0x7777))
    );
}

#[test]
fn test_reload_without_active_subsystem() {
    let mut f = fixture();
    assert_eq!(
        f.ctx.reload_image(APP_IMAGE_ID),
        Err(LoaderError::NoActiveSubsystem)
    );
    assert_eq!(
        f.ctx.start_deferred_image(APP_IMAGE_ID),
        Err(LoaderError::DeferredImageNotFound(APP_IMAGE_ID))
    );
}

#[test]
fn test_signed_container_consults_gate() {
    let mut f = fixture();
    let pdi = build_pdi(
        &[boot_image(), app_image(APP_IMAGE_ID, CPU_ACPU0, 0x10_0000)],
        |table| {
            table.attributes |= 0x1; // SIGNED
        },
    );
    f.bus
        .borrow_mut()
        .flash
        .insert(BootSource::Qspi24.id(), pdi);

    let mut inst = BootInstance::new(PdiKind::Full, SlrRole::Monolithic);
    assert_eq!(
        f.ctx.load_pdi(&mut inst, BootSource::Qspi24.id(), 0),
        Err(LoaderError::SecureValidation)
    );
    assert_eq!(f.gate.borrow().calls, 1);
    assert!(f.bus.borrow().copies.is_empty());
}
