//! Core handoff descriptors and application-core configuration.

use pmc_power::{domain_id, DeviceId};

use crate::header::PartitionHeader;
use crate::platform::PlatformRegs;

/// Cores a partition can target for handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffCpu {
    Acpu0,
    Acpu1,
    Rpu0,
    Rpu1,
    /// Both realtime cores in lockstep; runs on core 0's rail
    RpuLockstep,
    /// Platform services processor; wakes at its fixed vector
    Psm,
}

impl HandoffCpu {
    /// Decode the destination-core field of a partition header
    pub fn from_field(value: u32) -> Option<Self> {
        match value {
            0x1 => Some(HandoffCpu::Acpu0),
            0x2 => Some(HandoffCpu::Acpu1),
            0x3 => Some(HandoffCpu::Rpu0),
            0x4 => Some(HandoffCpu::Rpu1),
            0x5 => Some(HandoffCpu::RpuLockstep),
            0x6 => Some(HandoffCpu::Psm),
            _ => None,
        }
    }

    /// Core name for log output
    pub fn name(&self) -> &'static str {
        match self {
            HandoffCpu::Acpu0 => "ACPU0",
            HandoffCpu::Acpu1 => "ACPU1",
            HandoffCpu::Rpu0 => "RPU0",
            HandoffCpu::Rpu1 => "RPU1",
            HandoffCpu::RpuLockstep => "RPU_LOCKSTEP",
            HandoffCpu::Psm => "PSM",
        }
    }

    /// Power-manager device to wake
    pub fn device(&self) -> DeviceId {
        match self {
            HandoffCpu::Acpu0 => DeviceId::Acpu0,
            HandoffCpu::Acpu1 => DeviceId::Acpu1,
            HandoffCpu::Rpu0 | HandoffCpu::RpuLockstep => DeviceId::Rpu0,
            HandoffCpu::Rpu1 => DeviceId::Rpu1,
            HandoffCpu::Psm => DeviceId::Psm,
        }
    }

    /// Power island holding the core; brought up before its partitions
    /// are copied
    pub fn power_domain(&self) -> usize {
        match self {
            HandoffCpu::Acpu0 => domain_id::ACPU0,
            HandoffCpu::Acpu1 => domain_id::ACPU1,
            HandoffCpu::Rpu0 | HandoffCpu::Rpu1 | HandoffCpu::RpuLockstep => domain_id::RPU,
            HandoffCpu::Psm => domain_id::LPD,
        }
    }

    /// Application cores take an execution-state configuration
    pub fn supports_exec_state(&self) -> bool {
        matches!(self, HandoffCpu::Acpu0 | HandoffCpu::Acpu1)
    }
}

/// Execution state an application core starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Aarch64,
    Aarch32,
}

/// One pending handoff, recorded at partition load and consumed at
/// image start
#[derive(Debug, Clone, Copy)]
pub struct HandoffEntry {
    pub cpu: HandoffCpu,
    pub address: u64,
    pub exec_state: ExecState,
    pub vector_high: bool,
}

impl HandoffEntry {
    /// Build a descriptor from a core-targeted partition header
    pub fn from_partition(cpu: HandoffCpu, header: &PartitionHeader) -> Self {
        Self {
            cpu,
            address: header.handoff_address(),
            exec_state: if header.exec_state_a32() {
                ExecState::Aarch32
            } else {
                ExecState::Aarch64
            },
            vector_high: header.vector_high(),
        }
    }
}

/// Per-core AArch64 select bits in the APU configuration register
const APU_CONFIG_AA64_SHIFT: u32 = 0;

/// Per-core high-vector-base bits in the APU configuration register
const APU_CONFIG_VINITHI_SHIFT: u32 = 8;

fn apu_core_index(cpu: HandoffCpu) -> Option<u32> {
    match cpu {
        HandoffCpu::Acpu0 => Some(0),
        HandoffCpu::Acpu1 => Some(1),
        _ => None,
    }
}

/// Program execution state and vector base for an application core.
///
/// Read-modify-write of the shared APU configuration register; bits of
/// other cores are preserved. Non-application cores are left alone.
pub fn configure_apu(
    regs: &mut dyn PlatformRegs,
    cpu: HandoffCpu,
    exec_state: ExecState,
    vector_high: bool,
) {
    let Some(core) = apu_core_index(cpu) else {
        return;
    };
    let aa64_bit = 1 << (APU_CONFIG_AA64_SHIFT + core);
    let vinithi_bit = 1 << (APU_CONFIG_VINITHI_SHIFT + core);

    let mut value = regs.apu_config();
    match exec_state {
        // AArch64 takes its vector base from the reset address
        // registers; VINITHI only applies to the 32-bit state.
        ExecState::Aarch64 => value |= aa64_bit,
        ExecState::Aarch32 => {
            value &= !aa64_bit;
            if vector_high {
                value |= vinithi_bit;
            } else {
                value &= !vinithi_bit;
            }
        }
    }
    regs.set_apu_config(value);
    log::debug!(
        "{}: exec_state={:?} vector_high={}",
        cpu.name(),
        exec_state,
        vector_high
    );
}
