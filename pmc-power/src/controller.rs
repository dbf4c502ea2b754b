//! Abstract power control interface.
//!
//! The sequencing logic never touches registers directly: each domain is
//! bound at init time to a base address, and all rail assertions and
//! status reads go through this trait. The real implementation writes
//! the platform's power request registers; [`SimulatedController`] is a
//! software model used for host-side tests and bring-up.

use arrayvec::ArrayVec;

/// Hardware interface for one power control block.
///
/// `power_up`/`power_down` post the request; completion is observed by
/// polling the matching `is_*_complete` method on later timer ticks.
pub trait PowerController {
    /// Assert the power-up request for the rail at `base_address`
    fn power_up(&mut self, base_address: u64);

    /// Assert the power-down request for the rail at `base_address`
    fn power_down(&mut self, base_address: u64);

    /// Poll the status register for power-up completion
    fn is_power_up_complete(&mut self, base_address: u64) -> bool;

    /// Poll the status register for power-down completion
    fn is_power_down_complete(&mut self, base_address: u64) -> bool;
}

const MAX_RAILS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RailOp {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy)]
struct Rail {
    base_address: u64,
    op: RailOp,
    /// Polls remaining before the pending operation reports complete
    remaining: u32,
    powered: bool,
    up_requests: u32,
    down_requests: u32,
}

/// Software model of a power control block.
///
/// Every request completes after a fixed number of status polls, so
/// tests can exercise the pending states deterministically. A latency
/// of zero completes on the first poll.
pub struct SimulatedController {
    latency: u32,
    rails: ArrayVec<Rail, MAX_RAILS>,
}

impl SimulatedController {
    /// Create a controller whose requests complete after `latency` polls
    pub fn new(latency: u32) -> Self {
        Self {
            latency,
            rails: ArrayVec::new(),
        }
    }

    fn rail_mut(&mut self, base_address: u64) -> &mut Rail {
        let index = match self
            .rails
            .iter()
            .position(|r| r.base_address == base_address)
        {
            Some(index) => index,
            None => {
                self.rails.push(Rail {
                    base_address,
                    op: RailOp::Down,
                    remaining: 0,
                    powered: false,
                    up_requests: 0,
                    down_requests: 0,
                });
                self.rails.len() - 1
            }
        };
        &mut self.rails[index]
    }

    /// Current rail level as last confirmed by a completed operation
    pub fn is_powered(&self, base_address: u64) -> bool {
        self.rails
            .iter()
            .find(|r| r.base_address == base_address)
            .map(|r| r.powered)
            .unwrap_or(false)
    }

    /// Number of power-up requests posted against `base_address`
    pub fn up_requests(&self, base_address: u64) -> u32 {
        self.rails
            .iter()
            .find(|r| r.base_address == base_address)
            .map(|r| r.up_requests)
            .unwrap_or(0)
    }

    /// Number of power-down requests posted against `base_address`
    pub fn down_requests(&self, base_address: u64) -> u32 {
        self.rails
            .iter()
            .find(|r| r.base_address == base_address)
            .map(|r| r.down_requests)
            .unwrap_or(0)
    }
}

impl PowerController for SimulatedController {
    fn power_up(&mut self, base_address: u64) {
        let latency = self.latency;
        let rail = self.rail_mut(base_address);
        rail.op = RailOp::Up;
        rail.remaining = latency;
        rail.up_requests += 1;
    }

    fn power_down(&mut self, base_address: u64) {
        let latency = self.latency;
        let rail = self.rail_mut(base_address);
        rail.op = RailOp::Down;
        rail.remaining = latency;
        rail.down_requests += 1;
    }

    fn is_power_up_complete(&mut self, base_address: u64) -> bool {
        let rail = self.rail_mut(base_address);
        if rail.op != RailOp::Up {
            return false;
        }
        if rail.remaining > 0 {
            rail.remaining -= 1;
            return false;
        }
        rail.powered = true;
        true
    }

    fn is_power_down_complete(&mut self, base_address: u64) -> bool {
        let rail = self.rail_mut(base_address);
        if rail.op != RailOp::Down {
            return false;
        }
        if rail.remaining > 0 {
            rail.remaining -= 1;
            return false;
        }
        rail.powered = false;
        true
    }
}
