//! Power domain arena and per-domain state machine.
//!
//! Domains live in a fixed arena indexed by small-integer id; parent and
//! child links are arena indices, and each parent owns an ordered list
//! of its children. Domains are created once at system init and never
//! destroyed.
//!
//! Power-up of a child only asserts the child's own rail after the
//! parent's use-count has reached the target recorded when the request
//! was made; power-down is symmetric (own rail confirmed down before
//! the parent release is requested). Multiple requesters fan in on one
//! domain through the use-count.

use alloc::boxed::Box;
use arrayvec::ArrayVec;

use crate::controller::PowerController;
use crate::error::{PowerError, Result};
use crate::state::{PowerEvent, PowerState};

/// Size of the domain arena
pub const POWER_DOMAIN_MAX: usize = 16;

/// Maximum children per domain
pub const MAX_CHILDREN: usize = 8;

/// Timer ticks granted to a transition before it escalates to
/// [`PowerError::Timeout`]
pub const DEFAULT_POLL_BUDGET: u32 = 16;

/// Well-known domain ids for this platform's power tree
pub mod domain_id {
    /// Platform management controller domain (tree root)
    pub const PMC: usize = 0;
    /// Network-on-chip and DDR domain
    pub const NOC: usize = 1;
    /// Low-power subsystem domain
    pub const LPD: usize = 2;
    /// Full-power subsystem domain
    pub const FPD: usize = 3;
    /// Programmable fabric domain
    pub const PL: usize = 4;
    /// Compute engine array domain
    pub const ME: usize = 5;
    /// Application core 0 island
    pub const ACPU0: usize = 6;
    /// Application core 1 island
    pub const ACPU1: usize = 7;
    /// Realtime core island
    pub const RPU: usize = 8;
}

/// One node of the power tree
#[derive(Debug)]
pub struct PowerDomain {
    id: usize,
    base_address: u64,
    state: PowerState,
    parent: Option<usize>,
    children: ArrayVec<usize, MAX_CHILDREN>,
    use_count: u32,
    /// Parent use-count target recorded while waiting on the parent
    wf_parent_use_count: u32,
}

impl PowerDomain {
    fn new(id: usize, base_address: u64, parent: Option<usize>) -> Self {
        Self {
            id,
            base_address,
            state: PowerState::Standby,
            parent,
            children: ArrayVec::new(),
            use_count: 0,
            wf_parent_use_count: 0,
        }
    }

    /// Domain id (arena index)
    pub fn id(&self) -> usize {
        self.id
    }

    /// Power control base address bound at init
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Current state
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Parent domain id, if any
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Child domain ids in registration order
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Reference count of active requesters
    pub fn use_count(&self) -> u32 {
        self.use_count
    }
}

/// The domain arena plus its bound power control interface.
pub struct PowerTree {
    domains: [Option<PowerDomain>; POWER_DOMAIN_MAX],
    controller: Box<dyn PowerController>,
    poll_budget: u32,
}

impl PowerTree {
    /// Create an empty tree bound to a power control implementation
    pub fn new(controller: Box<dyn PowerController>) -> Self {
        Self {
            domains: core::array::from_fn(|_| None),
            controller,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }

    /// Override the per-transition poll budget
    pub fn with_poll_budget(mut self, budget: u32) -> Self {
        self.poll_budget = budget;
        self
    }

    /// One-time creation of a domain in its arena slot.
    ///
    /// The domain starts in `Standby`. A parent, when given, must
    /// already exist; the new domain is appended to its child list.
    pub fn init_domain(
        &mut self,
        id: usize,
        base_address: u64,
        parent: Option<usize>,
    ) -> Result<()> {
        if id >= POWER_DOMAIN_MAX {
            return Err(PowerError::InvalidDomain(id as u32));
        }
        if self.domains[id].is_some() {
            return Err(PowerError::DomainBusy(id as u32));
        }
        if let Some(pid) = parent {
            let parent_domain = self.domain_mut(pid)?;
            parent_domain
                .children
                .try_push(id)
                .map_err(|_| PowerError::TooManyChildren(pid as u32))?;
        }
        self.domains[id] = Some(PowerDomain::new(id, base_address, parent));
        Ok(())
    }

    /// Re-parent a domain after init.
    ///
    /// The hardware description lists parents as an array; only single
    /// ownership is supported, so the last listed parent wins.
    pub fn add_parent(&mut self, id: usize, parents: &[usize]) -> Result<()> {
        // Validate everything before mutating any link.
        self.domain(id)?;
        for &pid in parents {
            self.domain(pid)?;
        }
        for &pid in parents {
            if let Some(old) = self.domain(id)?.parent {
                let old_parent = self.domain_mut(old)?;
                old_parent.children.retain(|child| *child != id);
            }
            let parent_domain = self.domain_mut(pid)?;
            parent_domain
                .children
                .try_push(id)
                .map_err(|_| PowerError::TooManyChildren(pid as u32))?;
            self.domain_mut(id)?.parent = Some(pid);
        }
        Ok(())
    }

    /// Immutable access to a domain record
    pub fn domain(&self, id: usize) -> Result<&PowerDomain> {
        self.domains
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or(PowerError::InvalidDomain(id as u32))
    }

    fn domain_mut(&mut self, id: usize) -> Result<&mut PowerDomain> {
        self.domains
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(PowerError::InvalidDomain(id as u32))
    }

    /// Current state of a domain
    pub fn state(&self, id: usize) -> Result<PowerState> {
        Ok(self.domain(id)?.state)
    }

    /// Current use-count of a domain
    pub fn use_count(&self, id: usize) -> Result<u32> {
        Ok(self.domain(id)?.use_count)
    }

    /// Deliver one event to a domain's state machine.
    ///
    /// Completion notifications (`ParentUpDone`, `SelfUpDone`,
    /// `SelfDownDone`, `ParentDownDone`) are accepted in the matching
    /// pending state and behave like a timer poll there, so an
    /// interrupt-driven controller can push them instead of waiting
    /// for the next tick. The guard conditions are still evaluated.
    ///
    /// An event with no transition from the current state is rejected:
    /// logged, the state left unchanged, and reported as
    /// [`PowerError::InvalidTransition`].
    pub fn handle_event(&mut self, id: usize, event: PowerEvent) -> Result<()> {
        let (state, parent) = {
            let domain = self.domain(id)?;
            (domain.state, domain.parent)
        };
        log::debug!(
            "power domain {}: state={} event={}",
            id,
            state.as_str(),
            event.as_str()
        );

        match (state, event) {
            (PowerState::Off | PowerState::Standby, PowerEvent::PwrUp) => {
                if let Some(pid) = parent {
                    let target = self.domain(pid)?.use_count + 1;
                    {
                        let domain = self.domain_mut(id)?;
                        domain.state = PowerState::PwrUpParent;
                        domain.wf_parent_use_count = target;
                    }
                    self.handle_event(pid, PowerEvent::PwrUp)?;
                } else {
                    let base = {
                        let domain = self.domain_mut(id)?;
                        domain.state = PowerState::PwrUpSelf;
                        domain.base_address
                    };
                    self.controller.power_up(base);
                }
                Ok(())
            }
            (PowerState::PwrUpParent, PowerEvent::Timer | PowerEvent::ParentUpDone) => {
                let pid = parent.ok_or(PowerError::InvalidDomain(id as u32))?;
                let parent_count = self.domain(pid)?.use_count;
                if self.domain(id)?.wf_parent_use_count == parent_count {
                    let base = {
                        let domain = self.domain_mut(id)?;
                        domain.wf_parent_use_count = 0;
                        domain.state = PowerState::PwrUpSelf;
                        domain.base_address
                    };
                    self.controller.power_up(base);
                }
                Ok(())
            }
            (PowerState::PwrUpSelf, PowerEvent::Timer | PowerEvent::SelfUpDone) => {
                let base = self.domain(id)?.base_address;
                if self.controller.is_power_up_complete(base) {
                    let domain = self.domain_mut(id)?;
                    domain.state = PowerState::On;
                    domain.use_count += 1;
                }
                Ok(())
            }
            (PowerState::On, PowerEvent::PwrUp) => {
                if let Some(pid) = parent {
                    self.handle_event(pid, PowerEvent::PwrUp)?;
                }
                self.domain_mut(id)?.use_count += 1;
                Ok(())
            }
            (PowerState::On, PowerEvent::PwrDown) => {
                if self.domain(id)?.use_count == 1 {
                    let base = {
                        let domain = self.domain_mut(id)?;
                        domain.state = PowerState::PwrDownSelf;
                        domain.base_address
                    };
                    self.controller.power_down(base);
                } else {
                    self.domain_mut(id)?.use_count -= 1;
                    if let Some(pid) = parent {
                        self.handle_event(pid, PowerEvent::PwrDown)?;
                    }
                }
                Ok(())
            }
            (PowerState::PwrDownSelf, PowerEvent::Timer | PowerEvent::SelfDownDone) => {
                let base = self.domain(id)?.base_address;
                if self.controller.is_power_down_complete(base) {
                    self.domain_mut(id)?.use_count -= 1;
                    match parent {
                        // A parent whose count is already zero was released
                        // out of order; there is no use left to give back.
                        Some(pid) => match self.domain(pid)?.use_count.checked_sub(1) {
                            Some(target) => {
                                {
                                    let domain = self.domain_mut(id)?;
                                    domain.state = PowerState::PwrDownParent;
                                    domain.wf_parent_use_count = target;
                                }
                                self.handle_event(pid, PowerEvent::PwrDown)?;
                            }
                            None => {
                                log::warn!(
                                    "power domain {}: parent {} already released",
                                    id,
                                    pid
                                );
                                self.domain_mut(id)?.state = PowerState::Off;
                            }
                        },
                        None => {
                            self.domain_mut(id)?.state = PowerState::Off;
                        }
                    }
                }
                Ok(())
            }
            (PowerState::PwrDownParent, PowerEvent::Timer | PowerEvent::ParentDownDone) => {
                let pid = parent.ok_or(PowerError::InvalidDomain(id as u32))?;
                let parent_count = self.domain(pid)?.use_count;
                let domain = self.domain_mut(id)?;
                if domain.wf_parent_use_count == parent_count {
                    domain.state = PowerState::Off;
                    domain.wf_parent_use_count = 0;
                }
                Ok(())
            }
            (state, event) => {
                log::warn!(
                    "power domain {}: no transition for event {} in state {}",
                    id,
                    event.as_str(),
                    state.as_str()
                );
                Err(PowerError::InvalidTransition { state, event })
            }
        }
    }

    /// Deliver one timer period to a domain and its ancestors.
    ///
    /// The deepest pending ancestor is serviced first so that a domain
    /// waiting on its parent observes the parent's progress in the same
    /// tick.
    pub fn tick(&mut self, id: usize) -> Result<()> {
        let (state, parent) = {
            let domain = self.domain(id)?;
            (domain.state, domain.parent)
        };
        if let Some(pid) = parent {
            self.tick(pid)?;
        }
        if state.is_pending() {
            self.handle_event(id, PowerEvent::Timer)?;
        }
        Ok(())
    }

    fn chain_settled(&self, id: usize) -> Result<bool> {
        let mut current = Some(id);
        while let Some(node) = current {
            let domain = self.domain(node)?;
            if domain.state.is_pending() {
                return Ok(false);
            }
            current = domain.parent;
        }
        Ok(true)
    }

    fn settle(&mut self, id: usize) -> Result<()> {
        for _ in 0..self.poll_budget {
            if self.chain_settled(id)? {
                return Ok(());
            }
            self.tick(id)?;
        }
        Err(PowerError::Timeout(id as u32))
    }

    /// Bring a domain up, driving the pending transitions to completion.
    ///
    /// Valid from `Off`, `Standby` or `On` (fan-in). On success the
    /// domain is `On` and every ancestor's use-count reflects one more
    /// transitive user. Exhausting the poll budget escalates to
    /// [`PowerError::Timeout`]; domains already powered along the way
    /// are not rolled back.
    pub fn request_power_up(&mut self, id: usize) -> Result<()> {
        self.handle_event(id, PowerEvent::PwrUp)?;
        self.settle(id)
    }

    /// Release one use of a domain.
    ///
    /// Valid from `On`. The rail is only dropped when the last user
    /// releases; otherwise the release is reflected up the chain
    /// without touching this domain's hardware.
    pub fn request_power_down(&mut self, id: usize) -> Result<()> {
        self.handle_event(id, PowerEvent::PwrDown)?;
        self.settle(id)
    }
}
