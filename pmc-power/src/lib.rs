//! PMC Power - hierarchical power-domain sequencing for the platform
//! management controller.
//!
//! Power domains on the SoC form a parent/child tree: an island (a CPU
//! cluster, the NoC, the programmable fabric) hangs off a wider domain
//! whose rails must be up before the island's own rail may be asserted.
//! This crate models each domain as a small finite state machine in a
//! fixed arena, reference-counted so that several requesters can share
//! one hardware domain.
//!
//! # Architecture
//!
//! - **state**: power states and events, with printable names
//! - **domain**: the domain arena ([`PowerTree`]) and the per-domain FSM
//! - **controller**: the abstract "write power control / read status"
//!   hardware interface, plus a software-simulated backend
//! - **api**: the device-level power API the boot loader consumes
//!   (core wake-up, exclusive device access)
//! - **error**: power subsystem error type
//!
//! Hardware completion is never assumed: a transition that asserts a
//! rail parks the domain in a pending state and resumes on timer ticks,
//! with a bounded poll budget that escalates to [`PowerError::Timeout`].

#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod api;
pub mod controller;
pub mod domain;
pub mod error;
pub mod state;

pub use api::{Capabilities, DeviceId, Requester, SubsystemPower, DEFAULT_QOS};
pub use controller::{PowerController, SimulatedController};
pub use domain::{domain_id, PowerDomain, PowerTree, DEFAULT_POLL_BUDGET, POWER_DOMAIN_MAX};
pub use error::{PowerError, Result};
pub use state::{PowerEvent, PowerState};
