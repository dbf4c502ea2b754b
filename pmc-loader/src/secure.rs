//! Secure validation gate.
//!
//! The loader derives a [`SecurePolicy`] from the header table
//! attribute bits before trusting any other field. Containers with
//! neither attribute set never touch the gate; their headers are read
//! and range/checksum-verified directly. Signed or encrypted containers
//! route policy checks, table authentication and header reads through a
//! [`SecureGate`] implementation backed by the crypto engines.

use crate::device::BootDeviceOps;
use crate::error::{LoaderError, Result};
use crate::header::{IhtAttributes, MetaHeader, IHT_SIZE};

/// Security posture of one container, derived from its attribute bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurePolicy {
    pub authenticated: bool,
    pub encrypted: bool,
}

impl SecurePolicy {
    /// Derive the policy from the table attribute flags
    pub fn from_attributes(flags: IhtAttributes) -> Self {
        Self {
            authenticated: flags.contains(IhtAttributes::SIGNED),
            encrypted: flags.contains(IhtAttributes::ENCRYPTED),
        }
    }

    /// Container requires the secure path
    pub fn secure(&self) -> bool {
        self.authenticated || self.encrypted
    }
}

/// Crypto-engine seam for signed and encrypted containers.
pub trait SecureGate {
    /// Check the container policy against device-programmed
    /// compulsions (e.g. efuses forcing authentication)
    fn validate_policy(&mut self, policy: &SecurePolicy) -> Result<()>;

    /// Authenticate the raw header table before structural validation
    fn authenticate_header_table(&mut self, raw: &[u8; IHT_SIZE]) -> Result<()>;

    /// Read, decrypt and verify the image and partition header arrays
    fn read_and_verify_headers(
        &mut self,
        device: &mut dyn BootDeviceOps,
        meta: &mut MetaHeader,
    ) -> Result<()>;
}

/// Gate bound when no crypto engine is present.
///
/// Non-secure containers are unaffected (the pipeline never consults
/// the gate for them); any container demanding the secure path is
/// rejected.
#[derive(Default)]
pub struct OpenGate;

impl SecureGate for OpenGate {
    fn validate_policy(&mut self, policy: &SecurePolicy) -> Result<()> {
        if policy.secure() {
            log::error!("secure container with no crypto engine bound");
            return Err(LoaderError::SecureValidation);
        }
        Ok(())
    }

    fn authenticate_header_table(&mut self, _raw: &[u8; IHT_SIZE]) -> Result<()> {
        Err(LoaderError::SecureValidation)
    }

    fn read_and_verify_headers(
        &mut self,
        _device: &mut dyn BootDeviceOps,
        _meta: &mut MetaHeader,
    ) -> Result<()> {
        Err(LoaderError::SecureValidation)
    }
}
