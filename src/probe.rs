//! Capability probe
//!
//! Feature detection that never fails: any error raised while checking a
//! capability is treated as absence.

use serde::{Deserialize, Serialize};

use crate::host::{Capability, CapabilityHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Check whether `capability` exists in the host runtime.
pub fn probe<H: CapabilityHost + ?Sized>(host: &H, capability: Capability) -> Availability {
    match host.supports(capability) {
        Ok(true) => Availability::Available,
        Ok(false) => {
            log::debug!("probe: {} absent", capability.as_str());
            Availability::Unavailable
        }
        Err(e) => {
            log::debug!("probe: {} check failed ({})", capability.as_str(), e);
            Availability::Unavailable
        }
    }
}
