//! Audit configuration.
//!
//! Every field has a default, so the JS caller can pass `undefined`, `{}` or
//! any subset of options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collectors::fonts::DEFAULT_FONT_CANDIDATES;
use crate::collectors::permissions::DEFAULT_PERMISSIONS;
use crate::error::{AuditError, Result};
use crate::risk::RiskPolicy;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Address discovery window
    pub discovery_window_ms: u32,
    /// STUN relay used to force candidate gathering
    pub stun_server: String,
    /// Guard timeout applied to every collector
    pub collector_timeout_ms: u32,
    /// Bound on a single permission query
    pub permission_timeout_ms: u32,
    /// Characters of the canvas data URL kept in the report
    pub canvas_prefix_len: usize,
    /// Permission names queried, in order
    pub permissions: Vec<String>,
    /// Font names tested, in order
    pub font_candidates: Vec<String>,
    pub risk_policy: RiskPolicy,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            discovery_window_ms: 2000,
            stun_server: DEFAULT_STUN_SERVER.to_string(),
            collector_timeout_ms: 5000,
            permission_timeout_ms: 1500,
            canvas_prefix_len: 50,
            permissions: DEFAULT_PERMISSIONS.iter().map(|s| s.to_string()).collect(),
            font_candidates: DEFAULT_FONT_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            risk_policy: RiskPolicy::default(),
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.discovery_window_ms == 0 {
            return Err(AuditError::InvalidConfig(
                "discovery_window_ms must be positive".into(),
            ));
        }
        if self.collector_timeout_ms == 0 || self.permission_timeout_ms == 0 {
            return Err(AuditError::InvalidConfig(
                "collector timeouts must be positive".into(),
            ));
        }
        // The guard outlasts every bound the collectors apply themselves
        if self.collector_timeout_ms <= self.discovery_window_ms {
            return Err(AuditError::InvalidConfig(
                "collector_timeout_ms must exceed discovery_window_ms".into(),
            ));
        }
        if self.collector_timeout_ms <= self.permission_timeout_ms {
            return Err(AuditError::InvalidConfig(
                "collector_timeout_ms must exceed permission_timeout_ms".into(),
            ));
        }
        if self.stun_server.trim().is_empty() {
            return Err(AuditError::InvalidConfig("stun_server is empty".into()));
        }
        Ok(())
    }

    pub fn discovery_window(&self) -> Duration {
        Duration::from_millis(self.discovery_window_ms as u64)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms as u64)
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms as u64)
    }
}
