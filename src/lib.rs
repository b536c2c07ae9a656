//! # Privacy Audit
//!
//! Measures how identifiable and trackable the current browser is, compiled
//! to WebAssembly.
//!
//! ## Architecture
//!
//! ```text
//! PrivacyAudit (WASM)
//!   ↓
//! Auditor ── guard timers ──┐
//!   ↓                       │
//! Collectors (storage, identity, rendering, network, permissions, fonts)
//!   ↓
//! Host ports ── BrowserHost (web-sys)
//!   ↓
//! SignalSet ── RiskPolicy ──> FingerprintReport
//! ```
//!
//! Collectors never fail: a missing or refused browser surface shows up as a
//! degraded status on that category's signal, and the audit always
//! produces a report.
//!
//! The address lookup ([`lookup`]) is a separate entry point that resolves
//! the client's public address to location and network-owner records
//! behind a per-client rate limit.

use std::rc::Rc;
use wasm_bindgen::prelude::*;

pub mod collectors;
pub mod config;
mod error;
pub mod host;
pub mod lookup;
pub mod orchestrator;
pub mod probe;
pub mod rate_limiter;
pub mod report;
pub mod risk;
pub mod signal;

pub use collectors::Collector;
pub use config::AuditConfig;
pub use error::{AuditError, ErrorCode, ErrorInfo, HostError, Result};
pub use host::{BrowserHost, Host};
pub use lookup::{ClientHeaders, FetchLookup, LookupGate, LookupResponse, LookupService};
pub use orchestrator::{AuditPhase, Auditor};
pub use probe::{probe, Availability};
pub use rate_limiter::{RateLimiterConfig, RateLimiterStats, RequestRateLimiter};
pub use report::{FingerprintReport, SignalSet};
pub use risk::{aggregate, RiskLevel, RiskPolicy, RiskScore};
pub use signal::{Category, CollectionStatus, Signal, SignalValue};

/// Initialize logging for the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // A second init (module re-instantiated) finds the logger already set
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("logger already initialized");
    }
    log::info!("Privacy audit initialized");
}

/// Parse JS options; `undefined`/`null` means defaults.
fn parse_config(options: JsValue) -> Result<AuditConfig> {
    let config: AuditConfig = if options.is_undefined() || options.is_null() {
        AuditConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| AuditError::InvalidConfig(e.to_string()))?
    };
    config.validate()?;
    Ok(config)
}

fn to_js<T: serde::Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| AuditError::Serialization(e.to_string()).into())
}

/// Browser audit handle
#[wasm_bindgen]
pub struct PrivacyAudit {
    auditor: Auditor,
}

#[wasm_bindgen]
impl PrivacyAudit {
    /// Create an audit over the current page
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> std::result::Result<PrivacyAudit, JsValue> {
        let config = parse_config(options)?;
        log::info!(
            "Creating privacy audit (discovery window {}ms)",
            config.discovery_window_ms
        );
        let host = Rc::new(BrowserHost::new());
        Ok(PrivacyAudit {
            auditor: Auditor::for_host(host, &config),
        })
    }

    /// Run every collector and resolve with the report
    #[wasm_bindgen]
    pub async fn run(&mut self) -> std::result::Result<JsValue, JsValue> {
        let report = self.auditor.run().await;
        to_js(report.as_ref())
    }

    /// Current phase: "idle", "collecting", "aggregating" or "ready"
    #[wasm_bindgen]
    pub fn phase(&self) -> String {
        match self.auditor.phase() {
            AuditPhase::Idle => "idle",
            AuditPhase::Collecting => "collecting",
            AuditPhase::Aggregating => "aggregating",
            AuditPhase::Ready => "ready",
        }
        .to_string()
    }

    /// Last report, or `null` before the first run
    #[wasm_bindgen(js_name = lastReport)]
    pub fn last_report(&self) -> std::result::Result<JsValue, JsValue> {
        match self.auditor.report() {
            Some(report) => to_js(report.as_ref()),
            None => Ok(JsValue::NULL),
        }
    }
}

/// One-shot audit with the given options
#[wasm_bindgen(js_name = runPrivacyAudit)]
pub async fn run_privacy_audit(options: JsValue) -> std::result::Result<JsValue, JsValue> {
    let mut audit = PrivacyAudit::new(options)?;
    audit.run().await
}

thread_local! {
    static LOOKUP_GATE: Rc<LookupGate<FetchLookup>> = Rc::new(LookupGate::new(FetchLookup::default()));
}

/// Resolve the client address to geolocation/WHOIS records.
///
/// Resolves with `{ status, body }`; rate-limited and failed lookups carry
/// a user-facing `body.error`.
#[wasm_bindgen(js_name = lookupClientAddress)]
pub async fn lookup_client_address(
    forwarded_for: Option<String>,
    real_ip: Option<String>,
    remote_address: Option<String>,
) -> std::result::Result<JsValue, JsValue> {
    let gate = LOOKUP_GATE.with(Rc::clone);
    let headers = ClientHeaders {
        forwarded_for,
        real_ip,
        remote_address,
    };
    let reply = gate.handle(&headers).await;
    to_js(&reply)
}

