//! Audit orchestration
//!
//! ```text
//! Idle ──run()──> Collecting ──all signals in──> Aggregating ──> Ready
//!   ^                                                              │
//!   └──────────────────────── run() again ─────────────────────────┘
//! ```
//!
//! Every registered collector runs concurrently on the current task. Each is
//! wrapped in a guard timer; a collector that has not produced its signal
//! when the guard fires is replaced by its category's empty signal with
//! status `TimedOut`. There is no failed state: an audit always ends in
//! `Ready` with a report.

use futures::future::join_all;
use std::rc::Rc;
use std::time::Duration;

use crate::collectors::{
    within, Collector, FontCollector, IdentityCollector, NetworkCollector, PermissionCollector,
    RenderingCollector, StorageCollector,
};
use crate::config::AuditConfig;
use crate::host::{Host, Timer};
use crate::report::{FingerprintReport, SignalSet};
use crate::risk::RiskPolicy;
use crate::signal::{CollectionStatus, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    Idle,
    Collecting,
    Aggregating,
    Ready,
}

pub struct Auditor {
    timer: Rc<dyn Timer>,
    collectors: Vec<Box<dyn Collector>>,
    guard_timeout: Duration,
    policy: RiskPolicy,
    phase: AuditPhase,
    report: Option<Rc<FingerprintReport>>,
}

impl Auditor {
    /// An auditor with no collectors.
    pub fn new(timer: Rc<dyn Timer>, config: &AuditConfig) -> Self {
        Self {
            timer,
            collectors: Vec::new(),
            guard_timeout: config.collector_timeout(),
            policy: config.risk_policy.clone(),
            phase: AuditPhase::Idle,
            report: None,
        }
    }

    /// An auditor with the full collector set reading from `host`.
    pub fn for_host<H: Host + 'static>(host: Rc<H>, config: &AuditConfig) -> Self {
        let timer: Rc<dyn Timer> = host.clone();
        let mut auditor = Self::new(timer, config);

        auditor.register(StorageCollector::new(host.clone()));
        auditor.register(IdentityCollector::new(host.clone()));
        auditor.register(RenderingCollector::new(host.clone(), config.canvas_prefix_len));
        auditor.register(NetworkCollector::new(
            host.clone(),
            config.stun_server.clone(),
            config.discovery_window(),
        ));
        auditor.register(PermissionCollector::new(
            host.clone(),
            config.permissions.clone(),
            config.permission_timeout(),
        ));
        auditor.register(FontCollector::new(host, config.font_candidates.clone()));

        auditor
    }

    pub fn register<C: Collector + 'static>(&mut self, collector: C) {
        self.collectors.push(Box::new(collector));
    }

    pub fn phase(&self) -> AuditPhase {
        self.phase
    }

    /// Report of the last completed run.
    pub fn report(&self) -> Option<Rc<FingerprintReport>> {
        self.report.clone()
    }

    fn transition(&mut self, next: AuditPhase) {
        log::info!("audit: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Run every collector and build a fresh report.
    pub async fn run(&mut self) -> Rc<FingerprintReport> {
        self.report = None;
        self.transition(AuditPhase::Collecting);

        let signals = {
            let timer = self.timer.as_ref();
            let timeout = self.guard_timeout;
            join_all(
                self.collectors
                    .iter()
                    .map(|collector| guarded(collector.as_ref(), timer, timeout)),
            )
            .await
        };

        self.transition(AuditPhase::Aggregating);
        let report = Rc::new(FingerprintReport::assemble(
            SignalSet::from_signals(signals),
            &self.policy,
        ));
        log::info!(
            "audit: score {} ({}), {} degraded categories",
            report.risk().score,
            report.risk().level,
            report.degraded_categories().len()
        );

        self.report = Some(report.clone());
        self.transition(AuditPhase::Ready);
        report
    }
}

async fn guarded(collector: &dyn Collector, timer: &dyn Timer, timeout: Duration) -> Signal {
    let category = collector.category();
    match within(collector.collect(), timer.sleep(timeout)).await {
        Some(signal) => signal,
        None => {
            log::warn!(
                "audit: {} collector exceeded {}ms",
                category,
                timeout.as_millis()
            );
            Signal::degraded(category, CollectionStatus::TimedOut)
        }
    }
}
