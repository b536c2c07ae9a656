//! Storage & cookie collector.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::Collector;
use crate::error::HostError;
use crate::host::{Capability, CapabilityHost, StorageHost, StorageScope};
use crate::probe::probe;
use crate::signal::{Category, CollectionStatus, Signal, SignalValue, StorageSnapshot};

/// Result of reading one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeRead {
    Read,
    Absent,
    Refused,
}

impl ScopeRead {
    fn from_error(scope: &str, err: &HostError) -> Self {
        log::debug!("storage: {} unreadable ({})", scope, err);
        match err {
            HostError::Blocked(_) => ScopeRead::Refused,
            _ => ScopeRead::Absent,
        }
    }
}

pub struct StorageCollector<H> {
    host: Rc<H>,
}

impl<H: StorageHost + CapabilityHost> StorageCollector<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self { host }
    }

    /// Read cookies and both storage scopes. Each scope fails independently.
    pub fn snapshot(&self) -> Signal {
        let mut snapshot = StorageSnapshot::default();

        let cookies = if probe(self.host.as_ref(), Capability::Cookies).is_available() {
            match self.host.cookie_string() {
                Ok(raw) => {
                    snapshot.cookies = split_cookies(&raw);
                    ScopeRead::Read
                }
                Err(e) => ScopeRead::from_error("cookies", &e),
            }
        } else {
            ScopeRead::Absent
        };

        let persistent = self.read_scope(StorageScope::Persistent, &mut snapshot.persistent);
        let session = self.read_scope(StorageScope::Session, &mut snapshot.session);

        let reads = [cookies, persistent, session];
        let status = if reads.contains(&ScopeRead::Refused) {
            CollectionStatus::Denied
        } else if !reads.contains(&ScopeRead::Read) {
            CollectionStatus::Unavailable
        } else {
            CollectionStatus::Collected
        };

        log::debug!(
            "storage: {} cookies, {} persistent, {} session keys ({:?})",
            snapshot.cookies.len(),
            snapshot.persistent.len(),
            snapshot.session.len(),
            status
        );

        Signal::new(status, SignalValue::Storage(snapshot))
    }

    fn read_scope(&self, scope: StorageScope, into: &mut BTreeMap<String, String>) -> ScopeRead {
        let (capability, name) = match scope {
            StorageScope::Persistent => (Capability::PersistentStorage, "localStorage"),
            StorageScope::Session => (Capability::SessionStorage, "sessionStorage"),
        };
        if !probe(self.host.as_ref(), capability).is_available() {
            return ScopeRead::Absent;
        }
        match self.host.storage_entries(scope) {
            Ok(entries) => {
                into.extend(entries);
                ScopeRead::Read
            }
            Err(e) => ScopeRead::from_error(name, &e),
        }
    }
}

#[async_trait(?Send)]
impl<H: StorageHost + CapabilityHost> Collector for StorageCollector<H> {
    fn category(&self) -> Category {
        Category::Storage
    }

    async fn collect(&self) -> Signal {
        self.snapshot()
    }
}

/// Split a `document.cookie` string into its non-empty entries.
pub fn split_cookies(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
