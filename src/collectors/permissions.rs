//! Permission collector.

use async_trait::async_trait;
use futures::future::join_all;
use std::rc::Rc;
use std::time::Duration;

use super::{within, Collector};
use crate::error::AuditError;
use crate::host::{Capability, CapabilityHost, PermissionHost, Timer};
use crate::probe::probe;
use crate::signal::{
    Category, CollectionStatus, PermissionMap, PermissionState, Signal, SignalValue,
};

pub const DEFAULT_PERMISSIONS: &[&str] = &["geolocation", "camera", "microphone", "notifications"];

pub struct PermissionCollector<H> {
    host: Rc<H>,
    names: Vec<String>,
    query_timeout: Duration,
}

impl<H: CapabilityHost + PermissionHost + Timer> PermissionCollector<H> {
    pub fn new(host: Rc<H>, names: Vec<String>, query_timeout: Duration) -> Self {
        Self {
            host,
            names,
            query_timeout,
        }
    }

    /// One bounded query. Any failure resolves to `Unknown`.
    async fn query(&self, name: &str) -> PermissionState {
        let deadline = self.host.sleep(self.query_timeout);
        let failure = match within(self.host.query_permission(name), deadline).await {
            Some(Ok(state)) => return PermissionState::parse(&state),
            Some(Err(e)) => e.to_string(),
            None => format!("no answer within {}ms", self.query_timeout.as_millis()),
        };

        let err = AuditError::PermissionQueryFailed {
            name: name.to_string(),
            reason: failure,
        };
        log::debug!("permissions: {}", err);
        PermissionState::Unknown
    }
}

#[async_trait(?Send)]
impl<H: CapabilityHost + PermissionHost + Timer> Collector for PermissionCollector<H> {
    fn category(&self) -> Category {
        Category::Permissions
    }

    async fn collect(&self) -> Signal {
        let mut map = PermissionMap::new();

        if !probe(self.host.as_ref(), Capability::Permissions).is_available() {
            for name in &self.names {
                map.set(name, PermissionState::Unknown);
            }
            return Signal::new(CollectionStatus::Unavailable, SignalValue::Permissions(map));
        }

        let states = join_all(self.names.iter().map(|name| self.query(name))).await;
        for (name, state) in self.names.iter().zip(states) {
            map.set(name, state);
        }

        log::debug!("permissions: {} of {} granted", map.granted_count(), map.len());
        Signal::collected(SignalValue::Permissions(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use futures::executor::block_on;
    use futures::future::LocalBoxFuture;
    use futures::FutureExt;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Pending on the first poll, ready on the second.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                return Poll::Ready(());
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    struct StubPermissions {
        available: bool,
        answers: Vec<(&'static str, Option<Result<&'static str, HostError>>)>,
    }

    impl CapabilityHost for StubPermissions {
        fn supports(&self, capability: Capability) -> Result<bool, HostError> {
            match capability {
                Capability::Permissions if self.available => Ok(true),
                Capability::Permissions => Err(HostError::Unsupported("permissions".into())),
                _ => Ok(false),
            }
        }
    }

    #[async_trait(?Send)]
    impl PermissionHost for StubPermissions {
        async fn query_permission(&self, name: &str) -> Result<String, HostError> {
            match self.answers.iter().find(|(n, _)| *n == name) {
                Some((_, Some(answer))) => answer.clone().map(str::to_string),
                // Stalled query
                Some((_, None)) => futures::future::pending().await,
                None => Err(HostError::Failed(format!("{} is not a valid PermissionName", name))),
            }
        }
    }

    impl Timer for StubPermissions {
        // Bounds elapse after one scheduler turn, so answered queries
        // still win and stalled ones are cut off.
        fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
            YieldOnce(false).boxed_local()
        }
    }

    fn defaults() -> Vec<String> {
        DEFAULT_PERMISSIONS.iter().map(|s| s.to_string()).collect()
    }

    fn map_of(signal: &Signal) -> &PermissionMap {
        match &signal.value {
            SignalValue::Permissions(map) => map,
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_each_query_fails_independently() {
        let host = Rc::new(StubPermissions {
            available: true,
            answers: vec![
                ("geolocation", Some(Ok("granted"))),
                ("camera", Some(Err(HostError::Blocked("camera".into())))),
                ("microphone", None),
                ("notifications", Some(Ok("prompt"))),
            ],
        });
        let collector = PermissionCollector::new(host, defaults(), Duration::from_millis(1500));
        let signal = block_on(collector.collect());

        assert_eq!(signal.status, CollectionStatus::Collected);
        let map = map_of(&signal);
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("geolocation", PermissionState::Granted),
                ("camera", PermissionState::Unknown),
                ("microphone", PermissionState::Unknown),
                ("notifications", PermissionState::Prompt),
            ]
        );
        assert_eq!(map.granted_count(), 1);
    }

    #[test]
    fn test_missing_api_is_unavailable() {
        let host = Rc::new(StubPermissions {
            available: false,
            answers: vec![],
        });
        let collector = PermissionCollector::new(host, defaults(), Duration::from_millis(1500));
        let signal = block_on(collector.collect());

        assert_eq!(signal.status, CollectionStatus::Unavailable);
        let map = map_of(&signal);
        assert_eq!(map.len(), 4);
        assert!(map.iter().all(|(_, s)| s == PermissionState::Unknown));
    }
}
