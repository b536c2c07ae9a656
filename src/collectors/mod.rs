//! Signal collectors
//!
//! One collector per [`Category`]. All of them share the same contract:
//! `collect()` always resolves, always returns exactly one [`Signal`] for its
//! category, and expresses any failure through the signal's status.
//!
//! | Collector              | Category      | Suspends on                |
//! |------------------------|---------------|----------------------------|
//! | [`StorageCollector`]    | Storage       | -                          |
//! | [`IdentityCollector`]   | Identity      | -                          |
//! | [`RenderingCollector`]  | Rendering     | -                          |
//! | [`NetworkCollector`]    | Network       | candidate stream, window   |
//! | [`PermissionCollector`] | Permissions   | each permission query      |
//! | [`FontCollector`]       | Fonts         | -                          |

use async_trait::async_trait;
use futures::future::{select, Either, LocalBoxFuture};
use std::future::Future;

use crate::signal::{Category, Signal};

pub mod fonts;
pub mod identity;
pub mod network;
pub mod permissions;
pub mod rendering;
pub mod storage;

pub use fonts::FontCollector;
pub use identity::IdentityCollector;
pub use network::NetworkCollector;
pub use permissions::PermissionCollector;
pub use rendering::RenderingCollector;
pub use storage::StorageCollector;

#[async_trait(?Send)]
pub trait Collector {
    /// The category every signal from this collector carries.
    fn category(&self) -> Category;

    /// Gather the signal. Never fails.
    async fn collect(&self) -> Signal;
}

/// Run `fut` until `deadline` fires. `None` means the deadline won.
///
/// The deadline is polled first so a future that is always ready cannot
/// starve it.
pub(crate) async fn within<F: Future>(
    fut: F,
    deadline: LocalBoxFuture<'static, ()>,
) -> Option<F::Output> {
    futures::pin_mut!(fut);
    match select(deadline, fut).await {
        Either::Left(((), _)) => None,
        Either::Right((value, _)) => Some(value),
    }
}
