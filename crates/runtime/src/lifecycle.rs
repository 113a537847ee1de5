//! Scoped ownership of the provider for the lifetime of a chat.
//!
//! [`run_scoped`] hands the resource to a body future and releases it once
//! the body finishes, fails, or is interrupted. Release runs at most once no
//! matter how many exit paths race to trigger it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// A resource with asynchronous teardown.
pub trait Release: Send + Sync {
    fn release(&self) -> impl Future<Output = ()> + Send;
}

/// Owns a resource and guarantees at-most-once release.
pub struct Scoped<T: Release> {
    resource: Arc<T>,
    released: AtomicBool,
}

impl<T: Release> Scoped<T> {
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(resource),
            released: AtomicBool::new(false),
        }
    }

    /// Shared handle to the resource.
    pub fn resource(&self) -> Arc<T> {
        Arc::clone(&self.resource)
    }

    /// Release the resource. Returns `false` if it was already released.
    pub async fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.resource.release().await;
        debug!("scoped resource released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// How a scoped run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Exit<O> {
    /// The body ran to completion with this output.
    Completed(O),
    /// The interrupt fired first; the body was dropped.
    Interrupted,
}

/// Run `body` with the resource, racing it against `interrupt`.
///
/// The resource is released on every outcome before this returns.
pub async fn run_scoped<T, F, Fut, I>(scope: &Scoped<T>, interrupt: I, body: F) -> Exit<Fut::Output>
where
    T: Release,
    F: FnOnce(Arc<T>) -> Fut,
    Fut: Future,
    I: Future<Output = ()>,
{
    let exit = tokio::select! {
        output = body(scope.resource()) => Exit::Completed(output),
        () = interrupt => Exit::Interrupted,
    };
    scope.release().await;
    exit
}
