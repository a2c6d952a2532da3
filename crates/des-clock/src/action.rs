//! The opaque callable an event carries.
//!
//! An action receives a handle to the clock that fired it, so it can
//! schedule follow-up events, mutate pending ones, or read the virtual time
//! through the ordinary client surface.  Whatever the action computes is for
//! the client's own observation — the engine discards it, hence the `()`
//! output.
//!
//! Actions must be `Fn` (not `FnOnce`): a cyclic event invokes its action
//! once per recurrence, and the queue clones the `Arc` when recycling.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::handle::ClockHandle;

/// The future an [`Action`] produces for one firing.
pub type ActionFuture = BoxFuture<'static, ()>;

/// An event's payload: an async callable invoked with the owning clock's
/// handle each time the event comes due.
pub type Action = Arc<dyn Fn(ClockHandle) -> ActionFuture + Send + Sync>;

/// Box an async closure into an [`Action`].
///
/// ```rust,ignore
/// let hello = action(|clock| async move {
///     if let Ok(t) = clock.now().await {
///         println!("hello at t={t}");
///     }
/// });
/// ```
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn(ClockHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |clock| f(clock).boxed())
}
