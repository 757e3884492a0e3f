//! Ownership of sessions for the duration of a call.
//!
//! A call either owns its session, opened for that call and closed when it
//! finishes, or borrows one the caller manages across calls. Borrowed
//! sessions are never closed here.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::debug;

use crate::driver::{Connection, RawConnection, Session};
use crate::errors::{MocaError, Result};

/// A session managed by the caller and shared with an engine.
///
/// Cloning shares the same session. Calls lock it for their duration, so a
/// borrowed session is only ever used by one call at a time.
pub struct Borrowed<C: ?Sized> {
    inner: Arc<Mutex<Box<C>>>,
}

pub type BorrowedConnection = Borrowed<dyn Connection>;
pub type BorrowedRawConnection = Borrowed<dyn RawConnection>;

impl<C: Session + ?Sized> Borrowed<C> {
    pub fn new(session: Box<C>) -> Self {
        Borrowed {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for direct use.
    pub async fn lock(&self) -> MutexGuard<'_, Box<C>> {
        self.inner.lock().await
    }

    /// Close the session.
    ///
    /// Errors if any other handle to the session still exists, including one
    /// set on an engine.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().close().await,
            Err(_) => Err(MocaError::connection(
                "borrowed connection is still in use and cannot be closed",
            )),
        }
    }

    pub(crate) async fn lease(&self) -> Lease<C> {
        Lease::Borrowed(self.inner.clone().lock_owned().await)
    }
}

impl<C: ?Sized> Clone for Borrowed<C> {
    fn clone(&self) -> Self {
        Borrowed {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Borrowed<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Borrowed")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish_non_exhaustive()
    }
}

/// The session a single call runs on.
pub(crate) enum Lease<C: ?Sized> {
    Owned(Box<C>),
    Borrowed(OwnedMutexGuard<Box<C>>),
}

impl<C: Session + ?Sized> Lease<C> {
    pub(crate) fn is_borrowed(&self) -> bool {
        matches!(self, Lease::Borrowed(_))
    }

    /// Close an owned session, or unlock a borrowed one.
    pub(crate) async fn release(self) -> Result<()> {
        match self {
            Lease::Owned(session) => {
                debug!("closing connection");
                session.close().await
            }
            Lease::Borrowed(_guard) => Ok(()),
        }
    }
}

impl<C: ?Sized> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self {
            Lease::Owned(session) => session,
            Lease::Borrowed(guard) => guard,
        }
    }
}

impl<C: ?Sized> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C {
        match self {
            Lease::Owned(session) => session,
            Lease::Borrowed(guard) => guard,
        }
    }
}

/// Release the lease and surface the call's result.
///
/// A release failure is surfaced if the call succeeded. If the call failed,
/// its error wins.
pub(crate) async fn finish<C, T>(lease: Lease<C>, result: Result<T>) -> Result<T>
where
    C: Session + ?Sized,
{
    match result {
        Ok(v) => {
            lease.release().await?;
            Ok(v)
        }
        Err(e) => {
            if let Err(release_err) = lease.release().await {
                debug!(%release_err, "failed to release connection after error");
            }
            Err(e)
        }
    }
}
