//! Scoped login/logout around a batch of queries.

use super::provider::{DataError, Session};

/// Holds a logged-in session and logs out when dropped.
///
/// Logout errors on drop are logged, never raised: by then the queries have
/// either produced their result or their own error.
pub struct SessionGuard<'a, S: Session + ?Sized> {
    session: &'a S,
    label: &'a str,
}

impl<'a, S: Session + ?Sized> SessionGuard<'a, S> {
    pub fn acquire(session: &'a S, label: &'a str) -> Result<Self, DataError> {
        session.login()?;
        tracing::debug!(source = label, "session opened");
        Ok(Self { session, label })
    }
}

impl<S: Session + ?Sized> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        match self.session.logout() {
            Ok(()) => tracing::debug!(source = self.label, "session closed"),
            Err(e) => tracing::warn!(source = self.label, error = %e, "logout failed"),
        }
    }
}
