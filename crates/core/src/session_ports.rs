//! Session-expiry notification port
//!
//! The host registers one observer (typically "navigate to the login
//! screen"). It is told, at most once per installed credential, that the
//! session ended involuntarily.

/// Receives terminal session-expiry notifications
pub trait SessionObserver: Send + Sync {
    fn on_session_expired(&self);
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_session_expired(&self) {
        self();
    }
}
