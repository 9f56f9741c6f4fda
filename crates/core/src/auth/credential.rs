//! The bearer credential

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use quill_domain::AuthSession;

/// Access secret with expiry and optional refresh secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_secret: String,
    expires_at: DateTime<Utc>,
    refresh_secret: Option<String>,
}

impl Credential {
    pub fn new(
        access_secret: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_secret: Option<String>,
    ) -> Self {
        Self { access_secret: access_secret.into(), expires_at, refresh_secret }
    }

    /// Credential from a login/refresh response received at `issued_at`
    ///
    /// A session that omits the refresh secret keeps `previous_refresh`, so
    /// refresh endpoints that do not rotate it keep working.
    pub fn from_session(
        session: &AuthSession,
        issued_at: DateTime<Utc>,
        previous_refresh: Option<&str>,
    ) -> Self {
        let refresh_secret = session
            .refresh_token
            .clone()
            .or_else(|| previous_refresh.map(ToString::to_string));
        Self::new(session.access_token.clone(), session.expires_at(issued_at), refresh_secret)
    }

    pub fn access_secret(&self) -> &str {
        &self.access_secret
    }

    pub fn refresh_secret(&self) -> Option<&str> {
        self.refresh_secret.as_deref()
    }

    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the credential expires within `skew` of `now` (or already has)
    pub fn is_expiring(&self, now: DateTime<Utc>, skew: std::time::Duration) -> bool {
        let skew = ChronoDuration::from_std(skew).unwrap_or(ChronoDuration::MAX);
        now.checked_add_signed(skew).map_or(true, |horizon| self.expires_at <= horizon)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh_secret", &self.refresh_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No credential; requests go out unauthenticated
    Absent,
    /// Usable as is
    Valid,
    /// Within the refresh skew of expiry; the next attach refreshes
    Expiring,
    /// A refresh is in flight
    Refreshing,
}
