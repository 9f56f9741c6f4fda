//! Credential lifecycle manager
//!
//! Owns the single authoritative in-memory credential and its persisted
//! mirror. Responsibilities:
//! - Attach `Authorization: Bearer …` to outgoing requests
//! - Refresh an expiring credential before use, at most one refresh at a
//!   time no matter how many requests are waiting
//! - Refresh once more when the server rejects a credential we considered
//!   valid
//! - End the session (clear memory and store, notify the observer) when
//!   refresh is impossible
//!
//! State machine: `Absent → Valid → Expiring → Refreshing → {Valid | Absent}`.
//!
//! The refresh runs on its own task (see [`SingleFlight`]), so a caller that
//! gives up waiting never cancels a refresh other callers depend on.
//!
//! Every change of session (install, logout, terminal failure) bumps a
//! session epoch under the credential write lock. A refresh only installs
//! its result when the epoch it started from is still current, so a logout
//! that lands while a refresh is in flight is never undone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use quill_common::SingleFlight;
use quill_domain::AuthSettings;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::credential::{Credential, CredentialState};
use super::credential_store::CredentialStore;
use super::ports::CredentialRefresher;
use crate::errors::ClientError;
use crate::session_ports::SessionObserver;
use crate::transport_ports::TransportRequest;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

struct ManagerInner {
    current: RwLock<Option<Credential>>,
    store: CredentialStore,
    refresher: Arc<dyn CredentialRefresher>,
    refresh_flight: SingleFlight<Credential, ClientError>,
    observer: Mutex<Option<Arc<dyn SessionObserver>>>,
    expiry_notified: AtomicBool,
    /// Bumped whenever the session changes; guarded by `current`'s write lock
    epoch: AtomicU64,
    refresh_skew: Duration,
}

/// Credential attached to an outgoing request
#[derive(Clone, PartialEq, Eq)]
pub struct AttachedCredential {
    /// Access secret placed in the bearer header
    pub secret: String,
    /// Whether this attach had to wait for a refresh
    pub refreshed: bool,
}

impl std::fmt::Debug for AttachedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedCredential")
            .field("secret", &"<redacted>")
            .field("refreshed", &self.refreshed)
            .finish()
    }
}

/// Why a refresh is being requested
#[derive(Clone)]
enum RefreshTrigger {
    /// Local expiry check
    Expiring,
    /// The server rejected this access secret
    Rejected(String),
}

impl RefreshTrigger {
    const fn label(&self) -> &'static str {
        match self {
            Self::Expiring => "expiring",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Manages the bearer credential
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("refresh_skew", &self.inner.refresh_skew)
            .field("refreshing", &self.inner.refresh_flight.is_in_flight())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(
        store: CredentialStore,
        refresher: Arc<dyn CredentialRefresher>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                current: RwLock::new(None),
                store,
                refresher,
                refresh_flight: SingleFlight::new(),
                observer: Mutex::new(None),
                expiry_notified: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                refresh_skew: settings.refresh_skew(),
            }),
        }
    }

    /// Load the persisted credential into memory
    ///
    /// Should be called once at startup. Unreadable or partial entries are
    /// treated as absent.
    pub async fn initialize(&self) -> CredentialState {
        match self.inner.store.load().await {
            Some(credential) => {
                let mut current = self.inner.current.write().await;
                *current = Some(credential);
                self.inner.epoch.fetch_add(1, Ordering::SeqCst);
                drop(current);
                info!("Credential manager initialized with persisted credential");
            }
            None => debug!("No persisted credential found"),
        }
        self.state().await
    }

    /// Current lifecycle state, with expiry evaluated now
    pub async fn state(&self) -> CredentialState {
        if self.inner.refresh_flight.is_in_flight() {
            return CredentialState::Refreshing;
        }
        match self.inner.current.read().await.as_ref() {
            None => CredentialState::Absent,
            Some(credential) if credential.is_expiring(Utc::now(), self.inner.refresh_skew) => {
                CredentialState::Expiring
            }
            Some(_) => CredentialState::Valid,
        }
    }

    /// Whether a credential is held
    pub async fn is_authenticated(&self) -> bool {
        self.inner.current.read().await.is_some()
    }

    /// Copy of the held credential, without any expiry check or refresh
    pub async fn snapshot(&self) -> Option<Credential> {
        self.inner.current.read().await.clone()
    }

    /// Number of refresh operations actually started
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_flight.flights_started()
    }

    /// Attach the bearer header to `request`
    ///
    /// Returns the attached access secret, or `None` when no credential is
    /// held (the request goes out unauthenticated). An expiring credential
    /// is refreshed first.
    ///
    /// # Errors
    /// Returns an `Auth` error when the refresh fails.
    pub async fn attach(
        &self,
        request: &mut TransportRequest,
    ) -> Result<Option<String>, ClientError> {
        Ok(self.authorize(request).await?.map(|attached| attached.secret))
    }

    /// Like [`attach`](Self::attach), also reporting whether a refresh was
    /// needed first
    ///
    /// A server rejection of a credential that was just refreshed is
    /// terminal; the pipeline uses `refreshed` to skip a second refresh.
    ///
    /// # Errors
    /// Returns an `Auth` error when the refresh fails.
    pub async fn authorize(
        &self,
        request: &mut TransportRequest,
    ) -> Result<Option<AttachedCredential>, ClientError> {
        let current = self.inner.current.read().await.clone();
        let Some(mut credential) = current else {
            return Ok(None);
        };

        let refreshed = credential.is_expiring(Utc::now(), self.inner.refresh_skew);
        if refreshed {
            debug!("Credential expiring; refreshing before send");
            credential = self.refresh(RefreshTrigger::Expiring).await?;
        }

        request.set_bearer(credential.access_secret());
        Ok(Some(AttachedCredential { secret: credential.access_secret().to_string(), refreshed }))
    }

    /// Obtain a replacement after the server rejected `rejected_secret`
    ///
    /// If the held credential already differs from the rejected one another
    /// caller refreshed it meanwhile, and its secret is returned directly.
    ///
    /// # Errors
    /// Returns an `Auth` error when no credential is held or refresh fails.
    #[instrument(skip_all)]
    pub async fn refresh_after_rejection(
        &self,
        rejected_secret: &str,
    ) -> Result<String, ClientError> {
        {
            let current = self.inner.current.read().await;
            match current.as_ref() {
                None => return Err(ClientError::auth(SESSION_EXPIRED_MESSAGE)),
                Some(credential) if credential.access_secret() != rejected_secret => {
                    debug!("Rejected credential already replaced");
                    return Ok(credential.access_secret().to_string());
                }
                Some(_) => {}
            }
        }

        let credential = self.refresh(RefreshTrigger::Rejected(rejected_secret.to_string())).await?;
        Ok(credential.access_secret().to_string())
    }

    /// End the session after an unrecoverable authentication failure
    ///
    /// Clears memory and the store and notifies the observer (at most once
    /// per installed credential).
    pub async fn on_terminal_auth_failure(&self) {
        warn!("Terminal authentication failure; ending session");
        self.inner.end_session().await;
    }

    /// Install a credential obtained by login, register or refresh
    ///
    /// Re-arms the session-expiry notification.
    ///
    /// # Errors
    /// Returns an error if the credential could not be persisted. It is
    /// still held in memory for this process.
    pub async fn install(&self, credential: Credential) -> Result<(), ClientError> {
        self.inner.install(credential).await.map_err(ClientError::from)
    }

    /// Drop the credential without notifying the observer (logout)
    ///
    /// A refresh still in flight finishes without installing its result.
    pub async fn clear(&self) {
        let mut current = self.inner.current.write().await;
        *current = None;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.inner.store.clear().await {
            warn!(error = %err, "Failed to clear persisted credential");
        }
        drop(current);
        info!("Credential cleared");
    }

    /// Register the session-expiry observer, replacing any previous one
    pub fn set_session_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.inner.observer.lock() = Some(observer);
    }

    pub fn clear_session_observer(&self) {
        *self.inner.observer.lock() = None;
    }

    async fn refresh(&self, trigger: RefreshTrigger) -> Result<Credential, ClientError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .refresh_flight
            .run(move || async move { inner.perform_refresh(trigger).await })
            .await
    }
}

impl ManagerInner {
    #[instrument(skip_all, fields(trigger = trigger.label()))]
    async fn perform_refresh(&self, trigger: RefreshTrigger) -> Result<Credential, ClientError> {
        let (epoch, current) = {
            let guard = self.current.read().await;
            (self.epoch.load(Ordering::SeqCst), guard.clone())
        };
        let Some(current) = current else {
            return Err(ClientError::auth(SESSION_EXPIRED_MESSAGE));
        };

        let needs_refresh = match &trigger {
            RefreshTrigger::Expiring => current.is_expiring(Utc::now(), self.refresh_skew),
            RefreshTrigger::Rejected(secret) => current.access_secret() == secret,
        };
        if !needs_refresh {
            return Ok(current);
        }

        let Some(refresh_secret) = current.refresh_secret().map(ToString::to_string) else {
            warn!("Credential needs refresh but has no refresh secret");
            self.end_session_from(epoch).await;
            return Err(ClientError::auth(SESSION_EXPIRED_MESSAGE));
        };

        match self.refresher.refresh(&refresh_secret).await {
            Ok(fresh) => {
                let mut current = self.current.write().await;
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    info!("Session changed during refresh; discarding refreshed credential");
                    return Err(ClientError::auth(SESSION_EXPIRED_MESSAGE));
                }
                if let Err(err) = self.install_locked(&mut current, fresh.clone()).await {
                    warn!(error = %err, "Refreshed credential could not be persisted");
                }
                info!("Credential refreshed");
                Ok(fresh)
            }
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "Credential refresh failed");
                self.end_session_from(epoch).await;
                Err(ClientError::auth(SESSION_EXPIRED_MESSAGE))
            }
        }
    }

    async fn install(&self, credential: Credential) -> quill_domain::Result<()> {
        let mut current = self.current.write().await;
        self.install_locked(&mut current, credential).await
    }

    /// Install while holding the write lock, so memory and store change
    /// together with the epoch
    async fn install_locked(
        &self,
        current: &mut Option<Credential>,
        credential: Credential,
    ) -> quill_domain::Result<()> {
        *current = Some(credential.clone());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.expiry_notified.store(false, Ordering::SeqCst);
        info!(expires_at = %credential.expires_at(), "Credential installed");
        self.store.save(&credential).await
    }

    async fn end_session(&self) {
        let mut current = self.current.write().await;
        self.end_session_locked(&mut current).await;
        drop(current);
        self.notify_expired();
    }

    /// End the session only if nothing replaced it since `epoch`
    async fn end_session_from(&self, epoch: u64) {
        let mut current = self.current.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Session changed during refresh; leaving it in place");
            return;
        }
        self.end_session_locked(&mut current).await;
        drop(current);
        self.notify_expired();
    }

    async fn end_session_locked(&self, current: &mut Option<Credential>) {
        *current = None;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "Failed to clear persisted credential");
        }
    }

    fn notify_expired(&self) {
        if self.expiry_notified.swap(true, Ordering::SeqCst) {
            debug!("Session expiry already notified");
            return;
        }
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            info!("Notifying session expiry");
            observer.on_session_expired();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use quill_domain::StorageSettings;

    use super::*;
    use crate::storage_ports::InMemoryStore;
    use crate::transport_ports::HttpMethod;

    struct ScriptedRefresher {
        calls: AtomicUsize,
        delay: Duration,
        outcome: Result<Credential, ClientError>,
    }

    impl ScriptedRefresher {
        fn succeeding(access: &str, delay: Duration) -> Arc<Self> {
            let fresh = Credential::new(
                access,
                Utc::now() + ChronoDuration::hours(1),
                Some("refresh-next".into()),
            );
            Arc::new(Self { calls: AtomicUsize::new(0), delay, outcome: Ok(fresh) })
        }

        fn failing(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                outcome: Err(ClientError::validation(400, "Refresh token inválido")),
            })
        }
    }

    #[async_trait]
    impl CredentialRefresher for ScriptedRefresher {
        async fn refresh(&self, _refresh_secret: &str) -> Result<Credential, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    fn manager(refresher: Arc<ScriptedRefresher>) -> (Arc<InMemoryStore>, CredentialManager) {
        let memory = Arc::new(InMemoryStore::new());
        let store = CredentialStore::new(memory.clone(), StorageSettings::default());
        (memory, CredentialManager::new(store, refresher, &AuthSettings::default()))
    }

    fn expires_in(seconds: i64) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::seconds(seconds)
    }

    fn request() -> TransportRequest {
        TransportRequest::new(HttpMethod::Get, "http://a.test/posts", Duration::from_secs(1))
    }

    fn counting_observer() -> (Arc<AtomicUsize>, Arc<dyn SessionObserver>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let observer: Arc<dyn SessionObserver> = Arc::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        });
        (count, observer)
    }

    #[tokio::test]
    async fn test_absent_credential_leaves_request_unauthenticated() {
        let (_, manager) = manager(ScriptedRefresher::succeeding("x", Duration::ZERO));
        let mut request = request();

        assert_eq!(manager.attach(&mut request).await.unwrap(), None);
        assert_eq!(request.bearer(), None);
        assert_eq!(manager.state().await, CredentialState::Absent);
    }

    #[tokio::test]
    async fn test_valid_credential_attached_without_refresh() {
        let refresher = ScriptedRefresher::succeeding("x", Duration::ZERO);
        let (memory, manager) = manager(Arc::clone(&refresher));
        manager.install(Credential::new("access-1", expires_in(3600), None)).await.unwrap();

        let mut request = request();
        assert_eq!(manager.attach(&mut request).await.unwrap().as_deref(), Some("access-1"));
        assert_eq!(request.bearer(), Some("access-1"));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(memory.peek("access_token").as_deref(), Some("access-1"));
        assert_eq!(manager.state().await, CredentialState::Valid);
    }

    #[tokio::test]
    async fn test_expiring_credential_refreshed_once_for_concurrent_callers() {
        let refresher = ScriptedRefresher::succeeding("access-2", Duration::from_millis(30));
        let (memory, manager) = manager(Arc::clone(&refresher));
        manager
            .install(Credential::new("access-1", expires_in(5), Some("refresh-1".into())))
            .await
            .unwrap();
        assert_eq!(manager.state().await, CredentialState::Expiring);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let mut request = request();
                manager.attach(&mut request).await.map(|_| request.bearer().map(str::to_string))
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().as_deref(), Some("access-2"));
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.refresh_count(), 1);
        assert_eq!(memory.peek("access_token").as_deref(), Some("access-2"));
        assert_eq!(memory.peek("refresh_token").as_deref(), Some("refresh-next"));
        assert_eq!(manager.state().await, CredentialState::Valid);
    }

    #[tokio::test]
    async fn test_refresh_failure_ends_session_and_notifies_once() {
        let refresher = ScriptedRefresher::failing(Duration::from_millis(20));
        let (memory, manager) = manager(Arc::clone(&refresher));
        let (notified, observer) = counting_observer();
        manager.set_session_observer(observer);
        manager
            .install(Credential::new("access-1", expires_in(-10), Some("refresh-1".into())))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.attach(&mut request()).await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.is_auth());
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(memory.is_empty());
        assert_eq!(manager.state().await, CredentialState::Absent);

        // Later terminal failures do not re-notify until a new credential
        manager.on_terminal_auth_failure().await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_without_refresh_secret_is_terminal() {
        let refresher = ScriptedRefresher::succeeding("x", Duration::ZERO);
        let (_, manager) = manager(Arc::clone(&refresher));
        let (notified, observer) = counting_observer();
        manager.set_session_observer(observer);
        manager.install(Credential::new("access-1", expires_in(1), None)).await.unwrap();

        let err = manager.attach(&mut request()).await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_rejection() {
        let refresher = ScriptedRefresher::succeeding("access-2", Duration::ZERO);
        let (_, manager) = manager(Arc::clone(&refresher));
        manager
            .install(Credential::new("access-1", expires_in(3600), Some("refresh-1".into())))
            .await
            .unwrap();

        assert_eq!(manager.refresh_after_rejection("access-1").await.unwrap(), "access-2");
        // A stale rejection returns the current secret without refreshing
        assert_eq!(manager.refresh_after_rejection("access-1").await.unwrap(), "access-2");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_install_rearms_notification_and_observer_replacement() {
        let (_, manager) = manager(ScriptedRefresher::failing(Duration::ZERO));
        let (first, first_observer) = counting_observer();
        let (second, second_observer) = counting_observer();

        manager.set_session_observer(first_observer);
        manager.set_session_observer(second_observer);
        manager.install(Credential::new("a", expires_in(3600), None)).await.unwrap();
        manager.on_terminal_auth_failure().await;

        manager.install(Credential::new("b", expires_in(3600), None)).await.unwrap();
        manager.on_terminal_auth_failure().await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 2);

        manager.clear_session_observer();
        manager.install(Credential::new("c", expires_in(3600), None)).await.unwrap();
        manager.on_terminal_auth_failure().await;
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logout_during_refresh_is_not_undone() {
        let refresher = ScriptedRefresher::succeeding("fresh", Duration::from_millis(100));
        let (memory, manager) = manager(Arc::clone(&refresher));
        let (notified, observer) = counting_observer();
        manager.set_session_observer(observer);
        manager
            .install(Credential::new("stale", expires_in(-10), Some("refresh-1".into())))
            .await
            .unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.attach(&mut request()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.clear().await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_auth());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(!manager.is_authenticated().await);
        assert_eq!(memory.peek("access_token"), None);
        assert!(memory.is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_after_new_login_keeps_new_credential() {
        let refresher = ScriptedRefresher::failing(Duration::from_millis(100));
        let (memory, manager) = manager(Arc::clone(&refresher));
        let (notified, observer) = counting_observer();
        manager.set_session_observer(observer);
        manager
            .install(Credential::new("stale", expires_in(-10), Some("refresh-1".into())))
            .await
            .unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.attach(&mut request()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.install(Credential::new("relogin", expires_in(3600), None)).await.unwrap();

        assert!(waiter.await.unwrap().unwrap_err().is_auth());
        assert_eq!(memory.peek("access_token").as_deref(), Some("relogin"));
        assert_eq!(manager.state().await, CredentialState::Valid);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorize_reports_refresh() {
        let refresher = ScriptedRefresher::succeeding("access-2", Duration::ZERO);
        let (_, manager) = manager(Arc::clone(&refresher));
        manager
            .install(Credential::new("access-1", expires_in(1), Some("refresh-1".into())))
            .await
            .unwrap();

        let first = manager.authorize(&mut request()).await.unwrap().unwrap();
        assert_eq!(first.secret, "access-2");
        assert!(first.refreshed);

        let second = manager.authorize(&mut request()).await.unwrap().unwrap();
        assert_eq!(second.secret, "access-2");
        assert!(!second.refreshed);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_and_clear() {
        let memory = Arc::new(InMemoryStore::with_entries([
            ("access_token", "persisted"),
            ("token_expiry", "2999-01-01T00:00:00Z"),
        ]));
        let store = CredentialStore::new(memory.clone(), StorageSettings::default());
        let manager = CredentialManager::new(
            store,
            ScriptedRefresher::succeeding("x", Duration::ZERO),
            &AuthSettings::default(),
        );

        assert_eq!(manager.initialize().await, CredentialState::Valid);
        assert!(manager.is_authenticated().await);

        let (notified, observer) = counting_observer();
        manager.set_session_observer(observer);
        manager.clear().await;
        assert!(!manager.is_authenticated().await);
        assert!(memory.is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }
}
