//! Remote gateway abstraction for the sync engine.
//!
//! The gateway is the backend holding a user's progress across devices.
//! Implementations may use HTTP or anything else; the engine only needs the
//! four calls below.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studyforge_core::{QuizSession, Timestamp, WrongAnswer};

use crate::error::GatewayError;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Bearer credential identifying the user to the backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"***").finish()
    }
}

/// Backend acknowledgment of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Sessions the backend stored.
    pub sessions: usize,
    /// Wrong answers the backend stored.
    pub wrong_answers: usize,
    /// Backend time of the sync, if it reported one.
    #[serde(default)]
    pub last_sync: Option<Timestamp>,
}

/// The backend contract consumed by the sync engine.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Upload sessions and wrong answers in one batch.
    async fn push(
        &self,
        credential: &Credential,
        sessions: &[QuizSession],
        wrong_answers: &[WrongAnswer],
    ) -> Result<PushResponse>;

    /// All sessions stored for the user.
    async fn pull_sessions(&self, credential: &Credential) -> Result<Vec<QuizSession>>;

    /// All wrong answers stored for the user.
    async fn pull_wrong_answers(&self, credential: &Credential) -> Result<Vec<WrongAnswer>>;

    /// Whether the backend is reachable right now.
    async fn health_check(&self, credential: &Credential) -> bool;
}

/// A simple in-memory gateway for testing.
///
/// Keeps one account per credential and upserts records by global id, so
/// several simulated devices can share one instance. An upsert of a known
/// record goes through the same merge rules the devices use.
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use studyforge_core::{merge_session, merge_wrong_answer, Clock, GlobalId, SystemClock};
    use tokio::sync::RwLock;

    #[derive(Debug, Default, Clone)]
    struct Account {
        sessions: BTreeMap<GlobalId, QuizSession>,
        wrong_answers: BTreeMap<GlobalId, WrongAnswer>,
    }

    /// In-memory gateway implementation.
    pub struct MemoryGateway {
        accounts: RwLock<HashMap<String, Account>>,
        /// When set, only these tokens are accepted.
        allowed: RwLock<Option<Vec<String>>>,
        reachable: AtomicBool,
        failure: RwLock<Option<GatewayError>>,
        latency: RwLock<Duration>,
        pushes: AtomicUsize,
        clock: Box<dyn Clock>,
    }

    impl MemoryGateway {
        /// Create a gateway that accepts any credential.
        pub fn new() -> Self {
            Self::with_clock(Box::new(SystemClock))
        }

        pub fn with_clock(clock: Box<dyn Clock>) -> Self {
            Self {
                accounts: RwLock::new(HashMap::new()),
                allowed: RwLock::new(None),
                reachable: AtomicBool::new(true),
                failure: RwLock::new(None),
                latency: RwLock::new(Duration::ZERO),
                pushes: AtomicUsize::new(0),
                clock,
            }
        }

        /// Accept only the listed credentials from now on.
        pub async fn restrict_to(&self, credentials: &[Credential]) {
            let tokens = credentials.iter().map(|c| c.expose().to_string()).collect();
            *self.allowed.write().await = Some(tokens);
        }

        /// Simulate losing or regaining connectivity.
        pub fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        /// Make every data call fail with `error` until cleared with `None`.
        pub async fn fail_with(&self, error: Option<GatewayError>) {
            *self.failure.write().await = error;
        }

        /// Delay every data call.
        pub async fn set_latency(&self, latency: Duration) {
            *self.latency.write().await = latency;
        }

        /// Number of successful pushes.
        pub fn push_count(&self) -> usize {
            self.pushes.load(Ordering::SeqCst)
        }

        /// Store records for an account as if another device had pushed them.
        pub async fn seed(
            &self,
            credential: &Credential,
            sessions: Vec<QuizSession>,
            wrong_answers: Vec<WrongAnswer>,
        ) {
            let mut accounts = self.accounts.write().await;
            let account = accounts.entry(credential.expose().to_string()).or_default();
            for s in sessions {
                account.sessions.insert(s.global_id.clone(), s);
            }
            for w in wrong_answers {
                account.wrong_answers.insert(w.global_id.clone(), w);
            }
        }

        pub async fn sessions_of(&self, credential: &Credential) -> Vec<QuizSession> {
            let accounts = self.accounts.read().await;
            accounts
                .get(credential.expose())
                .map(|a| a.sessions.values().cloned().collect())
                .unwrap_or_default()
        }

        pub async fn wrong_answers_of(&self, credential: &Credential) -> Vec<WrongAnswer> {
            let accounts = self.accounts.read().await;
            accounts
                .get(credential.expose())
                .map(|a| a.wrong_answers.values().cloned().collect())
                .unwrap_or_default()
        }

        /// Shared preamble of every data call.
        async fn admit(&self, credential: &Credential) -> Result<()> {
            let latency = *self.latency.read().await;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if !self.reachable.load(Ordering::SeqCst) {
                return Err(GatewayError::Transport("connection refused".into()));
            }
            if let Some(error) = self.failure.read().await.clone() {
                return Err(error);
            }
            if let Some(allowed) = self.allowed.read().await.as_ref() {
                if !allowed.iter().any(|t| t == credential.expose()) {
                    return Err(GatewayError::Unauthorized);
                }
            }
            Ok(())
        }
    }

    impl Default for MemoryGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RemoteGateway for MemoryGateway {
        async fn push(
            &self,
            credential: &Credential,
            sessions: &[QuizSession],
            wrong_answers: &[WrongAnswer],
        ) -> Result<PushResponse> {
            self.admit(credential).await?;

            let mut accounts = self.accounts.write().await;
            let account = accounts.entry(credential.expose().to_string()).or_default();
            for s in sessions {
                match account.sessions.get_mut(&s.global_id) {
                    Some(stored) => {
                        if let Some(update) = merge_session(stored, s) {
                            stored.apply(&update);
                        }
                    }
                    None => {
                        account.sessions.insert(s.global_id.clone(), s.clone());
                    }
                }
            }
            for w in wrong_answers {
                match account.wrong_answers.get_mut(&w.global_id) {
                    Some(stored) => {
                        if let Some(update) = merge_wrong_answer(stored, w) {
                            stored.apply(&update);
                        }
                    }
                    None => {
                        account.wrong_answers.insert(w.global_id.clone(), w.clone());
                    }
                }
            }
            self.pushes.fetch_add(1, Ordering::SeqCst);

            Ok(PushResponse {
                sessions: sessions.len(),
                wrong_answers: wrong_answers.len(),
                last_sync: Some(self.clock.now()),
            })
        }

        async fn pull_sessions(&self, credential: &Credential) -> Result<Vec<QuizSession>> {
            self.admit(credential).await?;
            Ok(self.sessions_of(credential).await)
        }

        async fn pull_wrong_answers(&self, credential: &Credential) -> Result<Vec<WrongAnswer>> {
            self.admit(credential).await?;
            Ok(self.wrong_answers_of(credential).await)
        }

        async fn health_check(&self, _credential: &Credential) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryGateway;
    use super::*;
    use studyforge_testkit::fixtures::{completed_session, wrong_answer};

    #[test]
    fn test_credential_debug_is_masked() {
        let credential = Credential::new("secret-token");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("secret"));
        assert_eq!(credential.expose(), "secret-token");
    }

    #[test]
    fn test_push_response_json() {
        let json = r#"{"sessions":2,"wrongAnswers":1,"lastSync":1700000000000}"#;
        let response: PushResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.sessions, 2);
        assert_eq!(response.wrong_answers, 1);
        assert_eq!(response.last_sync, Some(Timestamp::from_millis(1_700_000_000_000)));

        let bare: PushResponse = serde_json::from_str(r#"{"sessions":0,"wrongAnswers":0}"#).unwrap();
        assert_eq!(bare.last_sync, None);
    }

    #[tokio::test]
    async fn test_memory_gateway_upserts_by_global_id() {
        let gateway = MemoryGateway::new();
        let alice = Credential::new("alice");
        let bob = Credential::new("bob");

        let session = completed_session("exam", 1_000, 80);
        let mut wrong = wrong_answer("exam", "q1", 1, false, 1_000);

        gateway
            .push(&alice, &[session.clone()], &[wrong.clone()])
            .await
            .unwrap();
        wrong.wrong_count = 4;
        let response = gateway
            .push(&alice, &[session.clone()], &[wrong.clone()])
            .await
            .unwrap();
        assert_eq!(response.sessions, 1);

        // A stale copy from another device cannot lower the count.
        wrong.wrong_count = 2;
        wrong.mastered = true;
        gateway.push(&alice, &[session], &[wrong]).await.unwrap();

        let pulled = gateway.pull_wrong_answers(&alice).await.unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].wrong_count, 4);
        assert!(pulled[0].mastered);
        assert_eq!(gateway.pull_sessions(&alice).await.unwrap().len(), 1);

        assert!(gateway.pull_sessions(&bob).await.unwrap().is_empty());
        assert_eq!(gateway.push_count(), 3);
    }

    #[tokio::test]
    async fn test_memory_gateway_switches() {
        let gateway = MemoryGateway::new();
        let alice = Credential::new("alice");

        gateway.set_reachable(false);
        assert!(!gateway.health_check(&alice).await);
        assert!(matches!(
            gateway.pull_sessions(&alice).await,
            Err(GatewayError::Transport(_))
        ));

        gateway.set_reachable(true);
        gateway.restrict_to(&[Credential::new("bob")]).await;
        assert_eq!(
            gateway.pull_sessions(&alice).await.unwrap_err(),
            GatewayError::Unauthorized
        );

        gateway
            .fail_with(Some(GatewayError::Remote {
                status: 500,
                message: "boom".into(),
            }))
            .await;
        assert!(matches!(
            gateway.pull_wrong_answers(&Credential::new("bob")).await,
            Err(GatewayError::Remote { status: 500, .. })
        ));
    }
}
