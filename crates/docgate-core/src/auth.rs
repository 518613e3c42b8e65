//! Password-session lifecycle management.
//!
//! The token channel has no state machine: it is authenticated by
//! construction. The password channel's session is the one piece of shared
//! mutable state in the crate, owned and exclusively mutated here.

use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::channel::Channel;

/// Validity window measured from the last *successful* authentication.
pub const SESSION_VALIDITY: Duration = Duration::minutes(30);

/// Observable password-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthSession {
    pub authenticated: bool,
    pub last_success_at: Option<OffsetDateTime>,
}

impl AuthSession {
    /// Whether the last successful login is still inside the validity
    /// window. A failed attempt never extends the window: failures clear
    /// `authenticated` without touching `last_success_at`.
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.authenticated
            && self
                .last_success_at
                .is_some_and(|at| now - at < SESSION_VALIDITY)
    }

    fn record_success(&mut self, now: OffsetDateTime) {
        self.authenticated = true;
        self.last_success_at = Some(now);
    }

    fn record_failure(&mut self) {
        self.authenticated = false;
    }
}

enum Role {
    /// This caller performs the login round-trip.
    Leader(watch::Sender<Option<bool>>),
    /// This caller waits on an attempt already in flight.
    Follower(watch::Receiver<Option<bool>>),
}

struct SessionState {
    session: AuthSession,
    in_flight: Option<watch::Receiver<Option<bool>>>,
}

/// Owns the two authentication strategies and the password-session
/// lifecycle. Created once at process start and shared for the process
/// lifetime.
pub struct CredentialManager {
    channel: Arc<dyn Channel>,
    username: Option<String>,
    password: Option<String>,
    state: Mutex<SessionState>,
}

impl CredentialManager {
    pub fn new(channel: Arc<dyn Channel>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            channel,
            username,
            password,
            state: Mutex::new(SessionState {
                session: AuthSession::default(),
                in_flight: None,
            }),
        }
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> AuthSession {
        self.state.lock().expect("auth state lock poisoned").session
    }

    /// Authenticate the password session, returning whether it is usable.
    ///
    /// Missing username or password is a policy outcome (`false`), not an
    /// upstream error. A session younger than [`SESSION_VALIDITY`] short
    /// circuits to `true` without contacting upstream. Concurrent callers
    /// while a login is in flight wait on that attempt's completion signal
    /// and share its outcome; at most one login round-trip is ever in
    /// flight.
    pub async fn authenticate_with_password(&self) -> bool {
        let (Some(username), Some(password)) = (self.username.clone(), self.password.clone()) else {
            let mut state = self.state.lock().expect("auth state lock poisoned");
            state.session.record_failure();
            return false;
        };

        let role = {
            let mut state = self.state.lock().expect("auth state lock poisoned");
            if state.session.is_fresh(OffsetDateTime::now_utc()) {
                return true;
            }
            match &state.in_flight {
                Some(receiver) => Role::Follower(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    state.in_flight = Some(receiver);
                    Role::Leader(sender)
                }
            }
        };

        match role {
            Role::Follower(mut receiver) => loop {
                if let Some(outcome) = *receiver.borrow_and_update() {
                    return outcome;
                }
                if receiver.changed().await.is_err() {
                    // Leader vanished without reporting; treat as a failed attempt.
                    return false;
                }
            },
            Role::Leader(sender) => {
                let outcome = self.perform_login(&username, &password).await;
                {
                    let mut state = self.state.lock().expect("auth state lock poisoned");
                    if outcome {
                        state.session.record_success(OffsetDateTime::now_utc());
                    } else {
                        state.session.record_failure();
                    }
                    state.in_flight = None;
                }
                let _ = sender.send(Some(outcome));
                outcome
            }
        }
    }

    async fn perform_login(&self, username: &str, password: &str) -> bool {
        match self.channel.login(username, password).await {
            Ok(()) => {
                debug!(username, "password authentication succeeded");
                true
            }
            Err(error) => {
                warn!(username, %error, "password authentication failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_requires_success_inside_window() {
        let now = OffsetDateTime::now_utc();

        let mut session = AuthSession::default();
        assert!(!session.is_fresh(now));

        session.record_success(now - Duration::minutes(29));
        assert!(session.is_fresh(now));

        session.record_success(now - Duration::minutes(31));
        assert!(!session.is_fresh(now));
    }

    #[test]
    fn failure_clears_authenticated_without_extending_window() {
        let now = OffsetDateTime::now_utc();
        let mut session = AuthSession::default();
        session.record_success(now - Duration::minutes(5));
        assert!(session.is_fresh(now));

        session.record_failure();
        assert!(!session.is_fresh(now));
        // The old success timestamp survives for observability, but a
        // failed attempt never restores freshness on its own.
        assert_eq!(session.last_success_at, Some(now - Duration::minutes(5)));
    }
}
