use crate::models::ConversationTurn;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted. `None` keeps every
    /// session for the life of the process.
    pub idle_ttl: Option<chrono::Duration>,
    pub sweep_every: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let idle_ttl = std::env::var("SESSION_IDLE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(chrono::Duration::seconds);
        let sweep_every = std::env::var("SESSION_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(60);
        Self {
            idle_ttl,
            sweep_every: Duration::from_secs(sweep_every),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: None,
            sweep_every: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
    in_flight: AtomicUsize,
}

#[derive(Debug)]
struct SessionState {
    transcript: Vec<ConversationTurn>,
    last_active: DateTime<Utc>,
}

impl Session {
    fn new(id: &str, system_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Mutex::new(SessionState {
                transcript: vec![ConversationTurn::System(system_prompt.to_string())],
                last_active: Utc::now(),
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[allow(dead_code)]
    pub async fn append_turn(&self, turn: ConversationTurn) {
        self.append_turns([turn]).await;
    }

    /// Appends every turn under one lock acquisition so a user/assistant
    /// pair from one request is never split by a concurrent request.
    pub async fn append_turns(&self, turns: impl IntoIterator<Item = ConversationTurn>) {
        let mut guard = self.state.lock().await;
        guard.transcript.extend(turns);
        guard.last_active = Utc::now();
    }

    pub async fn snapshot(&self) -> Vec<ConversationTurn> {
        let mut guard = self.state.lock().await;
        guard.last_active = Utc::now();
        guard.transcript.clone()
    }

    /// `None` while a turn is in progress or the lock is held.
    fn idle_since(&self) -> Option<DateTime<Utc>> {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            return None;
        }
        self.state.try_lock().ok().map(|guard| guard.last_active)
    }
}

/// A session checked out for one turn. Eviction skips the session until
/// every outstanding `ActiveTurn` is dropped.
pub struct ActiveTurn {
    session: Arc<Session>,
}

impl Deref for ActiveTurn {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for ActiveTurn {
    fn drop(&mut self) {
        self.session.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Process-wide registry of conversations keyed by session id.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Session>>,
    system_prompt: String,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(system_prompt: String, config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            system_prompt,
            config,
        }
    }

    /// Returns the session for `id`, creating it with the system turn on
    /// first use. The shard lock makes lookup-or-insert atomic.
    #[allow(dead_code)]
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(existing) = self.sessions.get(id) {
            return existing.clone();
        }
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(target = "hungry.session", session_id = id, "session_created");
                Arc::new(Session::new(id, &self.system_prompt))
            })
            .clone()
    }

    /// Like `get_or_create`, but pins the session against eviction for the
    /// lifetime of the returned guard. The counter is bumped under the shard
    /// lock so a concurrent sweep cannot slip in between.
    pub fn begin_turn(&self, id: &str) -> ActiveTurn {
        let entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(target = "hungry.session", session_id = id, "session_created");
                Arc::new(Session::new(id, &self.system_prompt))
            });
        entry.in_flight.fetch_add(1, Ordering::AcqRel);
        ActiveTurn {
            session: entry.clone(),
        }
    }

    #[allow(dead_code)]
    pub async fn snapshot_by_id(&self, id: &str) -> Option<Vec<ConversationTurn>> {
        let session = self.sessions.get(id).map(|entry| entry.clone())?;
        Some(session.snapshot().await)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions idle past the configured TTL. No-op when eviction is
    /// disabled. Returns how many sessions were removed.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.config.idle_ttl else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.idle_since() {
            Some(last_active) => now - last_active <= ttl,
            None => true,
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Starts the periodic eviction task when an idle TTL is configured.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.config.idle_ttl?;
        let store = Arc::clone(self);
        let every = self.config.sweep_every;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(Utc::now());
                if evicted > 0 {
                    info!(
                        target = "hungry.session",
                        evicted,
                        remaining = store.len(),
                        "idle_sessions_evicted"
                    );
                }
            }
        }))
    }
}
