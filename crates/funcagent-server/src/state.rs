use funcagent_core::benchmark::{all_benchmarks, BenchmarkHarness, BenchmarkHistory};
use funcagent_core::config::AgentConfig;
use funcagent_core::connections::provider::ResourceProvider;
use funcagent_core::connections::{configured_provider, ConnectionTarget};
use funcagent_core::model::LanguageModel;
use funcagent_core::session::ChatSession;
use funcagent_core::{paths, Agent};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Chat sessions by id, evicting the least recently stored past `capacity`.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<Uuid, ChatSession>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn take(&mut self, id: Uuid) -> Option<ChatSession> {
        let session = self.sessions.remove(&id)?;
        self.order.retain(|o| *o != id);
        Some(session)
    }

    pub fn store(&mut self, id: Uuid, session: ChatSession) {
        if self.sessions.insert(id, session).is_some() {
            self.order.retain(|o| *o != id);
        }
        self.order.push_back(id);
        while self.sessions.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.sessions.remove(&oldest);
            tracing::debug!(session = %oldest, "session evicted");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<AgentConfig>,
    pub agent: Arc<Agent>,
    pub provider: Arc<dyn ResourceProvider>,
    pub benchmarks: Arc<BenchmarkHarness>,
    /// Held for the whole of a benchmark run, so runs never interleave.
    pub history: Arc<tokio::sync::Mutex<BenchmarkHistory>>,
    pub sessions: Arc<Mutex<SessionStore>>,
    /// Cancels routing and wizard runs that take longer than this.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(root: PathBuf, config: AgentConfig, model: Arc<dyn LanguageModel>) -> anyhow::Result<Self> {
        let provider = Arc::new(configured_provider(&root, &config.resources)?);
        Self::with_provider(root, config, model, provider)
    }

    pub fn with_provider(
        root: PathBuf,
        config: AgentConfig,
        model: Arc<dyn LanguageModel>,
        provider: Arc<dyn ResourceProvider>,
    ) -> anyhow::Result<Self> {
        let agent = Arc::new(Agent::from_config(model, &config)?);
        let fixtures = config.benchmarks.fixtures.as_deref().map(|p| paths::resolve(&root, p));
        let harness = BenchmarkHarness::new(agent.clone(), all_benchmarks(fixtures.as_deref())?)?;
        let history = BenchmarkHistory::load(&history_path(&root, &config))?;

        Ok(Self {
            root,
            config: Arc::new(config),
            agent,
            provider,
            benchmarks: Arc::new(harness),
            history: Arc::new(tokio::sync::Mutex::new(history)),
            sessions: Arc::new(Mutex::new(SessionStore::new(DEFAULT_MAX_SESSIONS))),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.sessions = Arc::new(Mutex::new(SessionStore::new(max)));
        self
    }

    pub fn history_path(&self) -> PathBuf {
        history_path(&self.root, &self.config)
    }

    /// A connection target for the configured resource group.
    pub fn connection_target(&self, project_path: Option<PathBuf>) -> ConnectionTarget {
        ConnectionTarget::from_config(self.provider.clone(), &self.config.resources, project_path)
    }

    pub fn take_session(&self, id: Uuid) -> ChatSession {
        self.sessions
            .lock()
            .ok()
            .and_then(|mut s| s.take(id))
            .unwrap_or_default()
    }

    pub fn store_session(&self, id: Uuid, session: ChatSession) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.store(id, session);
        }
    }
}

fn history_path(root: &Path, config: &AgentConfig) -> PathBuf {
    paths::resolve(root, &config.benchmarks.history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use funcagent_core::testing::ScriptedModel;

    #[test]
    fn new_state_loads_builtin_benchmarks() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(
            dir.path().to_path_buf(),
            AgentConfig::default(),
            Arc::new(ScriptedModel::new()),
        )
        .unwrap();
        assert!(!state.benchmarks.benchmarks().is_empty());
        assert_eq!(
            state.history_path(),
            dir.path().join(".funcagent/benchmarks/history.json")
        );
    }

    #[test]
    fn sessions_are_taken_and_stored() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(
            dir.path().to_path_buf(),
            AgentConfig::default(),
            Arc::new(ScriptedModel::new()),
        )
        .unwrap();
        let id = Uuid::new_v4();
        let mut session = state.take_session(id);
        session.record("hi", None);
        state.store_session(id, session);
        assert_eq!(state.take_session(id).history.len(), 1);
        assert!(state.take_session(id).history.is_empty());
    }

    #[test]
    fn least_recently_stored_session_is_evicted() {
        let mut store = SessionStore::new(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.store(a, ChatSession::new());
        store.store(b, ChatSession::new());
        // a is used again, so b is now the oldest
        let session = store.take(a).unwrap();
        store.store(a, session);
        store.store(c, ChatSession::new());
        assert_eq!(store.len(), 2);
        assert!(store.contains(&a) && store.contains(&c));
        assert!(!store.contains(&b));
    }
}
