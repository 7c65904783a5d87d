//! The `Baton` facade.
//!
//! Bundles the lock manager, context store, conflict inspector, preflight
//! gate and handoff recorder over one store directory. Every component reads
//! from disk, so any number of `Baton` handles (in one process or many) can
//! share a store.
//!
//! ```no_run
//! use baton::Baton;
//!
//! let baton = Baton::discover()?;
//! let outcome = baton.acquire("src/lib.rs", "agent-a", "T-12", None)?;
//! if outcome.is_granted() {
//!     // edit, then
//!     baton.release("src/lib.rs", "agent-a")?;
//! }
//! # Ok::<(), baton::error::BatonError>(())
//! ```

use crate::config::Config;
use crate::context::{StoreContext, require_store};
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, EventLog, default_actor};
use crate::fingerprint::{ContextStore, ContextUpdate};
use crate::fs::atomic_write_file;
use crate::handoff::{HandoffOutcome, HandoffRecorder, HandoffRequest, HandoffSnapshot};
use crate::inspect::{ConflictInspector, ConflictReport, ContextView, LockFilter};
use crate::locks::{
    AcquireOutcome, BatchOutcome, Lock, LockManager, ReleaseOutcome, RenewOutcome,
};
use crate::preflight::{GateState, PreflightGate, PreflightOptions, PreflightResult};
use crate::store::GuardSettings;
use chrono::Utc;
use serde_json::json;
use std::path::Path;

const CONFIG_HEADER: &str = "\
# baton configuration
#
# Lock ttls are in seconds. A requested ttl above max_ttl_secs is clamped.
# Suites are run by `baton preflight`; commands are split like a shell would
# but run without one, from the repository root.
";

/// Point-in-time summary of a store, for `baton status`.
#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub active_locks: usize,
    pub stale_locks: usize,
    pub contexts: usize,
    pub stale_contexts: usize,
    pub last_preflight: Option<PreflightResult>,
    pub last_handoff: Option<HandoffSnapshot>,
}

/// Handle to one baton store.
#[derive(Debug)]
pub struct Baton {
    ctx: StoreContext,
    config: Config,
    locks: LockManager,
    contexts: ContextStore,
    inspector: ConflictInspector,
    gate: PreflightGate,
    handoffs: HandoffRecorder,
    events: EventLog,
}

impl Baton {
    /// Create the store under `root` (idempotent) and open it.
    ///
    /// An existing `config.yaml` is kept as is.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self> {
        let ctx = StoreContext::at(root);
        let fresh = !ctx.store_exists();
        ctx.create_layout()?;

        let config_path = ctx.config_path();
        if !config_path.exists() {
            let yaml = Config::default().to_yaml()?;
            atomic_write_file(&config_path, &format!("{}\n{}", CONFIG_HEADER, yaml))?;
        }

        let baton = Self::open(ctx)?;
        if fresh {
            baton.events.append(
                &Event::new(EventAction::Init, default_actor())
                    .with_details(json!({ "store": baton.ctx.store_dir })),
            )?;
            tracing::info!(store = %baton.ctx.store_dir.display(), "initialized store");
        }
        Ok(baton)
    }

    /// Open an existing store.
    pub fn open(ctx: StoreContext) -> Result<Self> {
        if !ctx.store_exists() {
            return Err(BatonError::UserError(format!(
                "no baton store at '{}'. Run `baton init` first.",
                ctx.store_dir.display()
            )));
        }
        let config = Config::load_or_default(ctx.config_path())?;
        Ok(Self::with_config(ctx, config))
    }

    /// Open the store found by walking up from the working directory.
    pub fn discover() -> Result<Self> {
        Self::open(require_store()?)
    }

    /// Build a handle with an explicit config, without reading `config.yaml`.
    pub fn with_config(ctx: StoreContext, config: Config) -> Self {
        let locks = LockManager::new(&ctx, config.clone());
        let contexts = ContextStore::new(&ctx, GuardSettings::from_config(&config));
        let inspector = ConflictInspector::new(
            locks.store().clone(),
            contexts.clone(),
            config.context_stale_after(),
        );
        let handoffs = HandoffRecorder::new(&ctx, locks.store().clone());
        let gate = PreflightGate::new(&ctx, config.clone(), handoffs.clone());
        let events = EventLog::new(&ctx);

        Self {
            ctx,
            config,
            locks,
            contexts,
            inspector,
            gate,
            handoffs,
            events,
        }
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn inspect<S: AsRef<str>>(&self, paths: &[S], requesting_agent: &str) -> Result<ConflictReport> {
        self.inspector.inspect(paths, requesting_agent)
    }

    pub fn list_active(&self, filter: &LockFilter) -> Result<Vec<Lock>> {
        self.inspector.list_active(filter)
    }

    pub fn list_contexts(&self) -> Result<Vec<ContextView>> {
        self.inspector.list_contexts()
    }

    pub fn list_events(&self) -> Result<Vec<Event>> {
        self.events.read_all()
    }

    /// The last `n` audit events, oldest first.
    pub fn recent_events(&self, n: usize) -> Result<Vec<Event>> {
        self.events.tail(n)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn acquire(
        &self,
        file_path: &str,
        agent_id: &str,
        task_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<AcquireOutcome> {
        self.locks.acquire(file_path, agent_id, task_id, ttl_secs)
    }

    pub fn acquire_batch<S: AsRef<str>>(
        &self,
        paths: &[S],
        agent_id: &str,
        task_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<BatchOutcome> {
        self.locks.acquire_batch(paths, agent_id, task_id, ttl_secs)
    }

    pub fn release(&self, file_path: &str, agent_id: &str) -> Result<ReleaseOutcome> {
        self.locks.release(file_path, agent_id)
    }

    pub fn release_all(&self, agent_id: &str) -> Result<Vec<Lock>> {
        self.locks.release_all(agent_id)
    }

    pub fn renew(&self, file_path: &str, agent_id: &str, ttl_secs: Option<u64>) -> Result<RenewOutcome> {
        self.locks.renew(file_path, agent_id, ttl_secs)
    }

    pub fn sweep_expired(&self, actor: &str) -> Result<usize> {
        self.locks.sweep_expired(actor)
    }

    pub fn update_context<S: AsRef<str>>(
        &self,
        agent_id: &str,
        task_id: &str,
        files: &[S],
    ) -> Result<ContextUpdate> {
        self.contexts.update(agent_id, task_id, files)
    }

    // ------------------------------------------------------------------
    // Gate and handoff
    // ------------------------------------------------------------------

    pub fn run_preflight(&self, options: &PreflightOptions) -> Result<PreflightResult> {
        self.gate.run(options)
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn list_preflight_runs(&self) -> Result<Vec<PreflightResult>> {
        self.gate.list_runs()
    }

    pub fn find_preflight(&self, run_id: &str) -> Result<Option<PreflightResult>> {
        self.gate.find_run(run_id)
    }

    pub fn latest_preflight(&self) -> Result<Option<PreflightResult>> {
        self.gate.latest_run()
    }

    /// Latest preflight run made by `agent_id`; other agents' runs are skipped.
    pub fn latest_preflight_for(&self, agent_id: &str) -> Result<Option<PreflightResult>> {
        self.gate.latest_run_for(agent_id)
    }

    /// Absolute path of a run's output log.
    pub fn preflight_log_path(&self, result: &PreflightResult) -> std::path::PathBuf {
        self.gate.log_path(result)
    }

    pub fn record_handoff(&self, request: &HandoffRequest) -> Result<HandoffOutcome> {
        self.handoffs.record(request)
    }

    pub fn list_handoffs(&self) -> Result<Vec<HandoffSnapshot>> {
        self.handoffs.list()
    }

    /// Counts and latest history entries for a quick overview.
    pub fn status(&self) -> Result<StatusSummary> {
        let now = Utc::now();
        let locks = self.locks.store().list()?;
        let stale_locks = locks.iter().filter(|l| l.is_expired_at(now)).count();
        let contexts = self.inspector.list_contexts()?;

        Ok(StatusSummary {
            active_locks: locks.len() - stale_locks,
            stale_locks,
            contexts: contexts.len(),
            stale_contexts: contexts.iter().filter(|c| c.stale).count(),
            last_preflight: self.gate.latest_run()?,
            last_handoff: self.handoffs.latest()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::HandoffRequest;
    use crate::preflight::{PreflightMode, Verdict};
    use crate::test_support::{DirGuard, quick_config};
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout_and_config() {
        let temp_dir = TempDir::new().unwrap();

        let baton = Baton::init(temp_dir.path()).unwrap();

        let ctx = baton.context();
        assert!(ctx.locks_dir.is_dir());
        assert!(ctx.contexts_dir.is_dir());
        assert!(ctx.logs_dir().is_dir());
        let yaml = std::fs::read_to_string(ctx.config_path()).unwrap();
        assert!(yaml.starts_with("# baton configuration"));
        assert_eq!(Config::from_yaml(&yaml).unwrap().default_ttl_secs, 900);

        let events = baton.list_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, EventAction::Init);
    }

    #[test]
    fn test_init_is_idempotent_and_keeps_config() {
        let temp_dir = TempDir::new().unwrap();
        let baton = Baton::init(temp_dir.path()).unwrap();
        std::fs::write(baton.context().config_path(), "default_ttl_secs: 60\n").unwrap();

        let again = Baton::init(temp_dir.path()).unwrap();

        assert_eq!(again.config().default_ttl_secs, 60);
        assert_eq!(again.list_events().unwrap().len(), 1);
    }

    #[test]
    fn test_open_requires_store() {
        let temp_dir = TempDir::new().unwrap();

        let err = Baton::open(StoreContext::at(temp_dir.path())).unwrap_err();

        assert!(matches!(err, BatonError::UserError(_)));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let baton = Baton::init(temp_dir.path()).unwrap();
        std::fs::write(baton.context().config_path(), "default_ttl_secs: 0\n").unwrap();

        assert!(Baton::open(StoreContext::at(temp_dir.path())).is_err());
    }

    #[test]
    #[serial]
    fn test_discover_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        Baton::init(temp_dir.path()).unwrap();
        let nested = temp_dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        let _guard = DirGuard::new(&nested);

        let baton = Baton::discover().unwrap();

        assert_eq!(
            baton.context().repo_root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let baton = Baton::init(temp_dir.path()).unwrap();
        baton.acquire("a.rs", "a", "T", None).unwrap();
        baton.update_context("a", "T", &["a.rs"]).unwrap();
        drop(baton);

        let reopened = Baton::open(StoreContext::at(temp_dir.path())).unwrap();

        let locks = reopened.list_active(&LockFilter::default()).unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].owner_agent_id, "a");
        assert_eq!(reopened.list_contexts().unwrap().len(), 1);
        assert!(!reopened.acquire("a.rs", "b", "T", None).unwrap().is_granted());
    }

    #[test]
    fn test_session_flow_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StoreContext::at(temp_dir.path());
        ctx.create_layout().unwrap();
        let baton = Baton::with_config(ctx, quick_config());

        baton.update_context("a", "T-1", &["src/lib.rs"]).unwrap();
        assert!(!baton.inspect(&["src/lib.rs"], "a").unwrap().has_conflicts());
        assert!(baton.acquire("src/lib.rs", "a", "T-1", None).unwrap().is_granted());

        // Still holding the lock: the gate's self-check fails and handoff blocks.
        let early = baton
            .run_preflight(&PreflightOptions::new(PreflightMode::Quick).with_agent("a"))
            .unwrap();
        assert_eq!(early.verdict, Verdict::Failed);
        assert!(!baton
            .record_handoff(&HandoffRequest::new("s-1", "a", early))
            .unwrap()
            .is_recorded());

        baton.release("src/lib.rs", "a").unwrap();
        let run = baton
            .run_preflight(&PreflightOptions::new(PreflightMode::Quick).with_agent("a"))
            .unwrap();
        assert_eq!(run.verdict, Verdict::Passed);
        assert!(baton
            .record_handoff(&HandoffRequest::new("s-1", "a", run.clone()))
            .unwrap()
            .is_recorded());

        let status = baton.status().unwrap();
        assert_eq!(status.active_locks, 0);
        assert_eq!(status.contexts, 1);
        assert_eq!(status.last_preflight.map(|r| r.run_id), Some(run.run_id.clone()));
        assert_eq!(status.last_handoff.unwrap().preflight_run_id, run.run_id);
        assert_eq!(baton.list_preflight_runs().unwrap().len(), 2);
        assert_eq!(baton.list_handoffs().unwrap().len(), 1);
        assert_eq!(baton.gate_state(), GateState::Passed);

        let recent = baton.recent_events(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].action, EventAction::Handoff);
    }
}
