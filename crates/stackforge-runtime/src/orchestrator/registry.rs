//! Process-wide map from project to live orchestrator.
//!
//! The registry upholds the one-live-orchestrator invariant: lookups for a
//! project whose entry is killed replace it with a fresh one, and the idle
//! sweeper kills orchestrators nobody has touched within the configured
//! window.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::gauge;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use stackforge_core::ids::ProjectId;
use stackforge_llm::backend::CompletionBackend;
use stackforge_sandbox::handle::Provisioner;

use crate::agent::AgentContext;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::orchestrator::Orchestrator;
use crate::store::MessageStore;

/// Owns every live orchestrator in the process.
pub struct OrchestratorRegistry {
    store: Arc<dyn MessageStore>,
    backend: Arc<dyn CompletionBackend>,
    provisioner: Arc<dyn Provisioner>,
    config: OrchestratorConfig,
    orchestrators: DashMap<ProjectId, Arc<Orchestrator>>,
}

impl OrchestratorRegistry {
    /// Registry over shared infrastructure handles.
    pub fn new(
        store: Arc<dyn MessageStore>,
        backend: Arc<dyn CompletionBackend>,
        provisioner: Arc<dyn Provisioner>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            backend,
            provisioner,
            config,
            orchestrators: DashMap::new(),
        })
    }

    /// The live orchestrator for a project, creating (or replacing a
    /// killed) one and starting its lifecycle loop.
    pub fn get_or_create(&self, project_id: ProjectId, context: AgentContext) -> Arc<Orchestrator> {
        let orchestrator = match self.orchestrators.entry(project_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_killed() {
                    let fresh = self.start(project_id, context);
                    *entry.get_mut() = Arc::clone(&fresh);
                    fresh
                } else {
                    Arc::clone(entry.get())
                }
            }
            Entry::Vacant(entry) => {
                let fresh = self.start(project_id, context);
                let _ = entry.insert(Arc::clone(&fresh));
                fresh
            }
        };
        self.record_gauge();
        orchestrator
    }

    fn start(&self, project_id: ProjectId, context: AgentContext) -> Arc<Orchestrator> {
        info!(%project_id, "starting orchestrator");
        let orchestrator = Orchestrator::new(
            project_id,
            context,
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
            Arc::clone(&self.provisioner),
            self.config.clone(),
        );
        let _ = orchestrator.spawn();
        orchestrator
    }

    /// The live orchestrator for a project, if any.
    pub fn get(&self, project_id: ProjectId) -> Option<Arc<Orchestrator>> {
        self.orchestrators
            .get(&project_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the entry if its orchestrator is killed and unobserved. Called
    /// by the transport when a disconnect leaves a dead orchestrator
    /// behind.
    pub fn remove_if_dead(&self, project_id: ProjectId) {
        let _ = self
            .orchestrators
            .remove_if(&project_id, |_, o| o.is_killed() && !o.has_connections());
        self.record_gauge();
    }

    /// Kill orchestrators with no open connections that have been idle past
    /// the configured window, and drop dead, unobserved entries.
    #[instrument(skip_all)]
    pub async fn sweep_inactive(&self) {
        let idle: Vec<Arc<Orchestrator>> = self
            .orchestrators
            .iter()
            .filter(|entry| {
                !entry.value().is_killed()
                    && !entry.value().has_connections()
                    && entry.value().idle_for() >= self.config.idle_after
            })
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for orchestrator in idle {
            info!(project_id = %orchestrator.project_id(), "killing idle orchestrator");
            orchestrator.kill().await;
        }
        self.orchestrators
            .retain(|_, o| !o.is_killed() || o.has_connections());
        self.record_gauge();
    }

    /// Periodic idle sweep.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                let _ = ticker.tick().await;
                registry.sweep_inactive().await;
            }
        })
    }

    /// Kill everything; used on server shutdown.
    pub async fn shutdown(&self) {
        let all: Vec<Arc<Orchestrator>> = self
            .orchestrators
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for orchestrator in all {
            orchestrator.kill().await;
        }
        self.orchestrators.clear();
        self.record_gauge();
    }

    /// Number of registered orchestrators (live or pending removal).
    pub fn len(&self) -> usize {
        self.orchestrators.len()
    }

    /// Whether no orchestrators are registered.
    pub fn is_empty(&self) -> bool {
        self.orchestrators.is_empty()
    }

    fn record_gauge(&self) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("orchestrators_live").set(self.orchestrators.len() as f64);
    }
}
