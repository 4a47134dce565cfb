//! Agent lifecycle controller: list, deploy, status and stop over the
//! [`StatusStore`], plus the deferred automation pass triggered by deploy.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use gramdeck_common::{
    AgentAvailability, AgentDescriptor, AgentStatusView, DeploymentInfo, DeploymentState,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::automation::AutomationClient;
use crate::error::LifecycleError;
use crate::store::{Generation, StatusStore};

/// The static agent catalog served by `list`.
#[must_use]
pub fn default_catalog() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor {
            id: "content-creator".to_string(),
            name: "Content Creator Agent".to_string(),
            description: "Automatically generates and posts engaging content".to_string(),
            status: AgentAvailability::Available,
        },
        AgentDescriptor {
            id: "engagement-bot".to_string(),
            name: "Engagement Manager".to_string(),
            description: "Intelligently likes, comments, and follows accounts".to_string(),
            status: AgentAvailability::Available,
        },
        AgentDescriptor {
            id: "analytics-tracker".to_string(),
            name: "Analytics Tracker".to_string(),
            description: "Tracks performance metrics and provides insights".to_string(),
            status: AgentAvailability::Premium,
        },
    ]
}

/// Tunables for [`AgentController`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Deploying this id schedules an automation pass.
    pub engagement_agent_id: String,
    /// Delay between a successful deploy and the automation pass.
    pub deploy_delay: Duration,
    pub catalog: Vec<AgentDescriptor>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            engagement_agent_id: "engagement-bot".to_string(),
            deploy_delay: Duration::from_secs(1),
            catalog: default_catalog(),
        }
    }
}

/// Owns the status store and supervises deploy-triggered automation passes.
pub struct AgentController {
    store: StatusStore,
    client: Arc<dyn AutomationClient>,
    settings: ControllerSettings,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

impl std::fmt::Debug for AgentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentController")
            .field("store", &self.store)
            .field("client", &"<AutomationClient>")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AgentController {
    pub fn new(
        store: StatusStore,
        client: Arc<dyn AutomationClient>,
        settings: ControllerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            client,
            settings,
            tasks: TaskTracker::new(),
            cancel,
        }
    }

    #[must_use]
    pub fn list(&self) -> &[AgentDescriptor] {
        &self.settings.catalog
    }

    /// Mark `agent_id` as running and return immediately.
    ///
    /// Deploying the engagement agent also schedules an automation pass
    /// after `deploy_delay`. The pass is not awaited; if it fails, the store
    /// is reset to idle provided this deployment is still the active one.
    pub fn deploy(&self, agent_id: Option<&str>) -> Result<DeploymentInfo, LifecycleError> {
        let agent_id = match agent_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(LifecycleError::MissingAgentId),
        };

        let (status, generation) = self
            .store
            .try_start(agent_id, Utc::now())
            .inspect_err(|e| {
                if let LifecycleError::AlreadyRunning { active } = e {
                    tracing::warn!(
                        requested = agent_id,
                        active = active.as_deref().unwrap_or("<unknown>"),
                        "deploy rejected, another agent is running"
                    );
                }
            })?;
        tracing::info!(agent_id, generation, "deploying agent");

        if agent_id == self.settings.engagement_agent_id {
            self.schedule_pass(agent_id.to_string(), generation);
        }

        let start_time = status.start_time.unwrap_or_else(Utc::now);
        Ok(DeploymentInfo {
            agent_id: agent_id.to_string(),
            status: DeploymentState::Running,
            start_time,
        })
    }

    #[must_use]
    pub fn status(&self) -> AgentStatusView {
        let status = self.store.snapshot();
        let uptime = status.uptime_ms(Utc::now());
        AgentStatusView { status, uptime }
    }

    /// Reset to idle. Succeeds whatever the prior state.
    pub fn stop(&self) {
        let previous = self.store.reset();
        match previous.agent_id {
            Some(agent_id) => tracing::info!(%agent_id, "stopping agent"),
            None => tracing::info!("stop requested with no active agent"),
        }
    }

    /// Stop accepting new passes and wait up to `grace` for in-flight ones.
    ///
    /// Returns `false` if the grace period elapsed first.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_ok() {
            true
        } else {
            tracing::warn!(
                pending = self.tasks.len(),
                "automation passes still running after shutdown grace period"
            );
            false
        }
    }

    /// Number of deploy-triggered passes not yet settled.
    #[must_use]
    pub fn pending_passes(&self) -> usize {
        self.tasks.len()
    }

    fn schedule_pass(&self, agent_id: String, generation: Generation) {
        let store = self.store.clone();
        let client = Arc::clone(&self.client);
        let cancel = self.cancel.clone();
        let delay = self.settings.deploy_delay;

        self.tasks.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(%agent_id, "deferred automation pass cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            if !store.is_current(generation) {
                tracing::info!(%agent_id, "agent stopped before automation pass started; skipping");
                return;
            }

            tracing::info!(%agent_id, "starting automation pass");
            let outcome = AssertUnwindSafe(client.run_pass()).catch_unwind().await;
            let failure = match outcome {
                Ok(Ok(())) => {
                    // Agent stays marked running after a successful pass.
                    tracing::info!(%agent_id, "automation pass finished");
                    return;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => "automation pass panicked".to_string(),
            };

            tracing::error!(%agent_id, error = %failure, "automation agent error");
            if store.reset_if_current(generation) {
                tracing::warn!(%agent_id, "agent reset to idle after failed automation pass");
            }
        });
    }
}
