//! The single process-wide agent status record.
//!
//! Every write replaces the whole record under one lock, so readers
//! never observe a partially updated status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gramdeck_common::AgentStatus;
use parking_lot::Mutex;

use crate::error::LifecycleError;

/// Identifies one successful deploy. Incremented on every transition to running.
pub type Generation = u64;

#[derive(Debug, Default)]
struct Inner {
    status: AgentStatus,
    generation: Generation,
}

/// Shared, cloneable handle to the status record.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<Mutex<Inner>>,
}

impl StatusStore {
    /// A store in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> AgentStatus {
        self.inner.lock().status.clone()
    }

    /// Mark `agent_id` as running unless another agent already is.
    ///
    /// The check and the write happen under the same lock.
    pub fn try_start(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(AgentStatus, Generation), LifecycleError> {
        let mut inner = self.inner.lock();
        if inner.status.is_running {
            return Err(LifecycleError::AlreadyRunning {
                active: inner.status.agent_id.clone(),
            });
        }
        inner.generation += 1;
        inner.status = AgentStatus::running(agent_id, now);
        Ok((inner.status.clone(), inner.generation))
    }

    /// Reset to idle regardless of the current state.
    pub fn reset(&self) -> AgentStatus {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.status)
    }

    /// Reset to idle only if `generation` is still the active deployment.
    ///
    /// Returns whether the reset happened.
    pub fn reset_if_current(&self, generation: Generation) -> bool {
        let mut inner = self.inner.lock();
        if inner.status.is_running && inner.generation == generation {
            inner.status = AgentStatus::idle();
            true
        } else {
            false
        }
    }

    /// Whether `generation` is still the active deployment.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        let inner = self.inner.lock();
        inner.status.is_running && inner.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_idle(status: &AgentStatus) {
        assert!(!status.is_running);
        assert!(status.agent_id.is_none());
        assert!(status.start_time.is_none());
        assert!(status.last_activity.is_none());
    }

    #[test]
    fn new_store_is_idle() {
        assert_idle(&StatusStore::new().snapshot());
    }

    #[test]
    fn second_start_is_rejected_without_touching_record() {
        let store = StatusStore::new();
        let now = Utc::now();
        store.try_start("content-creator", now).unwrap();

        let err = store.try_start("engagement-bot", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::AlreadyRunning {
                active: Some("content-creator".into())
            }
        );

        let status = store.snapshot();
        assert_eq!(status.agent_id.as_deref(), Some("content-creator"));
        assert_eq!(status.start_time, Some(now));
    }

    #[test]
    fn reset_returns_previous_record() {
        let store = StatusStore::new();
        store.try_start("content-creator", Utc::now()).unwrap();
        let previous = store.reset();
        assert_eq!(previous.agent_id.as_deref(), Some("content-creator"));
        assert_idle(&store.snapshot());
    }

    #[test]
    fn stale_generation_does_not_reset_newer_deploy() {
        let store = StatusStore::new();
        let (_, first) = store.try_start("engagement-bot", Utc::now()).unwrap();
        store.reset();
        let (_, second) = store.try_start("content-creator", Utc::now()).unwrap();

        assert!(!store.is_current(first));
        assert!(!store.reset_if_current(first));
        assert_eq!(store.snapshot().agent_id.as_deref(), Some("content-creator"));

        assert!(store.reset_if_current(second));
        assert_idle(&store.snapshot());
    }

    #[test]
    fn concurrent_starts_admit_exactly_one() {
        let store = StatusStore::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.try_start(&format!("agent-{i}"), Utc::now()).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start(String),
        Stop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(Op::Start),
            Just(Op::Stop),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_agent_runs_until_stopped(ops in prop::collection::vec(op(), 0..40)) {
            let store = StatusStore::new();
            let mut expected: Option<String> = None;
            for op in ops {
                match op {
                    Op::Start(id) => {
                        let result = store.try_start(&id, Utc::now());
                        if expected.is_some() {
                            prop_assert!(result.is_err());
                        } else {
                            prop_assert!(result.is_ok());
                            expected = Some(id);
                        }
                    }
                    Op::Stop => {
                        store.reset();
                        expected = None;
                    }
                }
                let status = store.snapshot();
                prop_assert_eq!(status.is_running, expected.is_some());
                prop_assert_eq!(status.agent_id, expected.clone());
                if !status.is_running {
                    prop_assert!(status.start_time.is_none());
                }
            }
        }
    }
}
