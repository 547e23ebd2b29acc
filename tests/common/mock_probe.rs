//! Scripted health probe for driving circuit breakers through the coordinator

#![allow(dead_code)]

use async_trait::async_trait;
use bulwark_core::health::{HealthProbe, ProbeFailure};
use bulwark_core::models::Dependency;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What the next check should do
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Healthy,
    Refused,
    Unhealthy(String),
}

/// Replays queued outcomes, then repeats the default
#[derive(Debug)]
pub struct MockProbe {
    script: Mutex<VecDeque<MockOutcome>>,
    default: Mutex<MockOutcome>,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn new(default: MockOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(MockOutcome::Healthy)
    }

    pub fn refusing() -> Arc<Self> {
        Self::new(MockOutcome::Refused)
    }

    pub fn queue(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    pub fn set_default(&self, outcome: MockOutcome) {
        *self.default.lock() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for MockProbe {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn check(&self, _dependency: &Dependency) -> Result<(), ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().clone());

        match outcome {
            MockOutcome::Healthy => Ok(()),
            MockOutcome::Refused => Err(ProbeFailure::Connection("connection refused".into())),
            MockOutcome::Unhealthy(reason) => Err(ProbeFailure::Unhealthy(reason)),
        }
    }
}
