//! # Scaling Advisor
//!
//! Turns a recent window of load samples into a scale-up / scale-down recommendation.
//!
//! The policy itself is the pure [`propose`] function. [`ScalingAdvisor`] adds the
//! per-direction cooldown and keeps a bounded log of every evaluation. Nothing here calls
//! a cloud API; an external orchestrator acts on the emitted [`ScalingEvent::action`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{to_chrono, Clock};
use crate::config::ScalingConfig;
use crate::logging::log_scaling_decision;
use crate::models::{LoadSample, ScalingAction, ScalingEvent, TriggerType};

/// Raw policy outcome before cooldown enforcement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    pub action: ScalingAction,
    pub trigger_type: TriggerType,
    pub trigger_value: f64,
    pub threshold_value: f64,
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        values.sum::<f64>() / count as f64
    }
}

/// Apply the thresholds in `config` to `samples` (oldest first).
///
/// Scale-up uses the mean of the newest `window_size` samples, so a partial window can
/// already trigger it. Scale-down needs a full window with every sample under both
/// low-water marks. The window is counted in samples; timestamps are not consulted.
pub fn propose(config: &ScalingConfig, samples: &[LoadSample]) -> Proposal {
    let start = samples.len().saturating_sub(config.window_size);
    let window = &samples[start..];
    let count = window.len();

    let cpu = mean(window.iter().map(|s| s.cpu_percent), count);
    let memory = mean(window.iter().map(|s| s.memory_percent), count);
    let connections = mean(window.iter().map(|s| s.active_connections as f64), count);

    let proposal = |action, trigger_type, trigger_value, threshold_value| Proposal {
        action,
        trigger_type,
        trigger_value,
        threshold_value,
    };

    if count == 0 {
        return proposal(
            ScalingAction::NoChange,
            TriggerType::Cpu,
            0.0,
            config.cpu_scale_up_percent,
        );
    }

    if cpu > config.cpu_scale_up_percent {
        return proposal(
            ScalingAction::ScaleUp,
            TriggerType::Cpu,
            cpu,
            config.cpu_scale_up_percent,
        );
    }

    if memory > config.memory_scale_up_percent {
        return proposal(
            ScalingAction::ScaleUp,
            TriggerType::Memory,
            memory,
            config.memory_scale_up_percent,
        );
    }

    if let Some(limit) = config.connections_scale_up {
        if connections > limit as f64 {
            return proposal(
                ScalingAction::ScaleUp,
                TriggerType::Connections,
                connections,
                limit as f64,
            );
        }
    }

    let full_window = count == config.window_size;
    let all_quiet = window.iter().all(|s| {
        s.cpu_percent < config.cpu_scale_down_percent
            && s.memory_percent < config.memory_scale_down_percent
    });
    if full_window && all_quiet {
        return proposal(
            ScalingAction::ScaleDown,
            TriggerType::Cpu,
            cpu,
            config.cpu_scale_down_percent,
        );
    }

    proposal(
        ScalingAction::NoChange,
        TriggerType::Cpu,
        cpu,
        config.cpu_scale_up_percent,
    )
}

#[derive(Debug, Default)]
struct AdvisorState {
    /// Keyed by (target, direction)
    cooldown_until: HashMap<(String, ScalingAction), DateTime<Utc>>,
    history: VecDeque<ScalingEvent>,
    last_event: Option<ScalingEvent>,
}

/// Cooldown-aware scaling recommender
#[derive(Debug)]
pub struct ScalingAdvisor {
    config: ScalingConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<AdvisorState>,
}

impl ScalingAdvisor {
    pub fn new(config: ScalingConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            enabled = config.enabled,
            target = %config.target,
            window_size = config.window_size,
            cooldown_ms = config.cooldown_ms,
            "🎛️ SCALING: Creating scaling advisor"
        );
        Self {
            config,
            clock,
            state: Mutex::new(AdvisorState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Evaluate for the configured default target
    pub fn evaluate(&self, samples: &[LoadSample]) -> ScalingEvent {
        self.evaluate_for(&self.config.target, samples)
    }

    /// Evaluate `samples` for `target` and record the event.
    ///
    /// A proposal inside its direction's cooldown is still recorded, with `action`
    /// coerced to `none`.
    pub fn evaluate_for(&self, target: &str, samples: &[LoadSample]) -> ScalingEvent {
        let now = self.clock.now();
        let proposal = if self.config.enabled {
            propose(&self.config, samples)
        } else {
            Proposal {
                action: ScalingAction::NoChange,
                trigger_type: TriggerType::Cpu,
                trigger_value: 0.0,
                threshold_value: self.config.cpu_scale_up_percent,
            }
        };

        let mut state = self.state.lock();
        let (action, cooldown_until) = match proposal.action {
            ScalingAction::NoChange => (ScalingAction::NoChange, None),
            direction => {
                let key = (target.to_string(), direction);
                match state.cooldown_until.get(&key).copied() {
                    Some(until) if now < until => (ScalingAction::NoChange, Some(until)),
                    _ => {
                        let until = now + to_chrono(self.config.cooldown());
                        state.cooldown_until.insert(key, until);
                        (direction, Some(until))
                    }
                }
            }
        };

        let event = ScalingEvent {
            id: Uuid::new_v4(),
            target: target.to_string(),
            trigger_type: proposal.trigger_type,
            trigger_value: proposal.trigger_value,
            threshold_value: proposal.threshold_value,
            proposed_action: proposal.action,
            action,
            decided_at: now,
            cooldown_until,
        };

        state.history.push_back(event.clone());
        while state.history.len() > self.config.history_limit {
            state.history.pop_front();
        }
        state.last_event = Some(event.clone());
        drop(state);

        log_scaling_decision(&event, samples.len());
        event
    }

    pub fn last_event(&self) -> Option<ScalingEvent> {
        self.state.lock().last_event.clone()
    }

    /// Recorded evaluations, oldest first
    pub fn history(&self) -> Vec<ScalingEvent> {
        self.state.lock().history.iter().cloned().collect()
    }

    /// When `direction` may next be emitted for `target`
    pub fn cooldown_until(&self, target: &str, direction: ScalingAction) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .cooldown_until
            .get(&(target.to_string(), direction))
            .copied()
    }
}
