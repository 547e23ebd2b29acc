mod common;

use bulwark_core::clock::{system_clock, Clock, ManualClock};
use bulwark_core::config::{LoadSelectorConfig, ScalingConfig};
use bulwark_core::models::{LoadSample, ProbeErrorKind, ProbeResult, RequestClass, ScalingAction};
use bulwark_core::orchestration::{propose, ScalingAdvisor};
use bulwark_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitStatus};
use bulwark_core::services::LoadSelector;
use chrono::Utc;
use common::strategies::*;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    /// Property: round robin over N healthy candidates visits each exactly once per N picks
    #[test]
    fn round_robin_visits_each_candidate_once_per_cycle(workers in worker_set_strategy(), cycles in 1usize..4) {
        let selector = LoadSelector::new(
            &LoadSelectorConfig::default(),
            Arc::new(CircuitBreakerManager::new(system_clock())),
        );

        for _ in 0..cycles {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for _ in 0..workers.len() {
                let chosen = selector.select(RequestClass::Read, &workers).unwrap();
                *seen.entry(chosen.instance_id).or_default() += 1;
            }
            prop_assert_eq!(seen.len(), workers.len());
            prop_assert!(seen.values().all(|count| *count == 1));
        }
    }

    /// Property: within one cooldown window at most one scale_up is emitted
    #[test]
    fn scale_up_never_repeats_within_cooldown(
        samples in prop::collection::vec(load_sample_strategy(), 1..40),
        step_secs in 1u64..120,
    ) {
        let clock = ManualClock::starting_now();
        let config = ScalingConfig { cooldown_ms: 600_000, ..ScalingConfig::default() };
        let cooldown = config.cooldown();
        let advisor = ScalingAdvisor::new(config, Arc::new(clock.clone()));

        let mut last_scale_up = None;
        for end in 1..=samples.len() {
            let event = advisor.evaluate(&samples[..end]);
            if event.action == ScalingAction::ScaleUp {
                if let Some(previous) = last_scale_up {
                    prop_assert!(event.decided_at - previous >= chrono::Duration::from_std(cooldown).unwrap());
                }
                last_scale_up = Some(event.decided_at);
            }
            clock.advance(Duration::from_secs(step_secs));
        }
    }

    /// Property: the advisor only ever acts in the direction the load proposes
    #[test]
    fn emitted_action_matches_proposal(samples in prop::collection::vec(load_sample_strategy(), 0..20)) {
        let config = ScalingConfig::default();
        let advisor = ScalingAdvisor::new(config.clone(), Arc::new(ManualClock::starting_now()));
        let event = advisor.evaluate(&samples);
        let proposal = propose(&config, &samples);

        prop_assert_eq!(event.proposed_action, proposal.action);
        prop_assert!(event.action == proposal.action || event.action == ScalingAction::NoChange);
    }

    /// Property: a closed breaker opens exactly when the failure streak reaches the threshold
    #[test]
    fn breaker_opens_only_on_consecutive_failures(outcomes in probe_outcomes_strategy(), threshold in 1u32..8) {
        let clock = ManualClock::starting_now();
        let breaker = CircuitBreaker::new(
            "dependency",
            CircuitBreakerConfig::new(threshold, Duration::from_secs(60)),
            Duration::from_secs(10),
            Arc::new(clock.clone()),
        );

        let mut streak = 0u32;
        for success in outcomes {
            if breaker.status() == CircuitStatus::Open {
                break;
            }
            let result = if success {
                streak = 0;
                ProbeResult::success("dependency", clock.now(), 1)
            } else {
                streak += 1;
                ProbeResult::failure("dependency", clock.now(), 1, ProbeErrorKind::Connection, "refused")
            };
            breaker.record_result(&result);

            let expected = if streak >= threshold { CircuitStatus::Open } else { CircuitStatus::Closed };
            prop_assert_eq!(breaker.status(), expected);
            prop_assert_eq!(breaker.snapshot().consecutive_failures, streak);
        }
    }
}

#[test]
fn propose_ignores_samples_outside_window() {
    let config = ScalingConfig::default();
    let mut samples = vec![LoadSample::new(Utc::now(), 99.0, 99.0, 0); 50];
    samples.extend(vec![LoadSample::new(Utc::now(), 50.0, 50.0, 0); config.window_size]);
    assert_eq!(propose(&config, &samples).action, ScalingAction::NoChange);
}
