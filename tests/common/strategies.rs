//! Proptest strategies for control-plane inputs

#![allow(dead_code)]

use bulwark_core::models::{InstanceRole, LoadSample, ServiceInstance};
use chrono::Utc;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Between 1 and 12 workers with distinct ids
pub fn worker_set_strategy() -> impl Strategy<Value = Vec<ServiceInstance>> {
    prop::collection::btree_set("[a-z]{1,8}", 1..12).prop_map(|ids: BTreeSet<String>| {
        ids.into_iter()
            .map(|id| ServiceInstance::new(id, InstanceRole::Worker, "10.0.0.1", 8080))
            .collect()
    })
}

/// One load sample with utilisation in [0, 100]
pub fn load_sample_strategy() -> impl Strategy<Value = LoadSample> {
    (0.0f64..=100.0, 0.0f64..=100.0, 0u64..500).prop_map(|(cpu, memory, connections)| {
        LoadSample::new(Utc::now(), cpu, memory, connections)
    })
}

/// Sequence of probe outcomes, `true` for success
pub fn probe_outcomes_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..60)
}
