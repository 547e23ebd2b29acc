//! # Load Collection
//!
//! Host utilisation for the scaling advisor. Active connections are not measured here;
//! the coordinator sums what registered instances report with their heartbeats.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::Debug;
use sysinfo::System;

use crate::models::LoadSample;

/// CPU and memory utilisation in percent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostLoad {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Source of host utilisation readings
pub trait LoadSource: Send + Sync + Debug {
    fn read(&self) -> HostLoad;
}

/// Reads the local host through `sysinfo`
pub struct SystemLoadSource {
    system: Mutex<System>,
}

impl Debug for SystemLoadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLoadSource").finish_non_exhaustive()
    }
}

impl SystemLoadSource {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta; prime the first reading
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemLoadSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSource for SystemLoadSource {
    fn read(&self) -> HostLoad {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();

        let total_memory = system.total_memory();
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            system.used_memory() as f64 / total_memory as f64 * 100.0
        };

        HostLoad {
            cpu_percent: f64::from(system.global_cpu_info().cpu_usage()),
            memory_percent,
        }
    }
}

/// Fixed or scripted readings, for tests and dry runs
#[derive(Debug, Default)]
pub struct StaticLoadSource {
    readings: Mutex<VecDeque<HostLoad>>,
    last: Mutex<HostLoad>,
}

impl StaticLoadSource {
    pub fn constant(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            readings: Mutex::new(VecDeque::new()),
            last: Mutex::new(HostLoad {
                cpu_percent,
                memory_percent,
            }),
        }
    }

    /// Queue readings; once drained the last one repeats
    pub fn push(&self, cpu_percent: f64, memory_percent: f64) {
        self.readings.lock().push_back(HostLoad {
            cpu_percent,
            memory_percent,
        });
    }

    pub fn set(&self, cpu_percent: f64, memory_percent: f64) {
        self.readings.lock().clear();
        *self.last.lock() = HostLoad {
            cpu_percent,
            memory_percent,
        };
    }
}

impl LoadSource for StaticLoadSource {
    fn read(&self) -> HostLoad {
        let next = self.readings.lock().pop_front();
        let mut last = self.last.lock();
        if let Some(reading) = next {
            *last = reading;
        }
        *last
    }
}

/// Fixed-capacity window of recent samples, oldest first
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<LoadSample>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, sample: LoadSample) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn to_vec(&self) -> Vec<LoadSample> {
        self.samples.lock().iter().copied().collect()
    }

    pub fn latest(&self) -> Option<LoadSample> {
        self.samples.lock().back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}
