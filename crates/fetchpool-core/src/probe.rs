//! System load sampling for the scaler.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use sysinfo::System;

/// Source of CPU utilization samples (0.0 - 100.0).
///
/// A sample must not block to average over a window; it reports usage over
/// the interval since the previous sample.
pub trait LoadProbe: Send + Sync {
    fn cpu_percent(&self) -> f32;
}

/// Global CPU usage from `sysinfo`.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Baseline so the first real sample covers the interval since construction.
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for SysinfoProbe {
    fn cpu_percent(&self) -> f32 {
        let mut system = self.system.lock();
        system.refresh_cpu();
        let usage = system.global_cpu_info().cpu_usage();
        tracing::trace!(cpu = %usage, "cpu sample");
        usage
    }
}

/// Probe returning a value set by the caller. Useful to pin the pool size
/// (e.g. a constant 100% never grows) and in tests.
#[derive(Debug)]
pub struct StaticProbe {
    bits: AtomicU32,
}

impl StaticProbe {
    pub fn new(cpu_percent: f32) -> Self {
        Self {
            bits: AtomicU32::new(cpu_percent.to_bits()),
        }
    }

    pub fn set(&self, cpu_percent: f32) {
        self.bits.store(cpu_percent.to_bits(), Ordering::Relaxed);
    }
}

impl LoadProbe for StaticProbe {
    fn cpu_percent(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_sample_in_range() {
        let probe = SysinfoProbe::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let cpu = probe.cpu_percent();
        assert!((0.0..=100.0).contains(&cpu), "cpu = {cpu}");
    }

    #[test]
    fn static_probe_reports_latest_value() {
        let probe = StaticProbe::new(12.5);
        assert_eq!(probe.cpu_percent(), 12.5);
        probe.set(97.0);
        assert_eq!(probe.cpu_percent(), 97.0);
    }
}
