use anyhow::Result;
use sysinfo::System;

use crate::{Collector, Reading, BYTES_PER_KIB};

/// Samples OS-level counters: total and free memory in kibibytes plus one
/// utilization percentage gauge per CPU core (`CPUutilization1`,
/// `CPUutilization2`, ...).
pub struct SystemCollector {
    system: System,
}

impl SystemCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first one so the
        // initial tick reports something other than zero for every core.
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SystemCollector {
    fn name(&self) -> &str {
        "system"
    }

    fn collect(&mut self) -> Result<Vec<Reading>> {
        self.system.refresh_memory();
        self.system.refresh_cpu_all();

        let mut readings = vec![
            Reading::new(
                "TotalMemory",
                self.system.total_memory() as f64 / BYTES_PER_KIB,
            ),
            Reading::new(
                "FreeMemory",
                self.system.free_memory() as f64 / BYTES_PER_KIB,
            ),
        ];

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            readings.push(Reading::new(
                format!("CPUutilization{}", i + 1),
                cpu.cpu_usage() as f64,
            ));
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_memory_totals_and_one_gauge_per_core() {
        let mut collector = SystemCollector::new();
        let readings = collector.collect().unwrap();

        let total = readings.iter().find(|r| r.name == "TotalMemory").unwrap();
        assert!(total.value > 0.0);

        let cores = readings
            .iter()
            .filter(|r| r.name.starts_with("CPUutilization"))
            .count();
        assert!(cores >= 1);
        assert!(readings.iter().any(|r| r.name == "CPUutilization1"));
    }
}
