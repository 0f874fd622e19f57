use anyhow::{anyhow, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::{Collector, Reading, BYTES_PER_KIB};

/// Samples the agent's own process: resident set and virtual size, both
/// reported in kibibytes.
pub struct RuntimeCollector {
    system: System,
    pid: Pid,
}

impl RuntimeCollector {
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("current pid: {e}"))?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Reading>> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]));
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| anyhow!("own process {} not visible", self.pid))?;

        Ok(vec![
            Reading::new("Alloc", process.memory() as f64 / BYTES_PER_KIB),
            Reading::new("Sys", process.virtual_memory() as f64 / BYTES_PER_KIB),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_own_process_memory_in_kib() {
        let mut collector = RuntimeCollector::new().unwrap();
        let readings = collector.collect().unwrap();

        let alloc = readings.iter().find(|r| r.name == "Alloc").unwrap();
        assert!(alloc.value > 0.0, "a running process has resident memory");

        let names: Vec<&str> = readings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Alloc", "Sys"]);
    }
}
