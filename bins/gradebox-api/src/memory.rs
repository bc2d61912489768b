// Memory reading reported with every execution
//
// FIXME: this samples the orchestrator's own resident set, not the sandboxed
// program's. Reporting the program's usage needs a per-exec reading from the
// container runtime (cgroup stats of the sandbox), which the exec API does not
// expose per session.

use regex::Regex;

const PROC_STATUS: &str = "/proc/self/status";

/// Resident memory of the current process in MB, `0.0` when unavailable
pub fn resident_memory_mb() -> f64 {
    std::fs::read_to_string(PROC_STATUS)
        .ok()
        .and_then(|status| parse_vm_rss_mb(&status))
        .unwrap_or(0.0)
}

/// Extract `VmRSS` (reported in kB) from a `/proc/<pid>/status` body
pub fn parse_vm_rss_mb(status: &str) -> Option<f64> {
    let re = Regex::new(r"VmRSS:\s+(\d+) kB").ok()?;
    let kb: u64 = re.captures(status)?.get(1)?.as_str().parse().ok()?;
    Some(kb as f64 / 1024.0)
}
