//! System Metadata Collection
//!
//! Fills a worker's metadata with host information:
//!
//! - **CPU**: count, model name and the CPUs the worker is pinned to
//! - **OS**: platform and hostname
//! - **Timestamp**: UTC time of the run
//!
//! Keys already present (set by the benchmark program) are never
//! overwritten. Data that can't be read on the current platform is skipped.

use chrono::Utc;
use steadybench_core::{CpuSet, format_cpu_list};
use steadybench_ipc::ModelError;
use steadybench_ipc::metadata::{Metadata, keys};

/// Add host metadata to `metadata` without replacing existing keys
pub fn collect_metadata(
    metadata: &mut Metadata,
    pinned: Option<&CpuSet>,
) -> Result<(), ModelError> {
    metadata.insert_missing(keys::CPU_COUNT, num_cpus().to_string())?;
    if let Some(model) = get_cpu_model() {
        metadata.insert_missing(keys::CPU_MODEL_NAME, model)?;
    }
    if let Some(cpus) = pinned.filter(|cpus| !cpus.is_empty()) {
        metadata.insert_missing(keys::CPU_AFFINITY, format_cpu_list(cpus))?;
    }
    metadata.insert_missing(
        keys::PLATFORM,
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
    )?;
    if let Some(hostname) = get_hostname() {
        metadata.insert_missing(keys::HOSTNAME, hostname)?;
    }
    metadata.insert_missing(
        keys::DATE,
        Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    )?;
    metadata.insert_missing(keys::STEADYBENCH_VERSION, env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
            .filter(|s| !s.is_empty())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Get number of available CPU cores
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(unix)]
fn get_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if ret != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn get_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_host_keys() {
        let mut metadata = Metadata::new();
        collect_metadata(&mut metadata, None).unwrap();

        let cpu_count: usize = metadata.get(keys::CPU_COUNT).unwrap().parse().unwrap();
        assert!(cpu_count >= 1);
        assert!(metadata.get(keys::PLATFORM).unwrap().contains('-'));
        assert_eq!(metadata.get(keys::DATE).unwrap().len(), 19);
        assert_eq!(
            metadata.get(keys::STEADYBENCH_VERSION),
            Some(env!("CARGO_PKG_VERSION"))
        );
        assert_eq!(metadata.get(keys::CPU_AFFINITY), None);
    }

    #[test]
    fn test_user_keys_win() {
        let mut metadata = Metadata::new();
        metadata.insert(keys::HOSTNAME, "custom-host").unwrap();
        metadata.insert("workload", "small").unwrap();
        collect_metadata(&mut metadata, None).unwrap();
        assert_eq!(metadata.get(keys::HOSTNAME), Some("custom-host"));
        assert_eq!(metadata.get("workload"), Some("small"));
    }

    #[test]
    fn test_pinned_cpus_recorded() {
        let mut metadata = Metadata::new();
        let cpus: CpuSet = [0, 1, 2, 4].into_iter().collect();
        collect_metadata(&mut metadata, Some(&cpus)).unwrap();
        assert_eq!(metadata.get(keys::CPU_AFFINITY), Some("0-2,4"));
    }
}
