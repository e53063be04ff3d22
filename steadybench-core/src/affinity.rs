//! CPU Affinity
//!
//! Workers restrict themselves to a fixed CPU set before measuring. The set is
//! either given explicitly (`"0-2,4"`) or taken from the kernel's isolated CPU
//! list. Isolation is an optimization: auto-detection never fails the run,
//! while an explicit list that cannot be honored does.

use crate::error::BenchError;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Kernel list of CPUs removed from the general scheduler (`isolcpus=`)
pub const ISOLATED_CPUS_PATH: &str = "/sys/devices/system/cpu/isolated";

/// Highest CPU index + 1 accepted in a CPU list (glibc `CPU_SETSIZE`)
pub const MAX_CPUS: usize = 1024;

/// Ordered set of CPU indices
pub type CpuSet = BTreeSet<usize>;

fn parse_cpu(text: &str, list: &str) -> Result<usize, BenchError> {
    let cpu: usize = text
        .parse()
        .map_err(|_| BenchError::config(format!("invalid CPU {text:?} in CPU list {list:?}")))?;
    if cpu >= MAX_CPUS {
        return Err(BenchError::config(format!(
            "CPU {cpu} out of range (max {}) in CPU list {list:?}",
            MAX_CPUS - 1
        )));
    }
    Ok(cpu)
}

/// Parse a comma-separated list of CPU indices and inclusive ranges
///
/// `"0-2,4"` gives `{0, 1, 2, 4}`. Empty lists, empty items and reversed
/// ranges such as `"4-2"` are rejected.
pub fn parse_cpu_list(list: &str) -> Result<CpuSet, BenchError> {
    let trimmed = list.trim();
    if trimmed.is_empty() {
        return Err(BenchError::config("empty CPU list"));
    }

    let mut cpus = CpuSet::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(BenchError::config(format!("empty item in CPU list {list:?}")));
        }
        match part.split_once('-') {
            Some((first, last)) => {
                let first = parse_cpu(first.trim(), list)?;
                let last = parse_cpu(last.trim(), list)?;
                if first > last {
                    return Err(BenchError::config(format!(
                        "reversed range {part:?} in CPU list {list:?}"
                    )));
                }
                cpus.extend(first..=last);
            }
            None => {
                cpus.insert(parse_cpu(part, list)?);
            }
        }
    }
    Ok(cpus)
}

/// Format a CPU set as a compact list, collapsing consecutive indices
pub fn format_cpu_list(cpus: &CpuSet) -> String {
    let mut parts = Vec::new();
    let mut iter = cpus.iter().copied();
    let Some(mut first) = iter.next() else {
        return String::new();
    };
    let mut last = first;

    for cpu in iter {
        if cpu != last + 1 {
            parts.push(format_range(first, last));
            first = cpu;
        }
        last = cpu;
    }
    parts.push(format_range(first, last));
    parts.join(",")
}

fn format_range(first: usize, last: usize) -> String {
    if first == last {
        first.to_string()
    } else {
        format!("{first}-{last}")
    }
}

/// Read an isolated CPU list from `path`
///
/// Returns `None` when the file can't be read or lists no CPU.
pub fn isolated_cpus_from(path: impl AsRef<Path>) -> Result<Option<CpuSet>, BenchError> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "isolated CPU list unavailable");
            return Ok(None);
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    parse_cpu_list(&content).map(Some)
}

/// Host capability for restricting the current process to a CPU set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinitySetter {
    /// `sched_setaffinity(2)`
    Native,
    /// The host has no affinity facility
    Unavailable,
}

impl AffinitySetter {
    /// Probe the host once
    pub fn detect() -> Self {
        if cfg!(target_os = "linux") {
            AffinitySetter::Native
        } else {
            AffinitySetter::Unavailable
        }
    }

    /// Whether [`apply`](Self::apply) can succeed
    pub fn is_available(&self) -> bool {
        matches!(self, AffinitySetter::Native)
    }

    /// Restrict the calling process to `cpus`
    pub fn apply(&self, cpus: &CpuSet) -> Result<(), BenchError> {
        match self {
            AffinitySetter::Native => set_affinity(cpus).map_err(BenchError::Affinity),
            AffinitySetter::Unavailable => {
                Err(BenchError::AffinityUnavailable(format_cpu_list(cpus)))
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn set_affinity(cpus: &CpuSet) -> io::Result<()> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        libc::CPU_ZERO(set_ref);
        for &cpu in cpus {
            libc::CPU_SET(cpu, set_ref);
        }

        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);

        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn set_affinity(_cpus: &CpuSet) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "CPU pinning not supported on this platform",
    ))
}

/// CPU set the calling process may currently run on
#[cfg(target_os = "linux")]
pub fn current_affinity() -> Option<CpuSet> {
    use std::mem::MaybeUninit;

    unsafe {
        let mut set = MaybeUninit::<libc::cpu_set_t>::zeroed();
        let set_ref = set.assume_init_mut();

        let result = libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), set_ref);
        if result != 0 {
            return None;
        }
        Some((0..MAX_CPUS).filter(|&cpu| libc::CPU_ISSET(cpu, set_ref)).collect())
    }
}

/// CPU set the calling process may currently run on
#[cfg(not(target_os = "linux"))]
pub fn current_affinity() -> Option<CpuSet> {
    None
}

/// Which CPUs to pin to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityRequest {
    /// User-supplied list, must be honored
    Explicit(CpuSet),
    /// Kernel-isolated CPUs, if any
    Auto,
}

impl AffinityRequest {
    /// Parse an optional `--affinity` value
    pub fn from_option(list: Option<&str>) -> Result<Self, BenchError> {
        match list {
            Some(list) => Ok(AffinityRequest::Explicit(parse_cpu_list(list)?)),
            None => Ok(AffinityRequest::Auto),
        }
    }
}

/// Result of [`AffinityManager::pin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// The process now runs on exactly these CPUs
    Pinned(CpuSet),
    /// Auto-detection found nothing to pin to
    NoIsolatedCpus,
    /// Isolated CPUs exist but the host can't pin; the process runs unpinned
    Unavailable(CpuSet),
}

impl PinOutcome {
    /// CPUs the process was pinned to
    pub fn pinned(&self) -> Option<&CpuSet> {
        match self {
            PinOutcome::Pinned(cpus) => Some(cpus),
            _ => None,
        }
    }
}

/// Applies an [`AffinityRequest`] using the host's [`AffinitySetter`]
#[derive(Debug, Clone)]
pub struct AffinityManager {
    setter: AffinitySetter,
    isolated_path: PathBuf,
}

impl AffinityManager {
    /// Manager for the current host
    pub fn new() -> Self {
        Self::with_setter(AffinitySetter::detect())
    }

    /// Manager with an explicit setter
    pub fn with_setter(setter: AffinitySetter) -> Self {
        Self {
            setter,
            isolated_path: PathBuf::from(ISOLATED_CPUS_PATH),
        }
    }

    /// Read isolated CPUs from another file
    pub fn with_isolated_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.isolated_path = path.into();
        self
    }

    /// Setter in use
    pub fn setter(&self) -> AffinitySetter {
        self.setter
    }

    /// Restrict the current process according to `request`
    ///
    /// An explicit request fails with [`BenchError::AffinityUnavailable`] on
    /// hosts without an affinity facility. Auto-detection only warns.
    pub fn pin(&self, request: &AffinityRequest) -> Result<PinOutcome, BenchError> {
        match request {
            AffinityRequest::Explicit(cpus) => {
                self.setter.apply(cpus)?;
                info!(cpus = %format_cpu_list(cpus), "pinned to CPUs");
                Ok(PinOutcome::Pinned(cpus.clone()))
            }
            AffinityRequest::Auto => {
                let cpus = match isolated_cpus_from(&self.isolated_path) {
                    Ok(Some(cpus)) => cpus,
                    Ok(None) => {
                        debug!("no isolated CPUs, running unpinned");
                        return Ok(PinOutcome::NoIsolatedCpus);
                    }
                    Err(e) => {
                        warn!(
                            path = %self.isolated_path.display(),
                            error = %e,
                            "ignoring unreadable isolated CPU list"
                        );
                        return Ok(PinOutcome::NoIsolatedCpus);
                    }
                };

                if !self.setter.is_available() {
                    warn!(
                        cpus = %format_cpu_list(&cpus),
                        "isolated CPUs detected but CPU affinity is not available, running unpinned"
                    );
                    return Ok(PinOutcome::Unavailable(cpus));
                }

                self.setter.apply(&cpus)?;
                info!(cpus = %format_cpu_list(&cpus), "pinned to isolated CPUs");
                Ok(PinOutcome::Pinned(cpus))
            }
        }
    }
}

impl Default for AffinityManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn set(cpus: &[usize]) -> CpuSet {
        cpus.iter().copied().collect()
    }

    fn isolated_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_ranges_and_singles() {
        assert_eq!(parse_cpu_list("0-2,4").unwrap(), set(&[0, 1, 2, 4]));
        assert_eq!(parse_cpu_list("3").unwrap(), set(&[3]));
        assert_eq!(parse_cpu_list(" 1 , 5-6\n").unwrap(), set(&[1, 5, 6]));
        assert_eq!(parse_cpu_list("2-2").unwrap(), set(&[2]));
    }

    #[test]
    fn test_parse_rejects_reversed_range() {
        assert!(matches!(
            parse_cpu_list("4-2"),
            Err(BenchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for list in ["", "a", "1,,2", "1-", "-3", "1-2-3", "0,x", "4096"] {
            assert!(
                matches!(parse_cpu_list(list), Err(BenchError::InvalidConfiguration(_))),
                "{list:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_format_cpu_list() {
        assert_eq!(format_cpu_list(&set(&[0, 1, 2, 4])), "0-2,4");
        assert_eq!(format_cpu_list(&set(&[7])), "7");
        assert_eq!(format_cpu_list(&set(&[1, 3, 5, 6])), "1,3,5-6");
        assert_eq!(format_cpu_list(&CpuSet::new()), "");
    }

    #[test]
    fn test_format_parse_inverse() {
        for list in ["0-3", "1,3,5-7", "0,2-4,9"] {
            assert_eq!(format_cpu_list(&parse_cpu_list(list).unwrap()), list);
        }
    }

    #[test]
    fn test_isolated_cpus_from_file() {
        let file = isolated_file("2-3\n");
        assert_eq!(isolated_cpus_from(file.path()).unwrap(), Some(set(&[2, 3])));

        let empty = isolated_file("\n");
        assert_eq!(isolated_cpus_from(empty.path()).unwrap(), None);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("isolated");
        assert_eq!(isolated_cpus_from(&missing).unwrap(), None);
    }

    #[test]
    fn test_request_from_option() {
        assert_eq!(
            AffinityRequest::from_option(None).unwrap(),
            AffinityRequest::Auto
        );
        assert_eq!(
            AffinityRequest::from_option(Some("0-1")).unwrap(),
            AffinityRequest::Explicit(set(&[0, 1]))
        );
        assert!(AffinityRequest::from_option(Some("1-0")).is_err());
    }

    #[test]
    fn test_explicit_request_without_facility_fails() {
        let manager = AffinityManager::with_setter(AffinitySetter::Unavailable);
        let request = AffinityRequest::Explicit(set(&[0]));
        assert!(matches!(
            manager.pin(&request),
            Err(BenchError::AffinityUnavailable(cpus)) if cpus == "0"
        ));
    }

    #[test]
    fn test_auto_request_without_facility_continues() {
        let file = isolated_file("1-2");
        let manager = AffinityManager::with_setter(AffinitySetter::Unavailable)
            .with_isolated_path(file.path());
        assert_eq!(
            manager.pin(&AffinityRequest::Auto).unwrap(),
            PinOutcome::Unavailable(set(&[1, 2]))
        );
    }

    #[test]
    fn test_auto_request_without_isolated_cpus() {
        let dir = tempfile::tempdir().unwrap();
        let manager = AffinityManager::with_setter(AffinitySetter::Native)
            .with_isolated_path(dir.path().join("isolated"));
        let outcome = manager.pin(&AffinityRequest::Auto).unwrap();
        assert_eq!(outcome, PinOutcome::NoIsolatedCpus);
        assert_eq!(outcome.pinned(), None);
    }

    #[test]
    fn test_auto_request_ignores_malformed_file() {
        let file = isolated_file("garbage");
        let manager = AffinityManager::with_setter(AffinitySetter::Native)
            .with_isolated_path(file.path());
        assert_eq!(
            manager.pin(&AffinityRequest::Auto).unwrap(),
            PinOutcome::NoIsolatedCpus
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_native_pin_to_current_set() {
        // Re-applying the current mask keeps the test thread where it was
        let Some(current) = current_affinity() else {
            return;
        };
        assert!(!current.is_empty());
        let manager = AffinityManager::with_setter(AffinitySetter::Native);
        let outcome = manager
            .pin(&AffinityRequest::Explicit(current.clone()))
            .unwrap();
        assert_eq!(outcome.pinned(), Some(&current));
        assert_eq!(current_affinity(), Some(current));
    }
}
