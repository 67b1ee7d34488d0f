//! Host introspection used by the informational builtins.
//!
//! Everything here is read-only except [`kill`]. Linux-specific sources
//! (`/proc`) degrade to `None` or an `Unsupported` error elsewhere.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uname {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

impl DiskUsage {
    pub fn percent_used(&self) -> f64 {
        let denom = self.used + self.available;
        if denom == 0 {
            0.0
        } else {
            self.used as f64 * 100.0 / denom as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memory {
    pub total: u64,
    pub used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub device: String,
    pub mount_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: i32,
    pub name: String,
}

#[cfg(unix)]
fn c_chars_to_string(chars: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(unix)]
pub fn hostname() -> String {
    let mut buf = [0 as libc::c_char; 256];
    // SAFETY: buf is writable for buf.len() bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    c_chars_to_string(&buf)
}

#[cfg(not(unix))]
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(unix)]
pub fn uname() -> io::Result<Uname> {
    // SAFETY: utsname is plain old data; uname fills it on success.
    let mut raw: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut raw) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Uname {
        sysname: c_chars_to_string(&raw.sysname),
        nodename: c_chars_to_string(&raw.nodename),
        release: c_chars_to_string(&raw.release),
        version: c_chars_to_string(&raw.version),
        machine: c_chars_to_string(&raw.machine),
    })
}

#[cfg(not(unix))]
pub fn uname() -> io::Result<Uname> {
    Ok(Uname {
        sysname: std::env::consts::OS.to_string(),
        nodename: hostname(),
        release: String::new(),
        version: String::new(),
        machine: std::env::consts::ARCH.to_string(),
    })
}

#[cfg(unix)]
pub fn disk_usage(path: &Path) -> io::Result<DiskUsage> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: statvfs is plain old data; c_path is NUL terminated.
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut st) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let frsize = st.f_frsize as u64;
    let total = st.f_blocks as u64 * frsize;
    let free = st.f_bfree as u64 * frsize;
    Ok(DiskUsage {
        total,
        used: total.saturating_sub(free),
        available: st.f_bavail as u64 * frsize,
    })
}

#[cfg(not(unix))]
pub fn disk_usage(_path: &Path) -> io::Result<DiskUsage> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "disk usage is not available"))
}

/// Mounted filesystems from `/proc/mounts`.
pub fn mounts() -> io::Result<Vec<Mount>> {
    Ok(parse_mounts(&fs::read_to_string("/proc/mounts")?))
}

fn parse_mounts(text: &str) -> Vec<Mount> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            Some(Mount {
                device: device.to_string(),
                mount_point: mount_point.replace("\\040", " "),
            })
        })
        .collect()
}

pub fn uptime() -> Option<Duration> {
    let text = fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = text.split_whitespace().next()?.parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

pub fn memory() -> Option<Memory> {
    parse_meminfo(&fs::read_to_string("/proc/meminfo").ok()?)
}

fn parse_meminfo(text: &str) -> Option<Memory> {
    let field = |key: &str| -> Option<u64> {
        text.lines()
            .find_map(|l| l.strip_prefix(key))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(Memory {
        total,
        used: total.saturating_sub(available),
    })
}

/// Running processes ordered by PID.
pub fn processes() -> io::Result<Vec<ProcessEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        // Processes can exit between listing and reading.
        let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        entries.push(ProcessEntry {
            pid,
            name: comm.trim_end().to_string(),
        });
    }
    entries.sort_by_key(|p| p.pid);
    Ok(entries)
}

/// Send SIGKILL to `pid`.
#[cfg(unix)]
pub fn kill(pid: i32) -> io::Result<()> {
    // SAFETY: kill has no memory safety preconditions.
    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn kill(_pid: i32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "kill is not available"))
}

/// Render an uptime as `N days, H hours`, `H hours, M mins` or `M mins`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days} days, {hours} hours")
    } else if hours > 0 {
        format!("{hours} hours, {minutes} mins")
    } else {
        format!("{minutes} mins")
    }
}

/// Human readable size with one decimal, e.g. `1.5K`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "K", "M", "G"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}T")
}

pub fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
