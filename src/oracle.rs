//! System-wide memory totals, read fresh from `/proc/meminfo` every tick.
//!
//! Grounded on `platform::linux::memory::LinuxMemoryOptimizer::get_system_memory`:
//! same key set, same `MemAvailable`-with-fallback arithmetic, no caching.

use std::fmt;
use std::fs;

/// Snapshot of system-wide memory, in bytes unless noted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemMemory {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl SystemMemory {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn used_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug)]
pub enum OracleError {
    Read(std::io::Error),
    Parse(&'static str),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Read(e) => write!(f, "failed to read /proc/meminfo: {e}"),
            OracleError::Parse(what) => write!(f, "failed to parse /proc/meminfo: {what}"),
        }
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OracleError::Read(e) => Some(e),
            OracleError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for OracleError {
    fn from(e: std::io::Error) -> Self {
        OracleError::Read(e)
    }
}

/// Reads `/proc/meminfo` on every call. No caching, one reading per tick.
#[derive(Debug, Default)]
pub struct MemoryOracle;

impl MemoryOracle {
    pub fn new() -> Self {
        MemoryOracle
    }

    pub fn read(&self) -> Result<SystemMemory, OracleError> {
        let contents = fs::read_to_string("/proc/meminfo")?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<SystemMemory, OracleError> {
        let mut total_kb = None;
        let mut free_kb = None;
        let mut available_kb = None;
        let mut buffers_kb = None;
        let mut cached_kb = None;

        for line in contents.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let value_kb = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u64>().ok());
            match key {
                "MemTotal" => total_kb = value_kb,
                "MemFree" => free_kb = value_kb,
                "MemAvailable" => available_kb = value_kb,
                "Buffers" => buffers_kb = value_kb,
                "Cached" => cached_kb = value_kb,
                _ => {}
            }
        }

        let total_kb = total_kb.ok_or(OracleError::Parse("missing MemTotal"))?;

        // Kernels before 3.14 don't report MemAvailable; approximate it the
        // way the teacher's optimizer does, from free + buffers + cached.
        let available_kb = available_kb.unwrap_or_else(|| {
            free_kb.unwrap_or(0) + buffers_kb.unwrap_or(0) + cached_kb.unwrap_or(0)
        });

        Ok(SystemMemory {
            total_bytes: total_kb * 1024,
            available_bytes: available_kb * 1024,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
MemTotal:       16384000 kB
MemFree:         1024000 kB
MemAvailable:    8192000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapTotal:       2097152 kB
SwapFree:        2097152 kB
";

    #[test]
    fn parses_mem_available_directly() {
        let mem = MemoryOracle::parse(SAMPLE).unwrap();
        assert_eq!(mem.total_bytes, 16_384_000 * 1024);
        assert_eq!(mem.available_bytes, 8_192_000 * 1024);
    }

    #[test]
    fn falls_back_to_free_plus_buffers_plus_cached() {
        let no_available = "\
MemTotal:       16384000 kB
MemFree:         1024000 kB
Buffers:          512000 kB
Cached:          2048000 kB
";
        let mem = MemoryOracle::parse(no_available).unwrap();
        assert_eq!(mem.available_bytes, (1_024_000 + 512_000 + 2_048_000) * 1024);
    }

    #[test]
    fn used_pct_matches_total_minus_available() {
        let mem = SystemMemory {
            total_bytes: 1000,
            available_bytes: 250,
        };
        assert!((mem.used_pct() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn missing_mem_total_is_an_error() {
        let err = MemoryOracle::parse("Bogus: 1 kB\n");
        assert!(err.is_err());
    }
}
