//! Argv-only, timeout-bounded shell-out to a container runtime CLI.
//!
//! Grounded on `apps::docker::DockerManager::refresh`, which shells out to
//! `docker stats --no-stream` with an explicit `--format` string rather than
//! parsing free-form table output. No shell is ever invoked: every argument
//! is passed as a separate `Command::arg`, so nothing from a container name
//! can be interpreted as a shell metacharacter.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::sampler::ContainerSample;

const STATS_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum ContainerError {
    RuntimeUnavailable(String),
    Timeout,
    Parse(String),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RuntimeUnavailable(rt) => write!(f, "{rt} is not available"),
            ContainerError::Timeout => write!(f, "container runtime query timed out"),
            ContainerError::Parse(msg) => write!(f, "failed to parse container stats: {msg}"),
        }
    }
}

impl std::error::Error for ContainerError {}

/// Runs `<runtime> stats --no-stream --format <id>\t<name>\t<mem_bytes>` and
/// parses the result. `runtime` is expected to be `"docker"` or `"podman"`.
pub fn stats(runtime: &str) -> Result<Vec<ContainerSample>, ContainerError> {
    let output = run_with_timeout(
        runtime,
        &[
            "stats",
            "--no-stream",
            "--format",
            "{{.ID}}\t{{.Name}}\t{{.MemUsage}}",
        ],
        STATS_TIMEOUT,
    )?;
    parse_stats(&output)
}

/// Runs `<runtime> stop <id>`, the same argv-only shape as `stats`.
pub fn stop(runtime: &str, id: &str) -> Result<(), ContainerError> {
    run_with_timeout(runtime, &["stop", id], STOP_TIMEOUT)?;
    Ok(())
}

fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String, ContainerError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| ContainerError::RuntimeUnavailable(program.to_string()))?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let (tx, rx) = mpsc::channel();
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        let _ = tx.send(buf);
    });

    match rx.recv_timeout(timeout) {
        Ok(buf) => {
            let _ = child.wait();
            let _ = reader.join();
            Ok(buf)
        }
        Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ContainerError::Timeout)
        }
    }
}

fn parse_stats(output: &str) -> Result<Vec<ContainerSample>, ContainerError> {
    let mut samples = Vec::new();
    for line in output.lines() {
        let mut fields = line.splitn(3, '\t');
        let id = fields.next().unwrap_or("").trim();
        let name = fields.next().unwrap_or("").trim();
        let mem = fields.next().unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let rss_bytes = parse_mem_usage(mem)
            .ok_or_else(|| ContainerError::Parse(format!("unparseable memory field: {mem}")))?;
        samples.push(ContainerSample {
            id: id.to_string(),
            name: name.to_string(),
            rss_bytes,
        });
    }
    Ok(samples)
}

/// Parses docker's `"123.4MiB / 2GiB"` style `MemUsage` field, keeping only
/// the used side.
fn parse_mem_usage(field: &str) -> Option<u64> {
    let used = field.split('/').next()?.trim();
    let (number, unit) = used.split_at(used.find(|c: char| c.is_alphabetic())?);
    let value: f64 = number.trim().parse().ok()?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "b" => 1.0,
        "kib" => 1024.0,
        "kb" => 1000.0,
        "mib" => 1024.0 * 1024.0,
        "mb" => 1_000_000.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "gb" => 1_000_000_000.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mem_usage_mib() {
        assert_eq!(parse_mem_usage("123.4MiB / 2GiB"), Some((123.4 * 1024.0 * 1024.0) as u64));
    }

    #[test]
    fn parses_mem_usage_gib() {
        assert_eq!(parse_mem_usage("1.5GiB / 4GiB"), Some((1.5 * 1024.0 * 1024.0 * 1024.0) as u64));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert_eq!(parse_mem_usage("123.4XiB / 2GiB"), None);
    }

    #[test]
    fn parses_full_stats_line() {
        let out = "abc123\tweb-1\t123.4MiB / 2GiB\ndef456\tdb-1\t1.5GiB / 4GiB\n";
        let samples = parse_stats(out).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, "abc123");
        assert_eq!(samples[0].name, "web-1");
    }
}
