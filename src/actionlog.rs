//! Append-only action log: one writer, line-buffered, opened once at
//! startup per §5's "shared resources" note.
//!
//! Line format is fixed by the external interface contract:
//! `[YYYY-MM-DD HH:MM:SS] <event> pid=<n> name=<s> reason=<reason> rss=<MB> slope=<MB/min>`

use std::fs::OpenOptions;
use std::io::{self, LineWriter, Write};
use std::path::Path;

use chrono::Local;

use crate::killer::Reason;

pub struct ActionLog {
    writer: LineWriter<std::fs::File>,
}

impl ActionLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(ActionLog {
            writer: LineWriter::new(file),
        })
    }

    /// Appends one line for a kill-related event. `pid` is 0 for container
    /// targets, which have no host pid.
    pub fn record(
        &mut self,
        event: &str,
        pid: u32,
        name: &str,
        reason: Reason,
        rss_mb: f64,
        slope_mbpm: f64,
    ) -> io::Result<()> {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(
            self.writer,
            "[{ts}] {event} pid={pid} name={name} reason={reason} rss={rss_mb:.1} slope={slope_mbpm:.1}"
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_one_well_formed_line_per_record() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("memory-leak-killer-test-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        {
            let mut log = ActionLog::open(&path).unwrap();
            log.record("killed", 1234, "hog", Reason::Leak, 512.3, 102.0).unwrap();
            log.flush().unwrap();
        }

        let mut contents = String::new();
        std::fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("killed pid=1234 name=hog reason=leak rss=512.3 slope=102.0"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn appends_across_opens() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("memory-leak-killer-test-append-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        {
            let mut log = ActionLog::open(&path).unwrap();
            log.record("killed", 1, "a", Reason::Pressure, 1.0, 1.0).unwrap();
        }
        {
            let mut log = ActionLog::open(&path).unwrap();
            log.record("killed", 2, "b", Reason::Predictive, 2.0, 2.0).unwrap();
        }

        let mut contents = String::new();
        std::fs::File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 2);

        std::fs::remove_file(&path).unwrap();
    }
}
