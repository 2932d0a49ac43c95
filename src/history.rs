//! Per-record sample ring and state storage.
//!
//! Tracks both ordinary processes and (optionally) containers under a single
//! keyspace so the detector and scheduler can treat them uniformly. New
//! records start in `fsm::ProcState::Grace`; records for processes that have
//! disappeared since the last tick are dropped outright, since a dead PID has
//! nothing left to classify.

use std::collections::{HashMap, VecDeque};

use crate::fsm::{Classification, ProcState};
use crate::sampler::{ContainerSample, ProcessSample};

/// Identifies a tracked record across ticks. Processes are keyed by pid;
/// containers (which have no pid from the host's point of view) by runtime id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Process(u32),
    Container(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub t_s: f64,
    pub rss_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub key: RecordKey,
    pub pid: Option<u32>,
    pub ppid: u32,
    pub basename: String,
    pub cmdline: String,
    pub child_count: u32,
    pub terminal_descendant: bool,
    pub samples: VecDeque<Sample>,
    pub state: ProcState,
    pub confirm: u32,
    pub not_before: f64,
    pub last_classification: Option<Classification>,
}

impl ProcessRecord {
    fn new_process(sample: &ProcessSample, now: f64, grace_s: f64) -> Self {
        ProcessRecord {
            key: RecordKey::Process(sample.pid),
            pid: Some(sample.pid),
            ppid: sample.ppid,
            basename: sample.basename.clone(),
            cmdline: sample.cmdline.clone(),
            child_count: sample.child_count,
            terminal_descendant: sample.terminal_descendant,
            samples: VecDeque::new(),
            state: ProcState::Grace,
            confirm: 0,
            not_before: now + grace_s,
            last_classification: None,
        }
    }

    fn new_container(sample: &ContainerSample, now: f64, grace_s: f64) -> Self {
        ProcessRecord {
            key: RecordKey::Container(sample.id.clone()),
            pid: None,
            ppid: 0,
            basename: sample.name.clone(),
            cmdline: sample.name.clone(),
            child_count: 0,
            terminal_descendant: false,
            samples: VecDeque::new(),
            state: ProcState::Grace,
            confirm: 0,
            not_before: now + grace_s,
            last_classification: None,
        }
    }

    fn push_sample(&mut self, rss_bytes: u64, now: f64, capacity: usize) {
        self.samples.push_back(Sample { t_s: now, rss_bytes });
        while self.samples.len() > capacity.max(1) {
            self.samples.pop_front();
        }
    }
}

/// Owns every tracked record, keyed by `RecordKey`.
#[derive(Debug, Default)]
pub struct HistoryStore {
    records: HashMap<RecordKey, ProcessRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        HistoryStore {
            records: HashMap::new(),
        }
    }

    /// Folds one tick's process and container samples into the store:
    /// create new records, append a sample to existing ones bounded to
    /// `capacity`, and drop records for anything no longer observed.
    pub fn observe(
        &mut self,
        processes: &[ProcessSample],
        containers: &[ContainerSample],
        now: f64,
        capacity: usize,
        grace_s: f64,
    ) {
        let mut seen: std::collections::HashSet<RecordKey> = std::collections::HashSet::new();

        for p in processes {
            let key = RecordKey::Process(p.pid);
            seen.insert(key.clone());
            let record = self
                .records
                .entry(key)
                .or_insert_with(|| ProcessRecord::new_process(p, now, grace_s));
            record.ppid = p.ppid;
            record.basename = p.basename.clone();
            record.cmdline = p.cmdline.clone();
            record.child_count = p.child_count;
            record.terminal_descendant = p.terminal_descendant;
            record.push_sample(p.rss_bytes, now, capacity);
        }

        for c in containers {
            let key = RecordKey::Container(c.id.clone());
            seen.insert(key.clone());
            let record = self
                .records
                .entry(key)
                .or_insert_with(|| ProcessRecord::new_container(c, now, grace_s));
            record.basename = c.name.clone();
            record.cmdline = c.name.clone();
            record.push_sample(c.rss_bytes, now, capacity);
        }

        self.records.retain(|key, _| seen.contains(key));
    }

    pub fn get(&self, key: &RecordKey) -> Option<&ProcessRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &RecordKey) -> Option<&mut ProcessRecord> {
        self.records.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }

    pub fn keys(&self) -> Vec<RecordKey> {
        self.records.keys().cloned().collect()
    }

    /// Removes a record outright, used once a kill has actually taken the
    /// process or container down.
    pub fn remove(&mut self, key: &RecordKey) {
        self.records.remove(key);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
