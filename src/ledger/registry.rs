use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use super::record::{JobRecord, JobView};

/// Opaque ticket returned by [`JobRegistry::insert`].
///
/// Not `Clone`: removal consumes it, so a job can leave the registry once.
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle(u64);

#[derive(Debug, Default)]
struct Slots {
    next_seq: u64,
    jobs: BTreeMap<u64, Arc<JobRecord>>,
}

/// In-flight jobs in arrival order.
///
/// The registry lock only covers bookkeeping of `Arc<JobRecord>` pointers;
/// it is released before any record lock is taken.
#[derive(Debug, Default)]
pub struct JobRegistry {
    slots: RwLock<Slots>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Arc<JobRecord>) -> JobHandle {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let seq = slots.next_seq;
        slots.next_seq += 1;
        slots.jobs.insert(seq, record);
        JobHandle(seq)
    }

    pub fn remove(&self, handle: JobHandle) -> Option<Arc<JobRecord>> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .remove(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<JobRecord>> {
        self.records().into_iter().find(|record| record.id() == id)
    }

    /// Copy every in-flight job, oldest first.
    ///
    /// Each view is consistent for its own record; views of different records
    /// may be taken at slightly different instants.
    pub fn snapshot(&self) -> Vec<JobView> {
        self.records().iter().map(|record| record.view()).collect()
    }

    fn records(&self) -> Vec<Arc<JobRecord>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::{JobParams, JobStatus};
    use std::thread;

    fn job(url: &str) -> Arc<JobRecord> {
        Arc::new(JobRecord::new(JobParams {
            url: url.to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_snapshot_keeps_arrival_order() {
        let registry = JobRegistry::new();
        registry.insert(job("https://a.example"));
        registry.insert(job("https://b.example"));
        registry.insert(job("https://c.example"));

        let urls: Vec<_> = registry.snapshot().into_iter().map(|v| v.url).collect();
        assert_eq!(
            urls,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
    }

    #[test]
    fn test_len_tracks_inserts_minus_removes() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for i in 0..5 {
            handles.push(registry.insert(job(&format!("https://{i}.example"))));
        }
        assert_eq!(registry.snapshot().len(), 5);

        let second = handles.remove(1);
        let removed = registry.remove(second).unwrap();
        assert_eq!(removed.params().url, "https://1.example");
        assert_eq!(registry.snapshot().len(), 4);

        for handle in handles {
            registry.remove(handle);
        }
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_removing_middle_preserves_order() {
        let registry = JobRegistry::new();
        let _a = registry.insert(job("https://a.example"));
        let b = registry.insert(job("https://b.example"));
        let _c = registry.insert(job("https://c.example"));

        registry.remove(b);

        let urls: Vec<_> = registry.snapshot().into_iter().map(|v| v.url).collect();
        assert_eq!(urls, vec!["https://a.example", "https://c.example"]);
    }

    #[test]
    fn test_get_by_id() {
        let registry = JobRegistry::new();
        let record = job("https://a.example");
        let id = record.id();
        registry.insert(record);

        assert_eq!(registry.get(id).unwrap().id(), id);
        assert!(registry.get(Uuid::now_v7()).is_none());
    }

    #[test]
    fn test_snapshot_during_mutation_sees_whole_records() {
        let registry = Arc::new(JobRegistry::new());
        let records: Vec<_> = (0..8).map(|i| job(&format!("https://{i}.example"))).collect();
        for record in &records {
            registry.insert(record.clone());
        }

        let writers: Vec<_> = records
            .into_iter()
            .map(|record| {
                thread::spawn(move || {
                    record.advance(JobStatus::Extracting).unwrap();
                    record.advance(JobStatus::Downloading).unwrap();
                    record.push_error("item 2 failed").unwrap();
                    record.advance(JobStatus::PartlyDone).unwrap();
                })
            })
            .collect();

        let reader = {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    for view in registry.snapshot() {
                        if view.status == JobStatus::PartlyDone {
                            assert_eq!(view.errors.len(), 1);
                        }
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert!(
            registry
                .snapshot()
                .iter()
                .all(|view| view.status == JobStatus::PartlyDone)
        );
    }
}
