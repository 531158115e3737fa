use crate::schema::{JobError, JobRecord};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Keyed job table shared by request handlers and background procedures.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: JobRecord) -> JobRecord;

    fn get(&self, job_id: &str) -> Result<JobRecord, JobError>;

    fn list(&self) -> Vec<JobRecord>;

    /// Applies `mutation` atomically: it runs on a copy under the store lock and the copy is
    /// committed only if the mutation returns `Ok`.
    fn update(
        &self,
        job_id: &str,
        mutation: &mut dyn FnMut(&mut JobRecord) -> Result<(), JobError>,
    ) -> Result<JobRecord, JobError>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: JobRecord) -> JobRecord {
        self.jobs.lock().insert(job.job_id.clone(), job.clone());
        job
    }

    fn get(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.jobs
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    fn update(
        &self,
        job_id: &str,
        mutation: &mut dyn FnMut(&mut JobRecord) -> Result<(), JobError>,
    ) -> Result<JobRecord, JobError> {
        let mut jobs = self.jobs.lock();
        let current = jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound {
            job_id: job_id.to_string(),
        })?;
        let mut draft = current.clone();
        mutation(&mut draft)?;
        *current = draft.clone();
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JobStatus;
    use std::sync::Arc;

    #[test]
    fn insert_get_and_list() {
        let store = InMemoryJobStore::new();
        let first = store.insert(JobRecord::new("https://a", "started"));
        let second = store.insert(JobRecord::new("https://b", "started"));
        assert_eq!(store.get(&first.job_id).unwrap().repo_url, "https://a");
        assert_eq!(store.list().len(), 2);
        assert_ne!(first.job_id, second.job_id);
        assert!(matches!(store.get("nope"), Err(JobError::NotFound { .. })));
    }

    #[test]
    fn failed_mutation_leaves_record_untouched() {
        let store = InMemoryJobStore::new();
        let job = store.insert(JobRecord::new("https://a", "started"));

        let result = store.update(&job.job_id, &mut |job| {
            job.message = "half-written".into();
            job.transition(JobStatus::Completed, "skip ahead")
        });
        assert!(matches!(result, Err(JobError::IllegalTransition { .. })));

        let stored = store.get(&job.job_id).unwrap();
        assert_eq!(stored.message, "started");
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[test]
    fn updates_from_many_threads_are_not_lost() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = store.insert(JobRecord::new("https://a", "started"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = job.job_id.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update(&id, &mut |job| {
                                job.completed_batches += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(&job.job_id).unwrap().completed_batches, 800);
    }

    #[test]
    fn update_of_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        let err = store.update("ghost", &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, JobError::NotFound { job_id } if job_id == "ghost"));
    }
}
