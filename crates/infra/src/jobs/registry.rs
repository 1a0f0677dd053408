//! Job registry: the shared table of job records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use docmint_core::{Job, JobError, JobId, JobResult};

/// Job registry abstraction.
///
/// Writes to one job are serialized; different jobs never contend beyond the
/// brief map lookup.
pub trait JobRegistry: Send + Sync + 'static {
    /// Insert a new job.
    fn insert(&self, job: Job) -> Result<(), RegistryError>;

    /// Get a snapshot of a job.
    fn get(&self, job_id: JobId) -> Result<Job, RegistryError>;

    /// Apply `f` to a job atomically.
    ///
    /// `f` works on a copy; the copy replaces the record only if `f` succeeds,
    /// so a rejected transition leaves the stored job untouched. Returns the
    /// committed snapshot.
    fn update<F>(&self, job_id: JobId, f: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job) -> JobResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error(transparent)]
    Transition(#[from] JobError),
}

/// In-memory job registry.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn entry(&self, job_id: JobId) -> Result<Arc<Mutex<Job>>, RegistryError> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(&job_id)
            .cloned()
            .ok_or(RegistryError::NotFound(job_id))
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn insert(&self, job: Job) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        if jobs.contains_key(&job.id) {
            return Err(RegistryError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, Arc::new(Mutex::new(job)));
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Job, RegistryError> {
        let entry = self.entry(job_id)?;
        let job = entry.lock().unwrap_or_else(|e| e.into_inner());
        Ok(job.clone())
    }

    fn update<F>(&self, job_id: JobId, f: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job) -> JobResult<()>,
    {
        let entry = self.entry(job_id)?;
        let mut job = entry.lock().unwrap_or_else(|e| e.into_inner());

        let mut draft = job.clone();
        f(&mut draft)?;
        *job = draft;
        Ok(job.clone())
    }

    fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<R: JobRegistry> JobRegistry for Arc<R> {
    fn insert(&self, job: Job) -> Result<(), RegistryError> {
        (**self).insert(job)
    }

    fn get(&self, job_id: JobId) -> Result<Job, RegistryError> {
        (**self).get(job_id)
    }

    fn update<F>(&self, job_id: JobId, f: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job) -> JobResult<()>,
    {
        (**self).update(job_id, f)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmint_core::{JobInput, JobStatus, PaymentId};
    use proptest::prelude::*;
    use serde_json::json;

    fn job() -> Job {
        let input: JobInput = [("text", "Name: Alice")].into_iter().collect();
        Job::new(JobId::new(), PaymentId::new("pay-1"), input, "buyer-1")
    }

    #[test]
    fn insert_and_get() {
        let registry = InMemoryJobRegistry::new();
        let job = job();
        let id = job.id;

        registry.insert(job.clone()).unwrap();
        assert_eq!(registry.get(id).unwrap().id, id);
        assert_eq!(registry.insert(job), Err(RegistryError::AlreadyExists(id)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_job_is_not_found() {
        let registry = InMemoryJobRegistry::new();
        let id = JobId::new();
        assert!(matches!(registry.get(id), Err(RegistryError::NotFound(missing)) if missing == id));
        assert!(matches!(
            registry.update(id, |_| Ok(())),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn rejected_update_leaves_record_untouched() {
        let registry = InMemoryJobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job).unwrap();

        // completing straight from awaiting_payment skips `running`
        let err = registry
            .update(id, |j| {
                j.set_payment_status("mutated");
                j.mark_completed(json!({}))
            })
            .unwrap_err();

        assert!(matches!(err, RegistryError::Transition(_)));
        let stored = registry.get(id).unwrap();
        assert_eq!(stored.status, JobStatus::AwaitingPayment);
        assert_eq!(stored.payment_status, "pending");
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let registry = InMemoryJobRegistry::arc();
        let job = job();
        let id = job.id;
        registry.insert(job).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.update(id, |j| j.mark_running()).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Running);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Run,
        Complete,
        Fail,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Run), Just(Op::Complete), Just(Op::Fail)]
    }

    proptest! {
        #[test]
        fn never_completed_without_result(ops in proptest::collection::vec(op(), 0..10)) {
            let registry = InMemoryJobRegistry::new();
            let job = job();
            let id = job.id;
            registry.insert(job).unwrap();

            for op in ops {
                let _ = registry.update(id, |j| match op {
                    Op::Run => j.mark_running(),
                    Op::Complete => j.mark_completed(json!({"status": "completed"})),
                    Op::Fail => j.mark_failed("boom", None),
                });
                let snapshot = registry.get(id).unwrap();
                prop_assert_eq!(snapshot.result.is_some(), snapshot.status == JobStatus::Completed);
                prop_assert_eq!(snapshot.error.is_some(), snapshot.status == JobStatus::Failed);
            }
        }
    }
}
