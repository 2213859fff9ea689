use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    od_env::OdEnv,
    od_task::{CancellationToken, OdTask, ProgressSnapshot, TaskProgress, TaskState},
    orbit_type::OrbitState,
    tlefit_errors::TleFitError,
};

pub const DEFAULT_WORKERS: usize = 10;

/// Task identifier: 128 random bits as 32 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    fn generate() -> Self {
        TaskId(format!("{:032x}", rand::random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_owned())
    }
}

#[derive(Debug, Clone)]
struct TaskHandle {
    progress: Arc<TaskProgress>,
    cancel: CancellationToken,
}

/// Runs [`OdTask`]s on a bounded worker pool; callers follow them by [`TaskId`].
///
/// The identifier map is the only state shared between submitters and observers; each task
/// is owned by the worker running it.
///
/// ```rust, no_run
/// use std::sync::Arc;
/// use tlefit::od_env::OdEnv;
/// use tlefit::od_task::{config::OdConfig, runner::OdTaskRunner, OdTask};
///
/// # let observations: tlefit::observations::ObservationSet = todo!();
/// let runner = OdTaskRunner::new(Arc::new(OdEnv::new()), 4)?;
/// let id = runner.submit(OdTask::new(observations, OdConfig::default()));
/// let done = runner.wait(&id).unwrap();
/// println!("{:?}: {}", done.state, done.status);
/// # Ok::<(), tlefit::tlefit_errors::TleFitError>(())
/// ```
pub struct OdTaskRunner {
    env: Arc<OdEnv>,
    pool: ThreadPool,
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl OdTaskRunner {
    /// Runner with `workers` threads.
    ///
    /// Return
    /// ------
    /// * `Err(TleFitError::WorkerPool)` if the pool cannot be built.
    pub fn new(env: Arc<OdEnv>, workers: usize) -> Result<Self, TleFitError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("od-worker-{i}"))
            .build()
            .map_err(|e| TleFitError::WorkerPool(e.to_string()))?;
        Ok(OdTaskRunner {
            env,
            pool,
            tasks: RwLock::new(HashMap::new()),
        })
    }

    /// Runner with [`DEFAULT_WORKERS`] threads.
    pub fn with_default_pool(env: Arc<OdEnv>) -> Result<Self, TleFitError> {
        Self::new(env, DEFAULT_WORKERS)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a task and return its identifier.
    pub fn submit(&self, task: OdTask) -> TaskId {
        let id = TaskId::generate();
        let handle = TaskHandle {
            progress: task.progress(),
            cancel: task.cancellation_token(),
        };
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handle);
        info!("Task {id} submitted");

        let env = Arc::clone(&self.env);
        let task_id = id.clone();
        self.pool.spawn(move || {
            if let Err(e) = task.run(&env) {
                info!("Task {task_id} ended with error: {e}");
            }
        });
        id
    }

    fn handle(&self, id: &TaskId) -> Option<TaskHandle> {
        let found = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        if found.is_none() {
            info!("No task for id {id}");
        }
        found
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskState> {
        Some(self.handle(id)?.progress.state())
    }

    pub fn status_text(&self, id: &TaskId) -> Option<String> {
        Some(self.handle(id)?.progress.status())
    }

    pub fn progress(&self, id: &TaskId) -> Option<ProgressSnapshot> {
        Some(self.handle(id)?.progress.snapshot())
    }

    /// Best state found so far, final once the task is terminal.
    pub fn result(&self, id: &TaskId) -> Option<OrbitState> {
        self.handle(id)?.progress.result()
    }

    /// Request cancellation; `false` for an unknown id.
    pub fn cancel(&self, id: &TaskId) -> bool {
        match self.handle(id) {
            Some(h) => {
                h.cancel.cancel();
                info!("Task {id} cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Block until the task is terminal.
    pub fn wait(&self, id: &TaskId) -> Option<ProgressSnapshot> {
        Some(self.handle(id)?.progress.wait())
    }

    /// Forget a terminal task and hand back its final snapshot.
    ///
    /// Return
    /// ------
    /// * `None` for an unknown id, or for a task still running; that task stays registered.
    pub fn take(&self, id: &TaskId) -> Option<ProgressSnapshot> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = tasks.get(id)?.progress.snapshot();
        if !snapshot.state.is_terminal() {
            info!("Task {id} is still {:?}, kept", snapshot.state);
            return None;
        }
        tasks.remove(id);
        info!("Task {id} released");
        Some(snapshot)
    }

    /// Forget every terminal task; returns how many were dropped.
    pub fn purge_finished(&self) -> usize {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, h| !h.progress.state().is_terminal());
        let dropped = before - tasks.len();
        if dropped > 0 {
            info!("Released {dropped} finished tasks");
        }
        dropped
    }
}

impl fmt::Debug for OdTaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdTaskRunner")
            .field("workers", &self.workers())
            .field("tasks", &self.task_ids().len())
            .finish()
    }
}

#[cfg(test)]
mod test_runner {
    use super::*;

    #[test]
    fn test_task_id_format() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_id() {
        let runner = OdTaskRunner::new(Arc::new(OdEnv::new()), 1).unwrap();
        let id = TaskId::from("nope");
        assert_eq!(runner.status(&id), None);
        assert_eq!(runner.status_text(&id), None);
        assert!(runner.result(&id).is_none());
        assert!(!runner.cancel(&id));
        assert!(runner.wait(&id).is_none());
        assert!(runner.take(&id).is_none());
        assert_eq!(runner.purge_finished(), 0);
    }
}
