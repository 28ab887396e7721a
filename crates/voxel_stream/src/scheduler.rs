//! Priority job scheduler backed by a fixed pool of worker threads.
//!
//! Jobs are opaque closures tagged with a [`JobPriority`]. Higher tiers always
//! run first; jobs of equal priority run in submission order (FIFO by a
//! monotonically increasing sequence id).
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = Scheduler::with_hardware_concurrency();
//!
//! scheduler.submit(JobPriority::High, move || expensive_computation());
//!
//! // Before a destructive reset: drop queued work, wait for in-flight work.
//! scheduler.clear_job_pool();
//! scheduler.wait_for_all_threads_finished();
//! ```
//!
//! A scheduler built with zero workers never runs anything on its own; the
//! driver drains it with [`Scheduler::run_pending`] on its own thread.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Priority tier. Strict: a queued `High` job always runs before any `Medium`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
  Min = 0,
  Low,
  Medium,
  High,
  Max,
}

type JobFn = Box<dyn FnOnce() + Send + 'static>;

struct Job {
  priority: JobPriority,
  seq: u64,
  work: JobFn,
}

impl PartialEq for Job {
  fn eq(&self, other: &Self) -> bool {
    self.priority == other.priority && self.seq == other.seq
  }
}

impl Eq for Job {}

impl PartialOrd for Job {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
    Some(self.cmp(other))
  }
}

impl Ord for Job {
  // BinaryHeap pops the greatest: highest priority, then lowest sequence id.
  fn cmp(&self, other: &Self) -> CmpOrdering {
    self
      .priority
      .cmp(&other.priority)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

struct QueueState {
  jobs: BinaryHeap<Job>,
  next_seq: u64,
  /// Jobs popped and not yet finished, across workers and manual drains.
  working: usize,
  shutdown: bool,
}

struct Shared {
  state: Mutex<QueueState>,
  /// Signalled when work is pushed or on shutdown.
  job_available: Condvar,
  /// Signalled when the queue is empty and nothing is running.
  all_idle: Condvar,
  /// Per-worker "mid-job" flag.
  busy: Vec<AtomicBool>,
  panicked: AtomicUsize,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn run(&self, job: Job, busy: Option<&AtomicBool>) {
    let seq = job.seq;
    if let Some(flag) = busy {
      flag.store(true, Ordering::Release);
    }
    if catch_unwind(AssertUnwindSafe(job.work)).is_err() {
      self.panicked.fetch_add(1, Ordering::Relaxed);
      log::error!("job {} panicked", seq);
    }
    if let Some(flag) = busy {
      flag.store(false, Ordering::Release);
    }

    let mut state = self.lock();
    state.working -= 1;
    if state.working == 0 && state.jobs.is_empty() {
      self.all_idle.notify_all();
    }
  }
}

/// Fixed-size worker pool draining a shared priority queue.
pub struct Scheduler {
  shared: Arc<Shared>,
  workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
  /// Spawn `worker_count` worker threads. Zero means manual draining.
  ///
  /// # Panics
  /// Panics if the OS refuses to spawn a worker thread.
  pub fn new(worker_count: usize) -> Self {
    let shared = Arc::new(Shared {
      state: Mutex::new(QueueState {
        jobs: BinaryHeap::new(),
        next_seq: 0,
        working: 0,
        shutdown: false,
      }),
      job_available: Condvar::new(),
      all_idle: Condvar::new(),
      busy: (0..worker_count).map(|_| AtomicBool::new(false)).collect(),
      panicked: AtomicUsize::new(0),
    });

    let workers = (0..worker_count)
      .map(|index| {
        let shared = Arc::clone(&shared);
        std::thread::Builder::new()
          .name(format!("voxel-worker-{}", index))
          .spawn(move || worker_loop(&shared, index))
          .unwrap_or_else(|err| panic!("failed to spawn voxel worker {}: {}", index, err))
      })
      .collect();

    log::info!("scheduler started with {} workers", worker_count);
    Self { shared, workers }
  }

  /// One worker per hardware thread.
  pub fn with_hardware_concurrency() -> Self {
    let count = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    Self::new(count)
  }

  /// Queue a job. Returns its sequence id.
  ///
  /// Wakes a single worker for a lone job, every worker once a backlog forms.
  pub fn submit<F>(&self, priority: JobPriority, work: F) -> u64
  where
    F: FnOnce() + Send + 'static,
  {
    let (seq, depth) = {
      let mut state = self.shared.lock();
      let seq = state.next_seq;
      state.next_seq += 1;
      state.jobs.push(Job {
        priority,
        seq,
        work: Box::new(work),
      });
      (seq, state.jobs.len())
    };

    if depth > 1 {
      self.shared.job_available.notify_all();
    } else {
      self.shared.job_available.notify_one();
    }
    seq
  }

  /// Discard every queued job. Jobs already popped still run to completion.
  ///
  /// Returns the number of discarded jobs.
  pub fn clear_job_pool(&self) -> usize {
    let discarded: Vec<Job> = {
      let mut state = self.shared.lock();
      let jobs = std::mem::take(&mut state.jobs).into_vec();
      if state.working == 0 {
        self.shared.all_idle.notify_all();
      }
      jobs
    };
    // Closures may own Region handles; drop them outside the lock.
    let count = discarded.len();
    drop(discarded);
    log::debug!("cleared {} queued jobs", count);
    count
  }

  /// Block until the queue is empty and no job is mid-execution.
  ///
  /// With zero workers the caller drains the queue itself.
  pub fn wait_for_all_threads_finished(&self) {
    if self.workers.is_empty() {
      while self.run_pending(usize::MAX) > 0 {}
      return;
    }

    let mut state = self.shared.lock();
    while !state.jobs.is_empty() || state.working > 0 {
      state = self
        .shared
        .all_idle
        .wait(state)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  /// Run up to `max_jobs` queued jobs on the calling thread.
  ///
  /// Returns how many ran.
  pub fn run_pending(&self, max_jobs: usize) -> usize {
    let mut ran = 0;
    while ran < max_jobs {
      let job = {
        let mut state = self.shared.lock();
        match state.jobs.pop() {
          Some(job) => {
            state.working += 1;
            job
          }
          None => break,
        }
      };
      self.shared.run(job, None);
      ran += 1;
    }
    ran
  }

  /// Number of worker threads (0 = manual draining).
  pub fn worker_count(&self) -> usize {
    self.workers.len()
  }

  /// Number of queued, not yet started jobs.
  pub fn pending_count(&self) -> usize {
    self.shared.lock().jobs.len()
  }

  /// True while worker `index` is executing a job.
  pub fn is_worker_busy(&self, index: usize) -> bool {
    self
      .shared
      .busy
      .get(index)
      .is_some_and(|flag| flag.load(Ordering::Acquire))
  }

  /// Number of jobs currently executing.
  pub fn running_count(&self) -> usize {
    self.shared.lock().working
  }

  /// True when nothing is queued or running.
  pub fn is_idle(&self) -> bool {
    let state = self.shared.lock();
    state.jobs.is_empty() && state.working == 0
  }

  /// Jobs that panicked since creation.
  pub fn panicked_count(&self) -> usize {
    self.shared.panicked.load(Ordering::Relaxed)
  }
}

impl Default for Scheduler {
  fn default() -> Self {
    Self::with_hardware_concurrency()
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    self.shared.lock().shutdown = true;
    self.shared.job_available.notify_all();
    for worker in self.workers.drain(..) {
      let _ = worker.join();
    }
    log::debug!("scheduler shut down");
  }
}

fn worker_loop(shared: &Shared, index: usize) {
  loop {
    let job = {
      let mut state = shared.lock();
      loop {
        if state.shutdown {
          return;
        }
        if let Some(job) = state.jobs.pop() {
          state.working += 1;
          break job;
        }
        state = shared
          .job_available
          .wait(state)
          .unwrap_or_else(PoisonError::into_inner);
      }
    };

    shared.run(job, shared.busy.get(index));
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
