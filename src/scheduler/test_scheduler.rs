//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed, so
//! retry delays and timed sources can be tested without sleeping.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxlab::prelude::*;
//!
//! TestScheduler::init();
//! let fired = Arc::new(Mutex::new(false));
//! TestScheduler.schedule(
//!   Task::new(fired.clone(), |fired| {
//!     *fired.lock().unwrap() = true;
//!     TaskState::Finished
//!   }),
//!   Some(Duration::from_millis(100)),
//! );
//!
//! TestScheduler::advance_by(Duration::from_millis(99));
//! assert!(!*fired.lock().unwrap());
//! TestScheduler::advance_by(Duration::from_millis(1));
//! assert!(*fired.lock().unwrap());
//! ```
//!
//! # Thread Safety
//!
//! TestScheduler uses thread-local storage, so each thread has its own
//! independent virtual time and task queue. Tests running in parallel on
//! different threads do not see each other's tasks. Work must be scheduled
//! from the thread that advances the clock.

use std::{cell::RefCell, collections::BinaryHeap};

use super::{Duration, Pending, Scheduler, Task, TaskHandle};

struct TestSchedulerState {
  virtual_time: Duration,
  task_queue: BinaryHeap<Pending<Duration>>,
  next_task_id: u64,
  initialized: bool,
}

impl Default for TestSchedulerState {
  fn default() -> Self {
    Self { virtual_time: Duration::ZERO, task_queue: BinaryHeap::new(), next_task_id: 0, initialized: false }
  }
}

impl TestSchedulerState {
  fn push(&mut self, due: Duration, task: super::BoxedTask, handle: TaskHandle) {
    let seq = self.next_task_id;
    self.next_task_id += 1;
    self.task_queue.push(Pending { due, seq, task, handle });
  }
}

thread_local! {
  static TEST_SCHEDULER_STATE: RefCell<TestSchedulerState>
    = RefCell::new(TestSchedulerState::default());
}

/// A virtual time scheduler for deterministic testing.
///
/// This is a zero-sized type that accesses thread-local state.
/// All instances in the same thread share the same virtual time and task queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestScheduler;

impl TestScheduler {
  /// Initialize or reset the test scheduler state.
  ///
  /// Resets the virtual time to zero and clears the task queue. Call it at
  /// the start of each test.
  pub fn init() {
    TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      state.virtual_time = Duration::ZERO;
      state.task_queue.clear();
      state.next_task_id = 0;
      state.initialized = true;
    });
  }

  fn ensure_initialized() {
    TEST_SCHEDULER_STATE.with(|state| {
      assert!(
        state.borrow().initialized,
        "TestScheduler::init() must be called before using the scheduler"
      );
    });
  }

  /// The current virtual time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn now() -> Duration {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time)
  }

  /// Number of queued tasks, cancelled ones included until they are due.
  pub fn pending_count() -> usize {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| state.borrow().task_queue.len())
  }

  pub fn is_empty() -> bool { Self::pending_count() == 0 }

  fn execute_tasks_until(target_time: Option<Duration>) {
    loop {
      let task = TEST_SCHEDULER_STATE.with(|state| {
        let mut state = state.borrow_mut();
        let due = state
          .task_queue
          .peek()
          .is_some_and(|peek| target_time.is_none_or(|limit| peek.due <= limit));
        if !due {
          return None;
        }
        let pending = state.task_queue.pop()?;
        state.virtual_time = pending.due;
        Some(pending)
      });

      let Some(mut pending) = task else {
        break;
      };

      // The state borrow is released while the task runs: tasks schedule more
      // work.
      if let Some(delay) = (pending.task)(&pending.handle) {
        TEST_SCHEDULER_STATE.with(|state| {
          let mut state = state.borrow_mut();
          let due = state.virtual_time + delay;
          state.push(due, pending.task, pending.handle);
        });
      }
    }
  }

  /// Advance virtual time by the specified duration and execute due tasks.
  ///
  /// Tasks are executed in order of their scheduled time, with FIFO ordering
  /// for tasks scheduled at the same time.
  pub fn advance_by(duration: Duration) {
    Self::ensure_initialized();
    let target_time = TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time + duration);

    Self::execute_tasks_until(Some(target_time));

    TEST_SCHEDULER_STATE.with(|state| {
      state.borrow_mut().virtual_time = target_time;
    });
  }

  /// Execute all pending tasks, moving the clock to each task's due time.
  ///
  /// Tasks that keep rescheduling themselves run until they finish or are
  /// cancelled.
  pub fn flush() {
    Self::ensure_initialized();
    Self::execute_tasks_until(None);
  }
}

impl Scheduler for TestScheduler {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    TestScheduler::ensure_initialized();
    let handle = TaskHandle::new();
    TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      let due = state.virtual_time + delay.unwrap_or(Duration::ZERO);
      state.push(due, task.into_boxed(), handle.clone());
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::{
    mem,
    sync::{Arc, Mutex},
  };

  use super::*;
  use crate::{scheduler::TaskState, subscription::Subscription};

  type Log = Arc<Mutex<Vec<(&'static str, Duration)>>>;

  fn record(log: &Log, name: &'static str, delay: Option<u64>) -> TaskHandle {
    TestScheduler.schedule(
      Task::new((log.clone(), name), |(log, name)| {
        log.lock().unwrap().push((*name, TestScheduler::now()));
        TaskState::Finished
      }),
      delay.map(Duration::from_millis),
    )
  }

  #[rxlab_macro::test]
  fn zero_sized_and_copy() {
    assert_eq!(mem::size_of::<TestScheduler>(), 0);
    let s1 = TestScheduler;
    let _s2 = s1;
    let _s3 = s1;
  }

  #[rxlab_macro::test]
  fn init_resets_clock_and_queue() {
    TestScheduler::init();
    let log = Log::default();
    record(&log, "dropped", Some(10));
    TestScheduler::advance_by(Duration::from_millis(5));
    assert_eq!(TestScheduler::now(), Duration::from_millis(5));

    TestScheduler::init();
    assert_eq!(TestScheduler::now(), Duration::ZERO);
    assert!(TestScheduler::is_empty());
  }

  #[rxlab_macro::test]
  #[should_panic(expected = "TestScheduler::init() must be called")]
  fn panics_without_init() {
    TEST_SCHEDULER_STATE.with(|s| s.borrow_mut().initialized = false);
    TestScheduler::now();
  }

  #[rxlab_macro::test]
  fn advance_runs_due_tasks_in_order() {
    TestScheduler::init();
    let log = Log::default();
    record(&log, "late", Some(100));
    record(&log, "now", None);
    record(&log, "mid", Some(50));
    record(&log, "mid2", Some(50));
    assert_eq!(TestScheduler::pending_count(), 4);

    TestScheduler::advance_by(Duration::from_millis(60));
    assert_eq!(
      *log.lock().unwrap(),
      vec![
        ("now", Duration::ZERO),
        ("mid", Duration::from_millis(50)),
        ("mid2", Duration::from_millis(50)),
      ]
    );
    assert_eq!(TestScheduler::now(), Duration::from_millis(60));

    TestScheduler::flush();
    assert_eq!(log.lock().unwrap().last(), Some(&("late", Duration::from_millis(100))));
  }

  #[rxlab_macro::test]
  fn sleeping_task_reschedules_relative_to_virtual_time() {
    TestScheduler::init();
    let log = Log::default();
    TestScheduler.schedule(
      Task::new((log.clone(), 0), |(log, n)| {
        log.lock().unwrap().push(("tick", TestScheduler::now()));
        *n += 1;
        if *n < 3 { TaskState::Sleeping(Duration::from_millis(10)) } else { TaskState::Finished }
      }),
      None,
    );
    TestScheduler::flush();
    let times: Vec<_> = log.lock().unwrap().iter().map(|(_, t)| t.as_millis()).collect();
    assert_eq!(times, vec![0, 10, 20]);
  }

  #[rxlab_macro::test]
  fn cancelled_task_never_runs() {
    TestScheduler::init();
    let log = Log::default();
    record(&log, "cancelled", Some(10)).unsubscribe();
    TestScheduler::flush();
    assert!(log.lock().unwrap().is_empty());
  }
}
