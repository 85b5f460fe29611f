//! Schedulers decide when and on which execution context work runs.
//!
//! Work is described by a [`Task`]: a piece of state plus a plain function
//! pointer that advances it. The function reports what should happen next
//! through [`TaskState`]:
//!
//! - `Finished`: the task is done.
//! - `Yield`: run the task again as soon as possible.
//! - `Sleeping(d)`: run the task again after `d`.
//!
//! Rescheduling is therefore a return value, not a nested `schedule` call.
//! Every scheduler turns a self-rescheduling task into a loop or a requeue,
//! so a task that yields a million times runs on a flat stack.
//!
//! ```rust
//! use rxlab::prelude::*;
//!
//! let handle = ImmediateScheduler.schedule(
//!   Task::new(0, |count| {
//!     *count += 1;
//!     if *count < 1_000_000 { TaskState::Yield } else { TaskState::Finished }
//!   }),
//!   None,
//! );
//! assert!(handle.is_closed());
//! ```

use std::{
  cmp::Ordering as CmpOrdering,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

pub use std::time::{Duration, Instant};

use crate::subscription::Subscription;

mod immediate;
pub mod test_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "timer")]
mod timer;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;
mod trampoline;

pub use immediate::ImmediateScheduler;
pub use test_scheduler::TestScheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::ThreadPoolScheduler;
#[cfg(feature = "timer")]
pub use timer::TimerScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;
pub use trampoline::TrampolineScheduler;

/// What a task wants after one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
  Finished,
  Yield,
  Sleeping(Duration),
}

/// A unit of schedulable work: state plus the function that advances it.
///
/// The handler is a function pointer rather than a closure so the task type
/// stays nameable; everything the handler needs travels in `state`.
pub struct Task<S> {
  state: S,
  handler: fn(&mut S) -> TaskState,
}

impl<S> Task<S> {
  pub fn new(state: S, handler: fn(&mut S) -> TaskState) -> Self { Self { state, handler } }

  /// Run one step of the task.
  #[inline]
  pub fn step(&mut self) -> TaskState { (self.handler)(&mut self.state) }

  /// Run one step unless `handle` was cancelled. Returns the delay before the
  /// next step, or `None` when the task is over.
  pub(crate) fn run(&mut self, handle: &TaskHandle) -> Option<Duration> {
    if handle.is_cancelled() {
      handle.mark_finished();
      return None;
    }
    match self.step() {
      TaskState::Finished => {
        handle.mark_finished();
        None
      }
      TaskState::Yield => Some(Duration::ZERO),
      TaskState::Sleeping(delay) => Some(delay),
    }
  }
}

/// Type-erased task as stored by queue based schedulers.
pub(crate) type BoxedTask = Box<dyn FnMut(&TaskHandle) -> Option<Duration> + Send>;

impl<S: Send + 'static> Task<S> {
  pub(crate) fn into_boxed(mut self) -> BoxedTask { Box::new(move |handle| self.run(handle)) }
}

struct TaskFlags {
  cancelled: AtomicBool,
  finished: AtomicBool,
}

/// Handle to scheduled work. Unsubscribing cancels every step that has not
/// started yet; a step already running is not interrupted.
#[derive(Clone)]
pub struct TaskHandle {
  // `None` is a task that finished before anyone could observe it.
  inner: Option<Arc<TaskFlags>>,
}

impl TaskHandle {
  /// A handle for a task that is already finished.
  pub fn finished() -> Self { Self { inner: None } }

  pub(crate) fn new() -> Self {
    Self {
      inner: Some(Arc::new(TaskFlags {
        cancelled: AtomicBool::new(false),
        finished: AtomicBool::new(false),
      })),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self
      .inner
      .as_ref()
      .is_some_and(|flags| flags.cancelled.load(Ordering::Acquire))
  }

  pub fn is_finished(&self) -> bool {
    self
      .inner
      .as_ref()
      .is_none_or(|flags| flags.finished.load(Ordering::Acquire))
  }

  pub(crate) fn mark_finished(&self) {
    if let Some(flags) = &self.inner {
      flags.finished.store(true, Ordering::Release);
    }
  }
}

impl Subscription for TaskHandle {
  fn unsubscribe(self) {
    if let Some(flags) = &self.inner {
      flags.cancelled.store(true, Ordering::Release);
    }
  }

  fn is_closed(&self) -> bool { self.is_finished() || self.is_cancelled() }
}

/// Executes [`Task`]s.
///
/// Implementations must accept tasks from any thread and must never run a
/// step of a task whose handle was cancelled before the step started.
pub trait Scheduler: Clone + Send + Sync + 'static {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle;
}

/// Queue entry shared by the scheduler implementations that keep a due-time
/// ordered heap. `T` is the clock type (wall clock or virtual time).
pub(crate) struct Pending<T> {
  pub(crate) due: T,
  pub(crate) seq: u64,
  pub(crate) task: BoxedTask,
  pub(crate) handle: TaskHandle,
}

impl<T: Ord> PartialEq for Pending<T> {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl<T: Ord> Eq for Pending<T> {}

impl<T: Ord> PartialOrd for Pending<T> {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> { Some(self.cmp(other)) }
}

impl<T: Ord> Ord for Pending<T> {
  fn cmp(&self, other: &Self) -> CmpOrdering {
    // Min-heap: earlier due first, then FIFO by sequence number
    other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
  }
}
