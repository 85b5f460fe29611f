use std::{cell::RefCell, collections::BinaryHeap};

use super::{Duration, Instant, Pending, Scheduler, Task, TaskHandle};

#[derive(Default)]
struct TrampolineQueue {
  heap: BinaryHeap<Pending<Instant>>,
  next_seq: u64,
}

impl TrampolineQueue {
  fn push(&mut self, due: Instant, pending: impl FnOnce(Instant, u64) -> Pending<Instant>) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.heap.push(pending(due, seq));
  }
}

thread_local! {
  // `Some` while the outermost `schedule` call on this thread is draining.
  static TRAMPOLINE: RefCell<Option<TrampolineQueue>> = const { RefCell::new(None) };
}

/// Per-thread work queue.
///
/// The outermost `schedule` on a thread becomes the drain loop; work
/// scheduled while draining, including by the running task itself, is queued
/// instead of run recursively. Entries run in due-time order and FIFO among
/// equal due times. Delays are honored by sleeping the draining thread until
/// the earliest entry is due.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrampolineScheduler;

impl TrampolineScheduler {
  /// Whether the current thread is inside a drain loop.
  pub fn is_draining() -> bool { TRAMPOLINE.with(|q| q.borrow().is_some()) }

  fn enqueue(due: Instant, task: super::BoxedTask, handle: TaskHandle) -> bool {
    TRAMPOLINE.with(|q| {
      let mut q = q.borrow_mut();
      let draining = q.is_some();
      q.get_or_insert_with(TrampolineQueue::default)
        .push(due, |due, seq| Pending { due, seq, task, handle });
      !draining
    })
  }

  fn drain() {
    struct Reset;
    impl Drop for Reset {
      fn drop(&mut self) { TRAMPOLINE.with(|q| *q.borrow_mut() = None); }
    }
    let _reset = Reset;

    while let Some(mut pending) = TRAMPOLINE.with(|q| q.borrow_mut().as_mut().and_then(|q| q.heap.pop())) {
      let now = Instant::now();
      if pending.due > now {
        std::thread::sleep(pending.due - now);
      }
      if let Some(delay) = (pending.task)(&pending.handle) {
        let Pending { task, handle, .. } = pending;
        TRAMPOLINE.with(|q| {
          if let Some(q) = q.borrow_mut().as_mut() {
            q.push(Instant::now() + delay, |due, seq| Pending { due, seq, task, handle });
          }
        });
      }
    }
  }
}

impl Scheduler for TrampolineScheduler {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let due = Instant::now() + delay.unwrap_or_default();
    if Self::enqueue(due, task.into_boxed(), handle.clone()) {
      Self::drain();
    }
    handle
  }
}
