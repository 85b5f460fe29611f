use std::{
  collections::BinaryHeap,
  io,
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use super::{BoxedTask, Duration, Instant, Pending, Scheduler, Task, TaskHandle};

#[derive(Default)]
struct TimerQueue {
  heap: BinaryHeap<Pending<Instant>>,
  next_seq: u64,
  shutdown: bool,
}

struct TimerShared {
  queue: Mutex<TimerQueue>,
  wakeup: Condvar,
}

impl TimerShared {
  fn lock(&self) -> MutexGuard<'_, TimerQueue> { self.queue.lock().unwrap_or_else(PoisonError::into_inner) }

  fn push(&self, due: Instant, task: BoxedTask, handle: TaskHandle) {
    let mut queue = self.lock();
    let seq = queue.next_seq;
    queue.next_seq += 1;
    queue.heap.push(Pending { due, seq, task, handle });
    drop(queue);
    self.wakeup.notify_one();
  }

  fn run(&self) {
    let mut queue = self.lock();
    loop {
      if queue.shutdown {
        return;
      }
      let now = Instant::now();
      match queue.heap.peek().map(|p| p.due) {
        None => {
          queue = self.wakeup.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }
        Some(due) if due > now => {
          queue = self
            .wakeup
            .wait_timeout(queue, due - now)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
        }
        Some(_) => {
          let Some(mut pending) = queue.heap.pop() else { continue };
          drop(queue);
          if let Some(delay) = (pending.task)(&pending.handle) {
            self.push(Instant::now() + delay, pending.task, pending.handle);
          }
          queue = self.lock();
        }
      }
    }
  }
}

/// Stops the timer thread once the last scheduler handle is gone.
struct TimerOwner(Arc<TimerShared>);

impl Drop for TimerOwner {
  fn drop(&mut self) {
    self.0.lock().shutdown = true;
    self.0.wakeup.notify_all();
  }
}

/// Runs work on one dedicated timer thread once it is due.
///
/// Entries are kept in a due-time heap; the thread sleeps on a condition
/// variable until the earliest one is due or new work arrives. Work still
/// queued when the last clone of the scheduler is dropped is discarded.
#[derive(Clone)]
pub struct TimerScheduler {
  shared: Arc<TimerShared>,
  _owner: Arc<TimerOwner>,
}

impl TimerScheduler {
  pub fn new() -> io::Result<Self> {
    let shared = Arc::new(TimerShared { queue: Mutex::new(TimerQueue::default()), wakeup: Condvar::new() });
    let c_shared = shared.clone();
    std::thread::Builder::new()
      .name("rxlab-timer".into())
      .spawn(move || c_shared.run())?;
    Ok(Self { _owner: Arc::new(TimerOwner(shared.clone())), shared })
  }
}

impl Scheduler for TimerScheduler {
  fn schedule<S: Send + 'static>(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let due = Instant::now() + delay.unwrap_or_default();
    self.shared.push(due, task.into_boxed(), handle.clone());
    handle
  }
}
