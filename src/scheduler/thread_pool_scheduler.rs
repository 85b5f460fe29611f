use std::{
  future::Future,
  io,
  pin::Pin,
  task::{Context, Poll},
};

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{Duration, Scheduler, Task, TaskHandle};

static DEFAULT_POOL: Lazy<ThreadPool> = Lazy::new(|| {
  ThreadPool::builder()
    .name_prefix("rxlab-pool-")
    .create()
    .expect("failed to start the default rxlab thread pool")
});

/// Runs work on a `futures` thread pool.
///
/// Each scheduled task becomes one spawned future. Delays are awaited, not
/// slept, so waiting never blocks a worker. A task
/// that yields gives the worker back to the pool between steps.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  /// A scheduler backed by a dedicated pool with `workers` threads.
  pub fn new(workers: usize) -> io::Result<Self> {
    ThreadPool::builder()
      .pool_size(workers)
      .name_prefix("rxlab-pool-")
      .create()
      .map(|pool| Self { pool })
  }
}

/// Shares one lazily started pool sized to the number of CPUs.
impl Default for ThreadPoolScheduler {
  fn default() -> Self { Self { pool: DEFAULT_POOL.clone() } }
}

impl Scheduler for ThreadPoolScheduler {
  fn schedule<S: Send + 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    self.pool.spawn_ok(async move {
      let mut delay = delay;
      loop {
        match delay.take() {
          Some(d) if !d.is_zero() => sleep(d).await,
          Some(_) => YieldNow(false).await,
          None => {}
        }
        match task.run(&c_handle) {
          Some(next) => delay = Some(next),
          None => break,
        }
      }
    });
    handle
  }
}

async fn sleep(d: Duration) { futures_time::task::sleep(d.into()).await; }

/// Pending exactly once, so other futures on the pool get a turn.
struct YieldNow(bool);

impl Future for YieldNow {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    if self.0 {
      Poll::Ready(())
    } else {
      self.0 = true;
      cx.waker().wake_by_ref();
      Poll::Pending
    }
  }
}
