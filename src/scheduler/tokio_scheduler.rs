use tokio::runtime::{Handle, TryCurrentError};

use super::{Duration, Scheduler, Task, TaskHandle};

/// Runs work as tasks on a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
  runtime: Handle,
}

impl TokioScheduler {
  pub fn new(runtime: Handle) -> Self { Self { runtime } }

  /// Uses the runtime the caller is running on.
  pub fn current() -> Result<Self, TryCurrentError> { Handle::try_current().map(Self::new) }
}

impl Scheduler for TokioScheduler {
  fn schedule<S: Send + 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    self.runtime.spawn(async move {
      let mut delay = delay;
      loop {
        match delay.take() {
          Some(d) if !d.is_zero() => tokio::time::sleep(d).await,
          Some(_) => tokio::task::yield_now().await,
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
