use super::{Duration, Scheduler, Task, TaskHandle};

/// Runs work inline on the calling thread.
///
/// Delays block the caller. A task that yields is stepped again in a loop, so
/// `schedule` returns only once the task finished or was cancelled from
/// inside one of its own steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn schedule<S: Send + 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let mut delay = delay;
    loop {
      if let Some(d) = delay.filter(|d| !d.is_zero()) {
        std::thread::sleep(d);
      }
      match task.run(&handle) {
        Some(next) => delay = Some(next),
        None => break,
      }
    }
    handle
  }
}
