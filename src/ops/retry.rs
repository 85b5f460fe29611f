//! Resubscribe to a failed source, conditionally and after a delay.
//!
//! On every error of the source the operator first checks the retry budget:
//! once `count` resubscriptions were made, the next error ends the stream.
//! Otherwise the predicate decides. A retry waits `delay` on the scheduler and
//! then subscribes to the source again; nothing is resubscribed after the
//! returned subscription was released.
//!
//! ```rust
//! use std::sync::{
//!   Arc, Mutex,
//!   atomic::{AtomicUsize, Ordering},
//! };
//!
//! use rxlab::prelude::*;
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let c_attempts = attempts.clone();
//! let flaky = create(move |emitter: Emitter<&'static str, &'static str>| {
//!   if c_attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!     emitter.error("timeout");
//!   } else {
//!     emitter.next("payload");
//!     emitter.complete();
//!   }
//! });
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! flaky
//!   .retry_when(RetryConfig::new().count(3), |err: &&str| *err == "timeout", TrampolineScheduler)
//!   .subscribe_err(move |v| c_seen.lock().unwrap().push(v), |_| {});
//!
//! assert_eq!(*seen.lock().unwrap(), ["payload"]);
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicBool, Ordering},
};

use tracing::debug;

use crate::{
  error::RetryError,
  observable::Observable,
  observer::Observer,
  rc::MutArc,
  scheduler::{Duration, Scheduler, Task, TaskState},
  subscription::{MultiSubscription, SerialSubscription, Subscription},
};

/// How often and how late to retry.
///
/// The default retries without limit and without delay; the predicate alone
/// decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
  count: usize,
  delay: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self { Self { count: usize::MAX, delay: Duration::ZERO } }
}

impl RetryConfig {
  pub fn new() -> Self { Self::default() }

  /// Maximum number of resubscriptions. Zero fails on the first error.
  pub fn count(mut self, count: usize) -> Self {
    self.count = count;
    self
  }

  /// Wait before each resubscription.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

pub enum RetryDecision<E> {
  Retry,
  Fail(E),
}

/// Decides what happens to a source error.
///
/// `Err` is the error type the retried stream ends with.
pub trait RetryPredicate<E> {
  type Err;

  /// Judge an error while retries are left.
  fn decide(&mut self, err: E) -> RetryDecision<Self::Err>;

  /// Convert the error that arrived after the last allowed retry.
  fn exhausted(&mut self, err: E) -> Self::Err;
}

impl<E, F> RetryPredicate<E> for F
where
  F: FnMut(&E) -> bool,
{
  type Err = E;

  fn decide(&mut self, err: E) -> RetryDecision<E> {
    if self(&err) { RetryDecision::Retry } else { RetryDecision::Fail(err) }
  }

  fn exhausted(&mut self, err: E) -> E { err }
}

/// Retries every error.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysRetry;

impl<E> RetryPredicate<E> for AlwaysRetry {
  type Err = E;

  fn decide(&mut self, _: E) -> RetryDecision<E> { RetryDecision::Retry }

  fn exhausted(&mut self, err: E) -> E { err }
}

/// A predicate that can itself fail. The stream error becomes a
/// [`RetryError`]; a predicate failure keeps the error it was judging.
#[derive(Clone, Copy, Debug)]
pub struct FalliblePredicate<F>(pub F);

impl<E, P, F> RetryPredicate<E> for FalliblePredicate<F>
where
  F: FnMut(&E) -> Result<bool, P>,
{
  type Err = RetryError<E, P>;

  fn decide(&mut self, err: E) -> RetryDecision<Self::Err> {
    match (self.0)(&err) {
      Ok(true) => RetryDecision::Retry,
      Ok(false) => RetryDecision::Fail(RetryError::Rejected(err)),
      Err(failure) => RetryDecision::Fail(RetryError::Predicate { original: err, failure }),
    }
  }

  fn exhausted(&mut self, err: E) -> Self::Err { RetryError::Exhausted(err) }
}

#[derive(Clone)]
pub struct RetryWhenOp<S, P, Sch> {
  source: S,
  config: RetryConfig,
  predicate: P,
  scheduler: Sch,
}

impl<S, P, Sch> RetryWhenOp<S, P, Sch> {
  pub fn new(source: S, config: RetryConfig, predicate: P, scheduler: Sch) -> Self {
    RetryWhenOp { source, config, predicate, scheduler }
  }
}

impl<S, P, Sch> Observable for RetryWhenOp<S, P, Sch>
where
  S: Observable + Clone + Send + 'static,
  S::Item: 'static,
  S::Err: 'static,
  P: RetryPredicate<S::Err> + Send + 'static,
  P::Err: 'static,
  Sch: Scheduler,
{
  type Item = S::Item;
  type Err = P::Err;
  type Unsub = RetrySubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<S::Item, P::Err> + Send + 'static,
  {
    let subscription = RetrySubscription::default();
    let inner = Arc::new(RetryInner {
      source: Mutex::new(self.source),
      config: self.config,
      scheduler: self.scheduler,
      observer: MutArc::own(Some(observer)),
      control: Mutex::new(RetryControl { predicate: self.predicate, attempts: 0 }),
      subscription: subscription.clone(),
    });
    RetryInner::subscribe_source(&inner, 0);
    subscription
  }
}

struct RetryControl<P> {
  predicate: P,
  /// Resubscriptions made so far.
  attempts: usize,
}

struct RetryInner<S, P, O, Sch> {
  source: Mutex<S>,
  config: RetryConfig,
  scheduler: Sch,
  observer: MutArc<Option<O>>,
  control: Mutex<RetryControl<P>>,
  subscription: RetrySubscription,
}

impl<S, P, O, Sch> RetryInner<S, P, O, Sch>
where
  S: Observable + Clone + Send + 'static,
  S::Item: 'static,
  S::Err: 'static,
  P: RetryPredicate<S::Err> + Send + 'static,
  P::Err: 'static,
  O: Observer<S::Item, P::Err> + Send + 'static,
  Sch: Scheduler,
{
  fn is_closed(&self) -> bool { self.subscription.is_closed() }

  fn control(&self) -> std::sync::MutexGuard<'_, RetryControl<P>> {
    self.control.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn subscribe_source(this: &Arc<Self>, attempt: usize) {
    if this.is_closed() {
      return;
    }
    let source = this.source.lock().unwrap_or_else(PoisonError::into_inner).clone();
    let subscription = source.actual_subscribe(RetryObserver { inner: this.clone(), attempt });

    let control = this.control();
    if control.attempts == attempt {
      this.subscription.source.set(subscription);
    } else {
      // A synchronous failure already moved on to a later attempt.
      drop(control);
      subscription.unsubscribe();
    }
  }

  fn on_error(this: &Arc<Self>, attempt: usize, err: S::Err) {
    let decision = {
      let mut control = this.control();
      if control.attempts != attempt {
        return;
      }
      if control.attempts >= this.config.count {
        RetryDecision::Fail(control.predicate.exhausted(err))
      } else {
        let decision = control.predicate.decide(err);
        if let RetryDecision::Retry = decision {
          control.attempts += 1;
        }
        decision
      }
    };

    match decision {
      RetryDecision::Retry => {
        let attempt = attempt + 1;
        debug!(attempt, delay = ?this.config.delay, "retry resubscribing to source");
        let task = Task::new(ResubscribeTask { inner: this.clone(), attempt }, ResubscribeTask::step);
        let handle = this.scheduler.schedule(task, Some(this.config.delay));
        this.subscription.timers.append(handle);
      }
      RetryDecision::Fail(err) => {
        debug!(attempts = attempt, "retry giving up");
        this.subscription.closed.store(true, Ordering::Release);
        this.observer.clone().error(err);
        // Release the failed source and any leftover timers.
        this.subscription.clone().unsubscribe();
      }
    }
  }
}

struct ResubscribeTask<S, P, O, Sch> {
  inner: Arc<RetryInner<S, P, O, Sch>>,
  attempt: usize,
}

impl<S, P, O, Sch> ResubscribeTask<S, P, O, Sch>
where
  S: Observable + Clone + Send + 'static,
  S::Item: 'static,
  S::Err: 'static,
  P: RetryPredicate<S::Err> + Send + 'static,
  P::Err: 'static,
  O: Observer<S::Item, P::Err> + Send + 'static,
  Sch: Scheduler,
{
  fn step(&mut self) -> TaskState {
    RetryInner::subscribe_source(&self.inner, self.attempt);
    TaskState::Finished
  }
}

struct RetryObserver<S, P, O, Sch> {
  inner: Arc<RetryInner<S, P, O, Sch>>,
  attempt: usize,
}

impl<S, P, O, Sch> Observer<S::Item, S::Err> for RetryObserver<S, P, O, Sch>
where
  S: Observable + Clone + Send + 'static,
  S::Item: 'static,
  S::Err: 'static,
  P: RetryPredicate<S::Err> + Send + 'static,
  P::Err: 'static,
  O: Observer<S::Item, P::Err> + Send + 'static,
  Sch: Scheduler,
{
  fn next(&mut self, value: S::Item) {
    if self.inner.is_closed() {
      return;
    }
    if let Some(observer) = self.inner.observer.rc_deref_mut().as_mut() {
      observer.next(value);
    }
  }

  fn error(self, err: S::Err) {
    if !self.inner.is_closed() {
      RetryInner::on_error(&self.inner, self.attempt, err);
    }
  }

  fn complete(self) {
    if !self.inner.subscription.closed.swap(true, Ordering::AcqRel) {
      self.inner.observer.clone().complete();
      self.inner.subscription.clone().unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.inner.is_closed() }
}

/// Subscription of a retried stream: stops the current source subscription
/// and every pending resubscription.
#[derive(Clone, Default)]
pub struct RetrySubscription {
  closed: Arc<AtomicBool>,
  source: SerialSubscription,
  timers: MultiSubscription,
}

impl Subscription for RetrySubscription {
  fn unsubscribe(self) {
    self.closed.store(true, Ordering::Release);
    self.timers.unsubscribe();
    self.source.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}
