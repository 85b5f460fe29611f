//! Observables: push-based producers.
//!
//! An [`Observable`] is a description of a stream. Nothing happens until an
//! observer is handed to [`Observable::actual_subscribe`], which starts the
//! production and returns a [`Subscription`] that stops it. Every operator in
//! this crate is itself an `Observable` wrapping its upstream.
//!
//! [`ObservableExt`] carries the user-facing `subscribe_*` helpers and the
//! operator constructors; it is implemented for every observable.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxlab::prelude::*;
//!
//! let seen = Arc::new(Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! from_iter(0..10).buffer_count(4).subscribe(move |chunk| c_seen.lock().unwrap().push(chunk));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
//! ```

use std::convert::Infallible;

use crate::{
  observer::{FnMutObserver, Observer, ObserverAll, ObserverErr},
  ops::{
    buffer_count::BufferCountOp,
    combine_latest::CombineLatestOp,
    join::JoinOp,
    ref_count::RefCountOp,
    retry::{AlwaysRetry, FalliblePredicate, RetryConfig, RetryWhenOp},
    window::{WindowCountOp, WindowToggleOp},
  },
  scheduler::{Scheduler, TrampolineScheduler},
  subject::Subject,
  subscription::{Subscription, SubscriptionWrapper},
};

mod byte_source;
mod connectable;
mod create;
mod from_iter;

pub use byte_source::*;
pub use connectable::*;
pub use create::*;
pub use from_iter::*;

/// A producer of `Item`s that may fail with `Err`.
pub trait Observable: Sized {
  type Item;
  type Err;
  type Unsub: Subscription + Send + 'static;

  /// Start producing into `observer`.
  ///
  /// The returned subscription stops the production; no signal reaches
  /// `observer` after unsubscribing returns, except one that was already being
  /// delivered on another thread.
  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static;
}

pub trait ObservableExt: Observable {
  /// Subscribe with a `next` handler to a stream that cannot fail.
  fn subscribe<N>(self, next: N) -> SubscriptionWrapper<Self::Unsub>
  where
    Self: Observable<Err = Infallible>,
    N: FnMut(Self::Item) + Send + 'static,
  {
    SubscriptionWrapper(self.actual_subscribe(FnMutObserver(next)))
  }

  fn subscribe_err<N, E>(self, next: N, error: E) -> SubscriptionWrapper<Self::Unsub>
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
  {
    SubscriptionWrapper(self.actual_subscribe(ObserverErr::new(next, error)))
  }

  fn subscribe_all<N, E, C>(self, next: N, error: E, complete: C) -> SubscriptionWrapper<Self::Unsub>
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnOnce(Self::Err) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    SubscriptionWrapper(self.actual_subscribe(ObserverAll::new(next, error, complete)))
  }

  fn subscribe_with<O>(self, observer: O) -> SubscriptionWrapper<Self::Unsub>
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    SubscriptionWrapper(self.actual_subscribe(observer))
  }

  /// Multicast through a [`Subject`]; the source runs once `connect` is
  /// called on the returned value.
  fn publish(self) -> ConnectableObservable<Self, Subject<Self::Item, Self::Err>> {
    ConnectableObservable::new(self, Subject::default())
  }

  /// Share one connection to this source among all current subscribers.
  ///
  /// The first subscriber connects, the last one to leave disconnects, and
  /// the next subscriber after that connects again from scratch.
  fn share(self) -> RefCountOp<Self, Self::Item, Self::Err> { RefCountOp::new(self) }

  /// Resubscribe to the source after a failure, waiting `config.delay` on
  /// `scheduler`, while fewer than `config.count` retries were made and
  /// `predicate` accepts the error.
  fn retry_when<P, Sch>(self, config: RetryConfig, predicate: P, scheduler: Sch) -> RetryWhenOp<Self, P, Sch>
  where
    P: FnMut(&Self::Err) -> bool,
    Sch: Scheduler,
  {
    RetryWhenOp::new(self, config, predicate, scheduler)
  }

  /// Like [`retry_when`](ObservableExt::retry_when) with a predicate that can
  /// fail. The stream error becomes a [`RetryError`](crate::error::RetryError)
  /// telling exhaustion, rejection and predicate failure apart.
  fn try_retry_when<F, P, Sch>(
    self, config: RetryConfig, predicate: F, scheduler: Sch,
  ) -> RetryWhenOp<Self, FalliblePredicate<F>, Sch>
  where
    F: FnMut(&Self::Err) -> Result<bool, P>,
    Sch: Scheduler,
  {
    RetryWhenOp::new(self, config, FalliblePredicate(predicate), scheduler)
  }

  /// Resubscribe immediately on any error, at most `count` times.
  fn retry(self, count: usize) -> RetryWhenOp<Self, AlwaysRetry, TrampolineScheduler> {
    RetryWhenOp::new(self, RetryConfig::new().count(count), AlwaysRetry, TrampolineScheduler)
  }

  /// Split the source into windows: every item of `openings` opens a window,
  /// which stays open until the observable produced for it by
  /// `closing_selector` emits or completes.
  fn window_toggle<Open, F, C>(self, openings: Open, closing_selector: F) -> WindowToggleOp<Self, Open, F>
  where
    Open: Observable,
    F: FnMut(Open::Item) -> C,
  {
    WindowToggleOp::new(self, openings, closing_selector)
  }

  /// Split the source into consecutive windows of `count` items; the last
  /// window may be shorter.
  ///
  /// # Panics
  ///
  /// Panics if `count` is zero.
  fn window_count(self, count: usize) -> WindowCountOp<Self> { WindowCountOp::new(self, count) }

  /// Collect consecutive runs of `count` items into `Vec`s; the last one may
  /// be shorter.
  ///
  /// # Panics
  ///
  /// Panics if `count` is zero.
  fn buffer_count(self, count: usize) -> BufferCountOp<Self> { BufferCountOp::new(self, count) }

  /// Correlate two streams by overlapping windows: each value of either side
  /// is paired with every value of the other side whose window is still
  /// open. A value's window closes when the observable its duration selector
  /// returned emits.
  fn join<R, LD, RD, LDur, RDur, F, Out>(
    self, right: R, left_duration: LD, right_duration: RD, selector: F,
  ) -> JoinOp<Self, R, LD, RD, F>
  where
    R: Observable,
    LD: FnMut(&Self::Item) -> LDur,
    RD: FnMut(&R::Item) -> RDur,
    F: FnMut(Self::Item, R::Item) -> Out,
  {
    JoinOp::new(self, right, left_duration, right_duration, selector)
  }

  /// Emit `f(latest_a, latest_b)` whenever either side emits, once both
  /// sides emitted at least once.
  fn combine_latest<B, F, Out>(self, other: B, f: F) -> CombineLatestOp<Self, B, F>
  where
    B: Observable,
    F: FnMut(Self::Item, B::Item) -> Out,
  {
    CombineLatestOp::new(self, other, f)
  }
}

impl<T: Observable> ObservableExt for T {}
