use std::{
  marker::PhantomData,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use crate::{
  observable::Observable,
  observer::{BoxedObserver, IntoBoxedObserver, Observer},
  rc::MutArc,
  subscription::Subscription,
};

/// Creates an observable from a subscribe function.
///
/// `f` runs once per subscription with an [`Emitter`] for that subscriber and
/// returns the teardown run on unsubscribe. The emitter can be moved into
/// scheduled work or another thread.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxlab::prelude::*;
///
/// let source = create(|emitter: Emitter<i32, &'static str>| {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.error("broken");
/// });
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let (c_seen, e_seen) = (seen.clone(), seen.clone());
/// source.subscribe_err(
///   move |v| c_seen.lock().unwrap().push(v.to_string()),
///   move |e| e_seen.lock().unwrap().push(e.to_string()),
/// );
/// assert_eq!(*seen.lock().unwrap(), ["1", "2", "broken"]);
/// ```
pub fn create<F, Item, Err, U>(f: F) -> Create<F, Item, Err>
where
  F: FnOnce(Emitter<Item, Err>) -> U,
  U: Subscription + Send + 'static,
{
  Create { f, _hint: PhantomData }
}

#[derive(Clone)]
pub struct Create<F, Item, Err> {
  f: F,
  _hint: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err, U> Observable for Create<F, Item, Err>
where
  F: FnOnce(Emitter<Item, Err>) -> U,
  U: Subscription + Send + 'static,
  Item: 'static,
  Err: 'static,
{
  type Item = Item;
  type Err = Err;
  type Unsub = CreateSubscription<U>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let closed = Arc::new(AtomicBool::new(false));
    let emitter = Emitter { observer: MutArc::own(Some(observer.into_boxed())), closed: closed.clone() };
    let teardown = (self.f)(emitter);
    CreateSubscription { closed, teardown: Some(teardown) }
  }
}

/// Push handle given to the function of [`create`].
///
/// Clones share one subscriber. Terminal signals go through [`Observer`] and
/// consume the handle; signal from a clone to keep emitting on the original.
/// Signals after a terminal signal, or after the subscription was released,
/// are dropped.
pub struct Emitter<Item, Err> {
  observer: MutArc<Option<BoxedObserver<'static, Item, Err>>>,
  closed: Arc<AtomicBool>,
}

impl<Item, Err> Clone for Emitter<Item, Err> {
  fn clone(&self) -> Self { Self { observer: self.observer.clone(), closed: self.closed.clone() } }
}

impl<Item, Err> Emitter<Item, Err> {
  pub fn next(&self, value: Item) {
    if self.closed.load(Ordering::Acquire) {
      return;
    }
    let mut observer = self.observer.rc_deref_mut();
    if self.closed.load(Ordering::Acquire) {
      return;
    }
    if let Some(observer) = observer.as_mut() {
      observer.next(value);
    }
  }

  /// Whether the subscriber stopped listening, by terminal signal or by
  /// unsubscribing.
  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire) || self.observer.rc_deref().as_ref().is_none_or(|o| o.is_closed())
  }

  fn take(&self) -> Option<BoxedObserver<'static, Item, Err>> {
    if self.closed.swap(true, Ordering::AcqRel) {
      return None;
    }
    self.observer.rc_deref_mut().take()
  }
}

impl<Item, Err> Observer<Item, Err> for Emitter<Item, Err> {
  fn next(&mut self, value: Item) { Emitter::next(self, value) }

  fn error(self, err: Err) {
    if let Some(observer) = self.take() {
      observer.error(err);
    }
  }

  fn complete(self) {
    if let Some(observer) = self.take() {
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool { Emitter::is_closed(self) }
}

/// Subscription returned by [`create`]: closes the emitter, then runs the
/// teardown.
pub struct CreateSubscription<U> {
  closed: Arc<AtomicBool>,
  teardown: Option<U>,
}

impl<U: Subscription> Subscription for CreateSubscription<U> {
  fn unsubscribe(self) {
    // Only the flag is touched here, never the observer lock: this may run
    // from inside the observer's own `next`.
    self.closed.store(true, Ordering::Release);
    self.teardown.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}
