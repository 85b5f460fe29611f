//! Subject: the multicast hub.
//!
//! A [`Subject`] is both an [`Observer`] and an [`Observable`]. Values pushed
//! into any clone are delivered to every observer subscribed at that moment,
//! in subscription order. After a terminal signal the subject stays
//! terminated: late subscribers receive the same terminal signal right away.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxlab::prelude::*;
//!
//! let subject = Subject::<i32, ()>::default();
//! let seen = Arc::new(Mutex::new(vec![]));
//! for tag in ["a", "b"] {
//!   let seen = seen.clone();
//!   subject.clone().subscribe_err(move |v| seen.lock().unwrap().push((tag, v)), |_| {});
//! }
//!
//! subject.clone().next(1);
//! assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 1)]);
//! ```
//!
//! # Re-entrancy
//!
//! Delivery happens outside the subject's own lock, so an observer may
//! subscribe new observers or unsubscribe itself from inside `next`. Observers
//! added during a delivery do not receive the value being delivered.

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicBool, Ordering},
};

use smallvec::SmallVec;

use crate::{
  observable::Observable,
  observer::{BoxedObserver, IntoBoxedObserver, Observer},
  rc::MutArc,
  subscription::{DynamicSlots, Subscription},
};

#[derive(Clone)]
enum Terminal<Err> {
  Completed,
  Errored(Err),
}

/// One subscribed observer. `closed` is flipped without taking the observer
/// lock, so unsubscribing from inside the observer's own callback is safe.
struct Slot<Item, Err> {
  closed: AtomicBool,
  observer: Mutex<Option<BoxedObserver<'static, Item, Err>>>,
}

impl<Item, Err> Slot<Item, Err> {
  fn next(&self, value: Item) {
    if self.closed.load(Ordering::Acquire) {
      return;
    }
    let mut observer = self.observer.lock().unwrap_or_else(PoisonError::into_inner);
    if self.closed.load(Ordering::Acquire) {
      return;
    }
    if let Some(observer) = observer.as_mut() {
      observer.next(value);
    }
  }

  fn take(&self) -> Option<BoxedObserver<'static, Item, Err>> {
    if self.closed.swap(true, Ordering::AcqRel) {
      return None;
    }
    self.observer.lock().unwrap_or_else(PoisonError::into_inner).take()
  }
}

struct SubjectState<Item, Err> {
  observers: DynamicSlots<Arc<Slot<Item, Err>>>,
  terminal: Option<Terminal<Err>>,
}

impl<Item, Err> Default for SubjectState<Item, Err> {
  fn default() -> Self { Self { observers: DynamicSlots::new(), terminal: None } }
}

type Snapshot<Item, Err> = SmallVec<[Arc<Slot<Item, Err>>; 2]>;

pub struct Subject<Item, Err> {
  state: MutArc<SubjectState<Item, Err>>,
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn subscriber_count(&self) -> usize { self.state.rc_deref().observers.len() }

  /// Whether the subject already received a terminal signal.
  pub fn is_terminated(&self) -> bool { self.state.rc_deref().terminal.is_some() }

  fn terminate(&self, terminal: Terminal<Err>) -> Option<Snapshot<Item, Err>> {
    let mut state = self.state.rc_deref_mut();
    if state.terminal.is_some() {
      return None;
    }
    state.terminal = Some(terminal);
    Some(state.observers.drain().collect())
  }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self { Self { state: MutArc::own(SubjectState::default()) } }
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item: Clone, Err: Clone> Observer<Item, Err> for Subject<Item, Err> {
  fn next(&mut self, value: Item) {
    let observers: Snapshot<Item, Err> = {
      let state = self.state.rc_deref();
      if state.terminal.is_some() {
        return;
      }
      state.observers.iter().cloned().collect()
    };
    // The last observer gets the moved value.
    let mut iter = observers.iter().peekable();
    while let Some(slot) = iter.next() {
      if iter.peek().is_some() {
        slot.next(value.clone());
      } else {
        slot.next(value);
        break;
      }
    }
  }

  fn error(self, err: Err) {
    if let Some(observers) = self.terminate(Terminal::Errored(err.clone())) {
      for slot in observers {
        if let Some(observer) = slot.take() {
          observer.error(err.clone());
        }
      }
    }
  }

  fn complete(self) {
    if let Some(observers) = self.terminate(Terminal::Completed) {
      for slot in observers {
        if let Some(observer) = slot.take() {
          observer.complete();
        }
      }
    }
  }

  fn is_closed(&self) -> bool { self.is_terminated() }
}

impl<Item, Err> Observable for Subject<Item, Err>
where
  Item: 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;
  type Unsub = SubjectSubscription<Item, Err>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let mut state = self.state.rc_deref_mut();
    if let Some(terminal) = state.terminal.clone() {
      drop(state);
      match terminal {
        Terminal::Completed => observer.complete(),
        Terminal::Errored(err) => observer.error(err),
      }
      return SubjectSubscription { entry: None };
    }

    let slot = Arc::new(Slot { closed: AtomicBool::new(false), observer: Mutex::new(Some(observer.into_boxed())) });
    let id = state.observers.add(slot.clone());
    drop(state);
    SubjectSubscription { entry: Some((self.state, id, slot)) }
  }
}

/// Subscription to a [`Subject`]; removes the observer on unsubscribe.
pub struct SubjectSubscription<Item, Err> {
  entry: Option<(MutArc<SubjectState<Item, Err>>, usize, Arc<Slot<Item, Err>>)>,
}

impl<Item, Err> Subscription for SubjectSubscription<Item, Err> {
  fn unsubscribe(self) {
    if let Some((state, id, slot)) = self.entry {
      slot.closed.store(true, Ordering::Release);
      let removed = state.rc_deref_mut().observers.remove(id);
      drop(removed);
    }
  }

  fn is_closed(&self) -> bool {
    self
      .entry
      .as_ref()
      .is_none_or(|(_, _, slot)| slot.closed.load(Ordering::Acquire))
  }
}
