//! Make a source behave like an ordinary observable while sharing one
//! subscription to it among every current subscriber.
//!
//! Internally it counts the subscriptions and subscribes (only once) to the
//! source when the first one arrives. When the count drops back to zero it
//! unsubscribes from the source. A subscriber arriving after that starts a
//! fresh connection with a fresh subject: the source is restarted cold.
//! A source that terminates on its own resets the state the same way, so the
//! next subscriber restarts it too.
//!
//! Every subscription remembers the connection generation it joined; a stale
//! subscription released after a restart does not touch the new count.

use tracing::trace;

use crate::{
  observable::Observable,
  observer::Observer,
  rc::MutArc,
  subject::{Subject, SubjectSubscription},
  subscription::{BoxSubscription, Subscription},
};

struct RefCountState<Item, Err> {
  subject: Option<Subject<Item, Err>>,
  connection: Option<BoxSubscription>,
  count: usize,
  generation: u64,
}

impl<Item, Err> RefCountState<Item, Err> {
  /// Forget the current connection; returns it so the caller can release it
  /// outside the lock.
  fn reset(&mut self) -> Option<BoxSubscription> {
    self.subject = None;
    self.count = 0;
    self.generation += 1;
    self.connection.take()
  }
}

pub struct RefCountOp<S, Item, Err> {
  source: S,
  state: MutArc<RefCountState<Item, Err>>,
}

impl<S, Item, Err> RefCountOp<S, Item, Err> {
  pub fn new(source: S) -> Self {
    let state = RefCountState { subject: None, connection: None, count: 0, generation: 0 };
    RefCountOp { source, state: MutArc::own(state) }
  }

  /// Number of subscribers sharing the current connection.
  pub fn subscriber_count(&self) -> usize { self.state.rc_deref().count }

  pub fn is_connected(&self) -> bool { self.state.rc_deref().subject.is_some() }
}

impl<S: Clone, Item, Err> Clone for RefCountOp<S, Item, Err> {
  fn clone(&self) -> Self { RefCountOp { source: self.source.clone(), state: self.state.clone() } }
}

impl<S, Item, Err> Observable for RefCountOp<S, Item, Err>
where
  S: Observable<Item = Item, Err = Err>,
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;
  type Unsub = RefCountSubscription<Item, Err>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let (subject, generation, need_connect) = {
      let mut state = self.state.rc_deref_mut();
      let need_connect = state.subject.is_none();
      let subject = state.subject.get_or_insert_with(Subject::default).clone();
      state.count += 1;
      (subject, state.generation, need_connect)
    };

    // Register before connecting so a synchronous source reaches this
    // observer too.
    let subscription = subject.clone().actual_subscribe(observer);

    if need_connect {
      trace!(generation, "ref_count connecting to source");
      let connection = self.source.actual_subscribe(ConnectionObserver {
        subject,
        state: self.state.clone(),
        generation,
      });
      let mut state = self.state.rc_deref_mut();
      if state.generation == generation {
        state.connection = Some(BoxSubscription::new(connection));
      } else {
        // Terminated or abandoned while connecting.
        drop(state);
        connection.unsubscribe();
      }
    }

    RefCountSubscription { subscription, state: self.state, generation }
  }
}

/// Feeds the shared subject and resets the shared state when the source
/// terminates.
struct ConnectionObserver<Item, Err> {
  subject: Subject<Item, Err>,
  state: MutArc<RefCountState<Item, Err>>,
  generation: u64,
}

impl<Item, Err> ConnectionObserver<Item, Err> {
  fn release(&self) {
    let mut state = self.state.rc_deref_mut();
    if state.generation == self.generation {
      // The connection already ended; dropping it is enough.
      drop(state.reset());
    }
  }
}

impl<Item: Clone, Err: Clone> Observer<Item, Err> for ConnectionObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.subject.next(value) }

  fn error(self, err: Err) {
    self.release();
    self.subject.error(err)
  }

  fn complete(self) {
    self.release();
    self.subject.complete()
  }

  fn is_closed(&self) -> bool { self.subject.is_terminated() }
}

pub struct RefCountSubscription<Item, Err> {
  subscription: SubjectSubscription<Item, Err>,
  state: MutArc<RefCountState<Item, Err>>,
  generation: u64,
}

impl<Item, Err> Subscription for RefCountSubscription<Item, Err> {
  fn unsubscribe(self) {
    self.subscription.unsubscribe();
    let connection = {
      let mut state = self.state.rc_deref_mut();
      if state.generation != self.generation {
        return;
      }
      state.count = state.count.saturating_sub(1);
      if state.count > 0 {
        return;
      }
      state.reset()
    };
    trace!(generation = self.generation, "ref_count disconnecting from source");
    connection.unsubscribe();
  }

  fn is_closed(&self) -> bool { self.subscription.is_closed() }
}
