use crate::{
  observable::Observable,
  observer::Observer,
  subject::{Subject, SubjectSubscription},
};

/// A source paired with the subject that will multicast it.
///
/// Subscribing only registers with the subject; the source starts when
/// [`connect`](ConnectableObservable::connect) is called.
pub struct ConnectableObservable<S, P> {
  source: S,
  subject: P,
}

impl<S, P> ConnectableObservable<S, P> {
  pub fn new(source: S, subject: P) -> Self { ConnectableObservable { source, subject } }
}

impl<S, Item, Err> ConnectableObservable<S, Subject<Item, Err>>
where
  S: Observable<Item = Item, Err = Err>,
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
{
  /// A handle to the multicast side that stays usable after `connect`
  /// consumed `self`.
  pub fn fork(&self) -> Subject<Item, Err> { self.subject.clone() }

  /// Subscribe the subject to the source.
  pub fn connect(self) -> S::Unsub { self.source.actual_subscribe(self.subject) }
}

impl<S, Item, Err> Observable for ConnectableObservable<S, Subject<Item, Err>>
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
    self.subject.actual_subscribe(observer)
  }
}
