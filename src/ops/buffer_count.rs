//! BufferCount operator implementation.

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  ops::window::WindowCountOp,
  rc::MutArc,
  subject::Subject,
};

/// BufferCount operator.
///
/// Runs [`WindowCountOp`] and collapses every window into a `Vec`, emitted
/// when that window closes. The last buffer may be shorter than `count`.
#[derive(Clone)]
pub struct BufferCountOp<S> {
  windows: WindowCountOp<S>,
}

impl<S> BufferCountOp<S> {
  /// # Panics
  ///
  /// Panics if `count` is zero.
  pub fn new(source: S, count: usize) -> Self { BufferCountOp { windows: WindowCountOp::new(source, count) } }
}

impl<S> Observable for BufferCountOp<S>
where
  S: Observable,
  S::Item: Clone + Send + 'static,
  S::Err: Clone + Send + 'static,
{
  type Item = Vec<S::Item>;
  type Err = S::Err;
  type Unsub = <WindowCountOp<S> as Observable>::Unsub;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Vec<S::Item>, S::Err> + Send + 'static,
  {
    self.windows.actual_subscribe(BufferWindowsObserver { observer: MutArc::own(Some(observer)) })
  }
}

/// Receives the windows and attaches a collector to each.
struct BufferWindowsObserver<O> {
  observer: MutArc<Option<O>>,
}

impl<Item, Err, O> Observer<Subject<Item, Err>, Err> for BufferWindowsObserver<O>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
  O: Observer<Vec<Item>, Err> + Send + 'static,
{
  fn next(&mut self, window: Subject<Item, Err>) {
    window.subscribe_with(BufferObserver { observer: self.observer.clone(), buffer: Vec::new() });
  }

  fn error(self, err: Err) { self.observer.error(err) }

  fn complete(self) { self.observer.complete() }

  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

struct BufferObserver<O, Item> {
  observer: MutArc<Option<O>>,
  buffer: Vec<Item>,
}

impl<O, Item, Err> Observer<Item, Err> for BufferObserver<O, Item>
where
  O: Observer<Vec<Item>, Err>,
{
  fn next(&mut self, v: Item) { self.buffer.push(v); }

  // The outer stream reports the error.
  fn error(self, _: Err) {}

  fn complete(self) {
    if let Some(observer) = self.observer.rc_deref_mut().as_mut() {
      observer.next(self.buffer);
    }
  }

  fn is_closed(&self) -> bool { self.observer.is_closed() }
}
