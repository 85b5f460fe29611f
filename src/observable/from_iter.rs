use std::{convert::Infallible, marker::PhantomData};

use crate::{observable::Observable, observer::Observer};

/// Creates an observable that emits every item of `iter`, then completes.
///
/// Emission is synchronous and stops early once the observer is closed.
pub fn from_iter<I: IntoIterator>(iter: I) -> ObservableIter<I> { ObservableIter(iter) }

/// Creates an observable producing a single value.
pub fn of<Item>(v: Item) -> ObservableIter<std::iter::Once<Item>> { from_iter(std::iter::once(v)) }

/// Creates an observable that completes without emitting.
pub fn empty<Item>() -> ObservableIter<std::iter::Empty<Item>> { from_iter(std::iter::empty()) }

/// Creates an observable that fails with `err` right away.
pub fn throw_err<Item, Err>(err: Err) -> ThrowErr<Item, Err> { ThrowErr { err, _hint: PhantomData } }

#[derive(Clone)]
pub struct ObservableIter<I>(I);

impl<I> Observable for ObservableIter<I>
where
  I: IntoIterator,
{
  type Item = I::Item;
  type Err = Infallible;
  type Unsub = ();

  fn actual_subscribe<O>(self, mut observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, Infallible> + Send + 'static,
  {
    for v in self.0 {
      if observer.is_closed() {
        return;
      }
      observer.next(v);
    }
    if !observer.is_closed() {
      observer.complete();
    }
  }
}

#[derive(Clone)]
pub struct ThrowErr<Item, Err> {
  err: Err,
  _hint: PhantomData<fn() -> Item>,
}

impl<Item, Err> Observable for ThrowErr<Item, Err> {
  type Item = Item;
  type Err = Err;
  type Unsub = ();

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.error(self.err);
  }
}
