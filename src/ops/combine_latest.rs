//! CombineLatest operator implementation.
//!
//! Built on [`join`](crate::observable::ObservableExt::join): each value of
//! one side stays open until that side emits again, so every new value meets
//! exactly the latest value of the other side. Both sides are shared first;
//! the duration streams are the same shared sources, which keeps the number
//! of real subscriptions at one per side. The result completes once both
//! sides completed.

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  subscription::MultiSubscription,
};

#[derive(Clone)]
pub struct CombineLatestOp<A, B, F> {
  a: A,
  b: B,
  selector: F,
}

impl<A, B, F> CombineLatestOp<A, B, F> {
  pub fn new(a: A, b: B, selector: F) -> Self { CombineLatestOp { a, b, selector } }
}

impl<A, B, F, Out> Observable for CombineLatestOp<A, B, F>
where
  A: Observable + Clone + Send + 'static,
  B: Observable<Err = A::Err> + Clone + Send + 'static,
  A::Item: Clone + Send + 'static,
  B::Item: Clone + Send + 'static,
  A::Err: Clone + Send + 'static,
  F: FnMut(A::Item, B::Item) -> Out + Send + 'static,
{
  type Item = Out;
  type Err = A::Err;
  type Unsub = MultiSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Out, A::Err> + Send + 'static,
  {
    let a = self.a.share();
    let b = self.b.share();
    let (a_next, b_next) = (a.clone(), b.clone());
    a.join(b, move |_| a_next.clone(), move |_| b_next.clone(), self.selector)
      .until_both_complete()
      .actual_subscribe(observer)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use crate::{
    observable::{Emitter, ObservableExt, create},
    observer::Observer,
    subject::Subject,
  };

  type Log = Arc<Mutex<Vec<String>>>;

  fn log_pairs<S>(source: S) -> Log
  where
    S: crate::observable::Observable<Item = String, Err = &'static str>,
  {
    let log = Log::default();
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    source.actual_subscribe(crate::observer::ObserverAll::new(
      move |v: String| l1.lock().unwrap().push(v),
      move |e: &'static str| l2.lock().unwrap().push(format!("error {e}")),
      move || l3.lock().unwrap().push("complete".to_owned()),
    ));
    log
  }

  #[rxlab_macro::test]
  fn waits_for_both_then_follows_latest() {
    let mut a = Subject::<i32, &'static str>::new();
    let mut b = Subject::<char, &'static str>::new();
    let log = log_pairs(a.clone().combine_latest(b.clone(), |x, y| format!("{x}{y}")));

    a.next(1);
    a.next(2);
    b.next('x');
    a.next(3);
    b.next('y');

    assert_eq!(*log.lock().unwrap(), vec!["2x", "3x", "3y"]);
  }

  #[rxlab_macro::test]
  fn completed_side_keeps_its_last_value() {
    let mut a = Subject::<i32, &'static str>::new();
    let mut b = Subject::<char, &'static str>::new();
    let log = log_pairs(a.clone().combine_latest(b.clone(), |x, y| format!("{x}{y}")));

    a.next(1);
    a.clone().complete();
    b.next('x');
    b.next('y');
    b.clone().complete();

    assert_eq!(*log.lock().unwrap(), vec!["1x", "1y", "complete"]);
  }

  #[rxlab_macro::test]
  fn side_completing_empty_waits_for_the_other() {
    let a = Subject::<i32, &'static str>::new();
    let mut b = Subject::<char, &'static str>::new();
    let log = log_pairs(a.clone().combine_latest(b.clone(), |x, y| format!("{x}{y}")));

    a.clone().complete();
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(b.subscriber_count(), 1);

    b.next('x');
    b.clone().complete();
    assert_eq!(*log.lock().unwrap(), vec!["complete"]);
    assert_eq!(b.subscriber_count(), 0);
  }

  #[rxlab_macro::test]
  fn error_on_either_side_ends_the_stream() {
    let mut a = Subject::<i32, &'static str>::new();
    let mut b = Subject::<char, &'static str>::new();
    let log = log_pairs(a.clone().combine_latest(b.clone(), |x, y| format!("{x}{y}")));

    a.next(1);
    b.next('x');
    b.clone().error("b failed");
    a.next(2);

    assert_eq!(*log.lock().unwrap(), vec!["1x", "error b failed"]);
  }

  #[rxlab_macro::test]
  fn each_side_is_subscribed_once() {
    let subscriptions = Arc::new(AtomicUsize::new(0));
    let source = |values: Vec<i32>, subscriptions: Arc<AtomicUsize>| {
      create(move |emitter: Emitter<i32, &'static str>| {
        subscriptions.fetch_add(1, Ordering::SeqCst);
        for v in values.iter().copied() {
          emitter.next(v);
        }
      })
    };

    let log = log_pairs(
      source(vec![1, 2], subscriptions.clone())
        .combine_latest(source(vec![10, 20, 30], subscriptions.clone()), |x, y| format!("{x}+{y}")),
    );

    assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    assert_eq!(*log.lock().unwrap(), vec!["2+10", "2+20", "2+30"]);
  }
}
