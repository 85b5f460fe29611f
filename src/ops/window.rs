//! Windowing: split a stream into a stream of sub-streams.
//!
//! Each window is a [`Subject`] emitted downstream when it opens. Items are
//! pushed into every window open at the time they arrive. Windows are
//! completed when they close and all open windows share the fate of the
//! source: completed when it completes, failed when it fails.

use std::sync::Arc;

use tracing::trace;

use crate::{
  observable::{Observable, ObservableExt},
  observer::Observer,
  rc::MutArc,
  subject::Subject,
  subscription::{DynamicSlots, MultiSubscription, SerialSubscription, Subscription, ZipSubscription},
};

#[derive(Clone)]
pub struct WindowToggleOp<S, Open, F> {
  source: S,
  openings: Open,
  closing_selector: F,
}

impl<S, Open, F> WindowToggleOp<S, Open, F> {
  pub fn new(source: S, openings: Open, closing_selector: F) -> Self {
    WindowToggleOp { source, openings, closing_selector }
  }
}

impl<S, Open, F, C> Observable for WindowToggleOp<S, Open, F>
where
  S: Observable,
  S::Item: Clone + 'static,
  S::Err: Clone + Send + 'static,
  Open: Observable<Err = S::Err>,
  F: FnMut(Open::Item) -> C + Send + 'static,
  C: Observable<Err = S::Err>,
{
  type Item = Subject<S::Item, S::Err>;
  type Err = S::Err;
  type Unsub = MultiSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, S::Err> + Send + 'static,
  {
    let shared = Arc::new(WindowShared {
      windows: MutArc::own(WindowState { windows: DynamicSlots::new(), terminated: false }),
      observer: MutArc::own(Some(observer)),
      group: MultiSubscription::new(),
    });

    // Openings first: an opening and a source item arriving from the same
    // multicast source must open the window before the item is routed.
    let openings = self.openings.actual_subscribe(OpeningObserver {
      shared: shared.clone(),
      closing_selector: self.closing_selector,
    });
    shared.group.append(openings);
    let source = self.source.actual_subscribe(WindowSourceObserver { shared: shared.clone() });
    shared.group.append(source);
    shared.group.clone()
  }
}

struct Window<Item, Err> {
  subject: Subject<Item, Err>,
  closing: SerialSubscription,
}

struct WindowState<Item, Err> {
  windows: DynamicSlots<Window<Item, Err>>,
  terminated: bool,
}

struct WindowShared<Item, Err, O> {
  windows: MutArc<WindowState<Item, Err>>,
  observer: MutArc<Option<O>>,
  group: MultiSubscription,
}

impl<Item, Err, O> WindowShared<Item, Err, O>
where
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
  O: Observer<Subject<Item, Err>, Err>,
{
  fn open(&self) -> Option<(usize, SerialSubscription)> {
    let subject = Subject::default();
    let closing = SerialSubscription::new();
    let id = {
      let mut state = self.windows.rc_deref_mut();
      if state.terminated {
        return None;
      }
      state.windows.add(Window { subject: subject.clone(), closing: closing.clone() })
    };
    self.group.append(closing.clone());
    trace!(window = id, "window opened");
    if let Some(observer) = self.observer.rc_deref_mut().as_mut() {
      observer.next(subject);
    }
    Some((id, closing))
  }

  fn close(&self, id: usize) {
    let window = self.windows.rc_deref_mut().windows.remove(id);
    if let Some(window) = window {
      trace!(window = id, "window closed");
      window.closing.unsubscribe();
      window.subject.complete();
    }
  }

  fn forward(&self, value: Item) {
    let targets: Vec<Subject<Item, Err>> = {
      let state = self.windows.rc_deref();
      state.windows.iter().map(|window| window.subject.clone()).collect()
    };
    for mut subject in targets {
      subject.next(value.clone());
    }
  }

  /// Ends every open window and the outer stream; `None` completes them.
  fn finish(&self, err: Option<Err>) {
    let windows: Vec<_> = {
      let mut state = self.windows.rc_deref_mut();
      if state.terminated {
        return;
      }
      state.terminated = true;
      state.windows.drain().collect()
    };
    for window in windows {
      window.closing.unsubscribe();
      match &err {
        Some(err) => window.subject.error(err.clone()),
        None => window.subject.complete(),
      }
    }
    match err {
      Some(err) => self.observer.clone().error(err),
      None => self.observer.clone().complete(),
    }
    self.group.clone().unsubscribe();
  }
}

struct OpeningObserver<Item, Err, O, F> {
  shared: Arc<WindowShared<Item, Err, O>>,
  closing_selector: F,
}

impl<Item, Err, O, F, OpenItem, C> Observer<OpenItem, Err> for OpeningObserver<Item, Err, O, F>
where
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
  O: Observer<Subject<Item, Err>, Err> + Send + 'static,
  F: FnMut(OpenItem) -> C,
  C: Observable<Err = Err>,
{
  fn next(&mut self, value: OpenItem) {
    let Some((id, closing)) = self.shared.open() else {
      return;
    };
    let closer = (self.closing_selector)(value);
    let subscription = closer.actual_subscribe(ClosingObserver { shared: self.shared.clone(), id });
    // Disposes the new subscription at once if the window already closed.
    closing.set(subscription);
  }

  fn error(self, err: Err) { self.shared.finish(Some(err)) }

  fn complete(self) {}

  fn is_closed(&self) -> bool { self.shared.windows.rc_deref().terminated }
}

struct ClosingObserver<Item, Err, O> {
  shared: Arc<WindowShared<Item, Err, O>>,
  id: usize,
}

impl<Item, Err, O, CloseItem> Observer<CloseItem, Err> for ClosingObserver<Item, Err, O>
where
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
  O: Observer<Subject<Item, Err>, Err>,
{
  fn next(&mut self, _: CloseItem) { self.shared.close(self.id) }

  fn error(self, err: Err) { self.shared.finish(Some(err)) }

  fn complete(self) { self.shared.close(self.id) }

  fn is_closed(&self) -> bool { !self.shared.windows.rc_deref().windows.contains(self.id) }
}

struct WindowSourceObserver<Item, Err, O> {
  shared: Arc<WindowShared<Item, Err, O>>,
}

impl<Item, Err, O> Observer<Item, Err> for WindowSourceObserver<Item, Err, O>
where
  Item: Clone + 'static,
  Err: Clone + Send + 'static,
  O: Observer<Subject<Item, Err>, Err>,
{
  fn next(&mut self, value: Item) { self.shared.forward(value) }

  fn error(self, err: Err) { self.shared.finish(Some(err)) }

  fn complete(self) { self.shared.finish(None) }

  fn is_closed(&self) -> bool { self.shared.windows.rc_deref().terminated }
}

/// Consecutive windows of `count` items.
///
/// The source is published once and two boundary streams are derived from
/// it. The opening boundary emits on every item whose running index is a
/// multiple of `count`, before the item is routed. The closing boundary emits
/// on the last item of each run, after the item is routed, so a window
/// completes as soon as it holds `count` items. A shorter last window closes
/// when the source completes.
#[derive(Clone)]
pub struct WindowCountOp<S> {
  source: S,
  count: usize,
}

impl<S> WindowCountOp<S> {
  pub fn new(source: S, count: usize) -> Self {
    assert!(count > 0, "window size must be greater than zero");
    WindowCountOp { source, count }
  }
}

impl<S> Observable for WindowCountOp<S>
where
  S: Observable,
  S::Item: Clone + 'static,
  S::Err: Clone + Send + 'static,
{
  type Item = Subject<S::Item, S::Err>;
  type Err = S::Err;
  type Unsub = ZipSubscription<MultiSubscription, S::Unsub>;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Self::Item, S::Err> + Send + 'static,
  {
    let published = self.source.publish();
    let items = published.fork();
    let openings = WindowBoundary { source: items.clone(), count: self.count, offset: 0 };
    let closings = WindowBoundary { source: items.clone(), count: self.count, offset: 1 }.publish();
    let closing = closings.fork();

    // Subscription order on `items` is the delivery order of every item:
    // opening boundary, window routing, closing boundary.
    let windows = items.window_toggle(openings, move |_: ()| closing.clone()).actual_subscribe(observer);
    windows.append(closings.connect());
    let connection = published.connect();
    ZipSubscription::new(windows, connection)
  }
}

/// Emits `()` for every source item whose index plus `offset` is a multiple
/// of `count`.
#[derive(Clone)]
struct WindowBoundary<S> {
  source: S,
  count: usize,
  offset: usize,
}

impl<S> Observable for WindowBoundary<S>
where
  S: Observable,
{
  type Item = ();
  type Err = S::Err;
  type Unsub = S::Unsub;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<(), S::Err> + Send + 'static,
  {
    self.source.actual_subscribe(BoundaryObserver { observer, count: self.count, index: self.offset })
  }
}

struct BoundaryObserver<O> {
  observer: O,
  count: usize,
  index: usize,
}

impl<Item, Err, O> Observer<Item, Err> for BoundaryObserver<O>
where
  O: Observer<(), Err>,
{
  fn next(&mut self, _: Item) {
    if self.index % self.count == 0 {
      self.observer.next(());
    }
    self.index = (self.index + 1) % self.count;
  }

  fn error(self, err: Err) { self.observer.error(err) }

  fn complete(self) { self.observer.complete() }

  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

#[cfg(test)]
mod tests {
  use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
  };

  use super::*;
  use crate::observable::from_iter;

  type Windows<T> = Arc<Mutex<Vec<Vec<T>>>>;

  /// Subscribes to every emitted window, collecting its items.
  fn collect_windows<S, T>(source: S) -> (Windows<T>, Arc<Mutex<Vec<String>>>)
  where
    S: Observable<Item = Subject<T, &'static str>, Err = &'static str>,
    T: Clone + Send + 'static,
  {
    let windows = Windows::default();
    let events = Arc::new(Mutex::new(vec![]));
    let (c_windows, c_events, e_events, d_events) = (windows.clone(), events.clone(), events.clone(), events.clone());
    source.actual_subscribe(crate::observer::ObserverAll::new(
      move |window: Subject<T, &'static str>| {
        let index = {
          let mut windows = c_windows.lock().unwrap();
          windows.push(vec![]);
          windows.len() - 1
        };
        let items = c_windows.clone();
        let (err_events, done_events) = (c_events.clone(), c_events.clone());
        window.subscribe_all(
          move |v| items.lock().unwrap()[index].push(v),
          move |e| err_events.lock().unwrap().push(format!("window {index} error {e}")),
          move || done_events.lock().unwrap().push(format!("window {index} complete")),
        );
      },
      move |e| e_events.lock().unwrap().push(format!("error {e}")),
      move || d_events.lock().unwrap().push("complete".to_owned()),
    ));
    (windows, events)
  }

  #[rxlab_macro::test]
  fn toggle_opens_and_closes_on_signals() {
    let mut source = Subject::<i32, &'static str>::new();
    let mut openings = Subject::<(), &'static str>::new();
    let closers = Arc::new(Mutex::new(Vec::<Subject<(), &'static str>>::new()));
    let c_closers = closers.clone();

    let (windows, events) = collect_windows(source.clone().window_toggle(openings.clone(), move |_: ()| {
      let closer = Subject::new();
      c_closers.lock().unwrap().push(closer.clone());
      closer
    }));

    source.next(0);
    openings.next(());
    source.next(1);
    openings.next(());
    source.next(2);
    closers.lock().unwrap()[0].clone().next(());
    source.next(3);
    closers.lock().unwrap()[1].clone().complete();
    source.next(4);
    source.complete();

    assert_eq!(*windows.lock().unwrap(), vec![vec![1, 2], vec![2, 3]]);
    assert_eq!(*events.lock().unwrap(), vec!["window 0 complete", "window 1 complete", "complete"]);
  }

  #[rxlab_macro::test]
  fn source_error_fails_open_windows_then_outer() {
    let mut source = Subject::<i32, &'static str>::new();
    let mut openings = Subject::<(), &'static str>::new();
    let (windows, events) =
      collect_windows(source.clone().window_toggle(openings.clone(), |_: ()| Subject::<(), &'static str>::new()));

    openings.next(());
    source.next(1);
    source.clone().error("boom");
    source.next(2);

    assert_eq!(*windows.lock().unwrap(), vec![vec![1]]);
    assert_eq!(*events.lock().unwrap(), vec!["window 0 error boom", "error boom"]);
  }

  #[rxlab_macro::test]
  fn count_windows_partition_the_source() {
    let source = crate::observable::create(|emitter: crate::observable::Emitter<i32, &'static str>| {
      for v in 0..10 {
        emitter.next(v);
      }
      emitter.complete();
    });
    let (windows, events) = collect_windows(source.window_count(3));

    let windows = windows.lock().unwrap();
    assert_eq!(windows.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 3, 1]);
    assert_eq!(windows.concat(), (0..10).collect::<Vec<_>>());
    assert_eq!(events.lock().unwrap().last().map(String::as_str), Some("complete"));
    assert_eq!(events.lock().unwrap().len(), 5);
  }

  #[rxlab_macro::test]
  fn count_window_closes_on_its_last_item() {
    let mut source = Subject::<i32, &'static str>::new();
    let (windows, events) = collect_windows(source.clone().window_count(3));

    source.next(0);
    source.next(1);
    source.next(2);
    assert_eq!(*windows.lock().unwrap(), vec![vec![0, 1, 2]]);
    assert_eq!(*events.lock().unwrap(), vec!["window 0 complete"]);

    source.next(3);
    assert_eq!(*windows.lock().unwrap(), vec![vec![0, 1, 2], vec![3]]);
    assert_eq!(*events.lock().unwrap(), vec!["window 0 complete"]);
  }

  #[rxlab_macro::test]
  fn single_item_windows() {
    let mut source = Subject::<i32, &'static str>::new();
    let (windows, events) = collect_windows(source.clone().window_count(1));

    source.next(7);
    source.next(8);
    assert_eq!(*windows.lock().unwrap(), vec![vec![7], vec![8]]);
    assert_eq!(*events.lock().unwrap(), vec!["window 0 complete", "window 1 complete"]);
  }

  #[rxlab_macro::test]
  fn count_windows_over_exact_multiple() {
    let sizes = Arc::new(Mutex::new(vec![]));
    let c_sizes = sizes.clone();
    from_iter(0..6).window_count(2).subscribe(move |window: Subject<i32, Infallible>| {
      let sizes = c_sizes.clone();
      let index = {
        let mut sizes = sizes.lock().unwrap();
        sizes.push(0);
        sizes.len() - 1
      };
      window.subscribe(move |_| sizes.lock().unwrap()[index] += 1);
    });
    assert_eq!(*sizes.lock().unwrap(), vec![2, 2, 2]);
  }

  #[rxlab_macro::test]
  #[should_panic(expected = "window size must be greater than zero")]
  fn zero_count_panics() {
    let _ = from_iter(0..3).window_count(0);
  }
}
