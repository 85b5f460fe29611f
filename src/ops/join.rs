//! Join: correlate two streams by overlapping lifetimes.
//!
//! Every value of either side opens a window whose lifetime is given by the
//! duration observable selected for it: the value stays open until that
//! observable emits its first item. While open, a value is paired with each
//! new value of the other side, and each new value is paired with every open
//! value of the other side, in arrival order.
//!
//! A duration that completes without emitting leaves its value open for good.
//! The join completes once both sides completed, or once a completed side has
//! no open values left, since nothing can be paired after that. With
//! [`JoinOp::until_both_complete`] only the first rule applies. Any error ends
//! the join.

use std::{marker::PhantomData, sync::Arc};

use crate::{
  observable::Observable,
  observer::Observer,
  rc::MutArc,
  subscription::{DynamicSlots, MultiSubscription, SerialSubscription, Subscription},
};

#[derive(Clone)]
pub struct JoinOp<L, R, LD, RD, F> {
  left: L,
  right: R,
  left_duration: LD,
  right_duration: RD,
  selector: F,
  until_both_complete: bool,
}

impl<L, R, LD, RD, F> JoinOp<L, R, LD, RD, F> {
  pub fn new(left: L, right: R, left_duration: LD, right_duration: RD, selector: F) -> Self {
    JoinOp { left, right, left_duration, right_duration, selector, until_both_complete: false }
  }

  /// Complete only when both sides completed, even if a completed side left
  /// nothing open to pair with.
  pub fn until_both_complete(mut self) -> Self {
    self.until_both_complete = true;
    self
  }
}

impl<L, R, LD, RD, LDur, RDur, F, Out> Observable for JoinOp<L, R, LD, RD, F>
where
  L: Observable,
  R: Observable<Err = L::Err>,
  L::Item: Clone + Send + 'static,
  R::Item: Clone + Send + 'static,
  L::Err: Send + 'static,
  LD: FnMut(&L::Item) -> LDur + Send + 'static,
  RD: FnMut(&R::Item) -> RDur + Send + 'static,
  LDur: Observable<Err = L::Err>,
  RDur: Observable<Err = L::Err>,
  F: FnMut(L::Item, R::Item) -> Out + Send + 'static,
{
  type Item = Out;
  type Err = L::Err;
  type Unsub = MultiSubscription;

  fn actual_subscribe<O>(self, observer: O) -> Self::Unsub
  where
    O: Observer<Out, L::Err> + Send + 'static,
  {
    let shared = Arc::new(JoinShared {
      state: MutArc::own(JoinState {
        left: DynamicSlots::new(),
        right: DynamicSlots::new(),
        left_done: false,
        right_done: false,
        terminated: false,
      }),
      output: MutArc::own(JoinOutput { observer: Some(observer), selector: self.selector }),
      group: MultiSubscription::new(),
      until_both_complete: self.until_both_complete,
      _err: PhantomData,
    });

    let left = self.left.actual_subscribe(LeftObserver { shared: shared.clone(), duration: self.left_duration });
    shared.group.append(left);
    let right = self.right.actual_subscribe(RightObserver { shared: shared.clone(), duration: self.right_duration });
    shared.group.append(right);
    shared.group.clone()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
  Left,
  Right,
}

struct OpenValue<T> {
  value: T,
  duration: SerialSubscription,
}

struct JoinState<A, B> {
  left: DynamicSlots<OpenValue<A>>,
  right: DynamicSlots<OpenValue<B>>,
  left_done: bool,
  right_done: bool,
  terminated: bool,
}

impl<A, B> JoinState<A, B> {
  fn is_empty(&self, side: Side) -> bool {
    match side {
      Side::Left => self.left.is_empty(),
      Side::Right => self.right.is_empty(),
    }
  }

  fn is_done(&self, side: Side) -> bool {
    match side {
      Side::Left => self.left_done,
      Side::Right => self.right_done,
    }
  }
}

struct JoinOutput<O, F> {
  observer: Option<O>,
  selector: F,
}

struct JoinShared<A, B, O, F, Err> {
  state: MutArc<JoinState<A, B>>,
  output: MutArc<JoinOutput<O, F>>,
  group: MultiSubscription,
  until_both_complete: bool,
  _err: PhantomData<fn(Err)>,
}

impl<A, B, O, F, Out, Err> JoinShared<A, B, O, F, Err>
where
  A: Clone,
  B: Clone,
  O: Observer<Out, Err>,
  F: FnMut(A, B) -> Out,
{
  fn emit(&self, pairs: impl IntoIterator<Item = (A, B)>) {
    let mut output = self.output.rc_deref_mut();
    let JoinOutput { observer, selector } = &mut *output;
    for (a, b) in pairs {
      match observer.as_mut() {
        Some(observer) => observer.next(selector(a, b)),
        None => return,
      }
    }
  }

  fn expire(&self, side: Side, id: usize) {
    let (duration, finished) = {
      let mut state = self.state.rc_deref_mut();
      let duration = match side {
        Side::Left => state.left.remove(id).map(|open| open.duration),
        Side::Right => state.right.remove(id).map(|open| open.duration),
      };
      let finished = duration.is_some()
        && !self.until_both_complete
        && !state.terminated
        && state.is_done(side)
        && state.is_empty(side);
      state.terminated |= finished;
      (duration, finished)
    };
    duration.unsubscribe();
    if finished {
      self.complete();
    }
  }

  fn side_done(&self, side: Side) {
    let finished = {
      let mut state = self.state.rc_deref_mut();
      match side {
        Side::Left => state.left_done = true,
        Side::Right => state.right_done = true,
      }
      let other = if side == Side::Left { Side::Right } else { Side::Left };
      let drained = !self.until_both_complete && state.is_empty(side);
      let finished = !state.terminated && (state.is_done(other) || drained);
      state.terminated |= finished;
      finished
    };
    if finished {
      self.complete();
    }
  }

  fn complete(&self) {
    let observer = self.output.rc_deref_mut().observer.take();
    if let Some(observer) = observer {
      observer.complete();
    }
    self.group.clone().unsubscribe();
  }

  fn fail(&self, err: Err) {
    {
      let mut state = self.state.rc_deref_mut();
      if state.terminated {
        return;
      }
      state.terminated = true;
    }
    let observer = self.output.rc_deref_mut().observer.take();
    if let Some(observer) = observer {
      observer.error(err);
    }
    self.group.clone().unsubscribe();
  }

  fn is_terminated(&self) -> bool { self.state.rc_deref().terminated }
}

struct LeftObserver<A, B, O, F, D, Err> {
  shared: Arc<JoinShared<A, B, O, F, Err>>,
  duration: D,
}

impl<A, B, O, F, D, Dur, Out, Err> Observer<A, Err> for LeftObserver<A, B, O, F, D, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  Err: Send + 'static,
  O: Observer<Out, Err> + Send + 'static,
  F: FnMut(A, B) -> Out + Send + 'static,
  D: FnMut(&A) -> Dur,
  Dur: Observable<Err = Err>,
{
  fn next(&mut self, value: A) {
    let slot = SerialSubscription::new();
    let (id, rights) = {
      let mut state = self.shared.state.rc_deref_mut();
      if state.terminated {
        return;
      }
      let id = state.left.add(OpenValue { value: value.clone(), duration: slot.clone() });
      let rights: Vec<B> = state.right.iter().map(|open| open.value.clone()).collect();
      (id, rights)
    };
    self.shared.group.append(slot.clone());

    let duration = (self.duration)(&value);
    slot.set(duration.actual_subscribe(DurationObserver { shared: self.shared.clone(), side: Side::Left, id }));
    self.shared.emit(rights.into_iter().map(|right| (value.clone(), right)));
  }

  fn error(self, err: Err) { self.shared.fail(err) }

  fn complete(self) { self.shared.side_done(Side::Left) }

  fn is_closed(&self) -> bool { self.shared.is_terminated() }
}

struct RightObserver<A, B, O, F, D, Err> {
  shared: Arc<JoinShared<A, B, O, F, Err>>,
  duration: D,
}

impl<A, B, O, F, D, Dur, Out, Err> Observer<B, Err> for RightObserver<A, B, O, F, D, Err>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  Err: Send + 'static,
  O: Observer<Out, Err> + Send + 'static,
  F: FnMut(A, B) -> Out + Send + 'static,
  D: FnMut(&B) -> Dur,
  Dur: Observable<Err = Err>,
{
  fn next(&mut self, value: B) {
    let slot = SerialSubscription::new();
    let (id, lefts) = {
      let mut state = self.shared.state.rc_deref_mut();
      if state.terminated {
        return;
      }
      let id = state.right.add(OpenValue { value: value.clone(), duration: slot.clone() });
      let lefts: Vec<A> = state.left.iter().map(|open| open.value.clone()).collect();
      (id, lefts)
    };
    self.shared.group.append(slot.clone());

    let duration = (self.duration)(&value);
    slot.set(duration.actual_subscribe(DurationObserver { shared: self.shared.clone(), side: Side::Right, id }));
    self.shared.emit(lefts.into_iter().map(|left| (left, value.clone())));
  }

  fn error(self, err: Err) { self.shared.fail(err) }

  fn complete(self) { self.shared.side_done(Side::Right) }

  fn is_closed(&self) -> bool { self.shared.is_terminated() }
}

/// Watches the lifetime of one open value.
struct DurationObserver<A, B, O, F, Err> {
  shared: Arc<JoinShared<A, B, O, F, Err>>,
  side: Side,
  id: usize,
}

impl<A, B, O, F, Item, Out, Err> Observer<Item, Err> for DurationObserver<A, B, O, F, Err>
where
  A: Clone,
  B: Clone,
  O: Observer<Out, Err>,
  F: FnMut(A, B) -> Out,
{
  fn next(&mut self, _: Item) { self.shared.expire(self.side, self.id) }

  fn error(self, err: Err) { self.shared.fail(err) }

  fn complete(self) {}

  fn is_closed(&self) -> bool { self.shared.is_terminated() }
}
