use super::{BoxSubscription, Subscription};
use crate::rc::MutArc;

/// Holds at most one child subscription at a time.
///
/// Setting a new child releases the previous one. Once the serial
/// subscription itself is closed, any child set afterwards is released
/// immediately, so scheduled work may race with `unsubscribe`.
#[derive(Clone, Default)]
pub struct SerialSubscription(MutArc<SerialInner>);

#[derive(Default)]
struct SerialInner {
  closed: bool,
  current: Option<BoxSubscription>,
}

impl SerialSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn set<S: Subscription + Send + 'static>(&self, subscription: S) {
    let mut inner = self.0.rc_deref_mut();
    if inner.closed {
      drop(inner);
      subscription.unsubscribe();
      return;
    }
    let previous = inner.current.replace(BoxSubscription::new(subscription));
    drop(inner);
    if let Some(previous) = previous {
      previous.unsubscribe();
    }
  }
}

impl Subscription for SerialSubscription {
  fn unsubscribe(self) {
    let current = {
      let mut inner = self.0.rc_deref_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
      inner.current.take()
    };
    if let Some(current) = current {
      current.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().closed }
}
