use smallvec::SmallVec;

use super::{BoxSubscription, Subscription};
use crate::rc::MutArc;

/// A composite subscription owning any number of child subscriptions.
///
/// Clones share the same state, so one clone can be handed to scheduled work
/// while another is returned to the caller. Whichever clone unsubscribes first
/// releases every child; later calls, from any thread, are no-ops. Children
/// appended after that are released immediately.
#[derive(Clone, Default)]
pub struct MultiSubscription(MutArc<Inner>);

#[derive(Default)]
struct Inner {
  closed: bool,
  teardown: SmallVec<[BoxSubscription; 2]>,
}

impl MultiSubscription {
  pub fn new() -> Self { Self::default() }

  /// Take ownership of `subscription`, releasing it together with this one.
  pub fn append<S: Subscription + Send + 'static>(&self, subscription: S) {
    let mut inner = self.0.rc_deref_mut();
    if inner.closed {
      drop(inner);
      subscription.unsubscribe();
    } else {
      inner.teardown.retain(|v| !v.is_closed());
      inner.teardown.push(BoxSubscription::new(subscription));
    }
  }

  pub fn teardown_size(&self) -> usize { self.0.rc_deref().teardown.len() }
}

impl Subscription for MultiSubscription {
  fn unsubscribe(self) {
    // Children run outside the lock: a child may call back into this
    // subscription (append or is_closed) while tearing down.
    let teardown = {
      let mut inner = self.0.rc_deref_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.teardown)
    };
    for child in teardown {
      child.unsubscribe();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.rc_deref().closed }
}
