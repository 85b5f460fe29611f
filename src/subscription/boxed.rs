use super::Subscription;

/// Helper trait for calling unsubscribe on boxed trait objects
///
/// Since `Subscription::unsubscribe(self)` requires `Sized`, we need this
/// workaround trait to enable `Box<dyn Subscription>` to call unsubscribe.
pub trait BoxSubscriptionInner {
  fn boxed_unsubscribe(self: Box<Self>);
  fn boxed_is_closed(&self) -> bool;
}

impl<T: Subscription> BoxSubscriptionInner for T {
  #[inline]
  fn boxed_unsubscribe(self: Box<Self>) { (*self).unsubscribe() }

  #[inline]
  fn boxed_is_closed(&self) -> bool { self.is_closed() }
}

/// A type-erased subscription that can move across threads.
///
/// Composite subscriptions store their children as `BoxSubscription`, so
/// heterogeneous teardown logic can live in one collection.
pub struct BoxSubscription(Box<dyn BoxSubscriptionInner + Send>);

impl BoxSubscription {
  pub fn new<S: Subscription + Send + 'static>(subscription: S) -> Self { Self(Box::new(subscription)) }
}

impl Subscription for BoxSubscription {
  #[inline]
  fn unsubscribe(self) { self.0.boxed_unsubscribe() }

  #[inline]
  fn is_closed(&self) -> bool { self.0.boxed_is_closed() }
}
