use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{observer::Observer, subscription::Subscription};

/// Shared, mutable state handed between observers, subscriptions and
/// scheduled tasks.
///
/// A poisoned lock is recovered rather than propagated: a panic inside one
/// observer callback must not turn every later `dispose` into a second panic.
#[derive(Default)]
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  #[inline]
  pub fn rc_deref(&self) -> MutexGuard<'_, T> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }

  #[inline]
  pub fn rc_deref_mut(&self) -> MutexGuard<'_, T> { self.rc_deref() }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Item, Err, O> Observer<Item, Err> for MutArc<Option<O>>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Some(observer) = self.rc_deref_mut().as_mut() {
      observer.next(value);
    }
  }

  fn error(self, err: Err) {
    let observer = self.rc_deref_mut().take();
    if let Some(observer) = observer {
      observer.error(err);
    }
  }

  fn complete(self) {
    let observer = self.rc_deref_mut().take();
    if let Some(observer) = observer {
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool { self.rc_deref().as_ref().is_none_or(|o| o.is_closed()) }
}

impl<U: Subscription> Subscription for MutArc<Option<U>> {
  fn unsubscribe(self) {
    let inner = self.rc_deref_mut().take();
    if let Some(inner) = inner {
      inner.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.rc_deref().as_ref().is_none_or(|u| u.is_closed()) }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;
  use crate::observer::ObserverAll;

  #[rxlab_macro::test]
  fn shared_observer_delivers_one_terminal() {
    let completes = Arc::new(AtomicUsize::new(0));
    let c = completes.clone();
    let shared = MutArc::own(Some(ObserverAll::new(
      |_: i32| {},
      |_: ()| {},
      move || {
        c.fetch_add(1, Ordering::SeqCst);
      },
    )));

    shared.clone().complete();
    shared.clone().complete();
    assert!(shared.is_closed());
    assert_eq!(completes.load(Ordering::SeqCst), 1);
  }

  #[rxlab_macro::test]
  fn poisoned_lock_is_recovered() {
    let value = MutArc::own(1);
    let c_value = value.clone();
    let _ = std::thread::spawn(move || {
      let _guard = c_value.rc_deref_mut();
      panic!("poison the lock");
    })
    .join();

    *value.rc_deref_mut() += 1;
    assert_eq!(*value.rc_deref(), 2);
  }
}
