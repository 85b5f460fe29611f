use smallvec::SmallVec;

use super::Subscription;

/// Insertion-ordered container addressed by the id handed out on insert.
///
/// Subjects keep their observers here, and the window and join operators
/// keep their open windows here: entries come and go in any order while the
/// rest must keep arrival order.
pub struct DynamicSlots<U> {
  next_id: usize,
  items: SmallVec<[(usize, U); 2]>,
}

impl<U> Default for DynamicSlots<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DynamicSlots<U> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Add an item and return its unique ID.
  #[inline]
  pub fn add(&mut self, item: U) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push((id, item));
    id
  }

  pub fn remove(&mut self, id: usize) -> Option<U> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub fn contains(&self, id: usize) -> bool { self.items.iter().any(|(i, _)| *i == id) }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  #[inline]
  pub fn drain(&mut self) -> impl Iterator<Item = U> + '_ { self.items.drain(..).map(|(_, item)| item) }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}

impl<U: Subscription> DynamicSlots<U> {
  /// Unsubscribe all items and clear the container.
  pub fn unsubscribe_all(&mut self) {
    for item in self.drain() {
      item.unsubscribe();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxlab_macro::test]
  fn ids_survive_removal_in_any_order() {
    let mut slots = DynamicSlots::new();
    let a = slots.add('a');
    let b = slots.add('b');
    let c = slots.add('c');

    assert_eq!(slots.remove(b), Some('b'));
    assert_eq!(slots.remove(b), None);
    assert!(slots.contains(a) && slots.contains(c));
    assert_eq!(slots.iter().copied().collect::<Vec<_>>(), vec!['a', 'c']);

    let d = slots.add('d');
    assert!(d > c);
    assert_eq!(slots.drain().collect::<String>(), "acd");
    assert!(slots.is_empty());
  }
}
