use smallvec::SmallVec;

/// Id-keyed, insertion-ordered set of live observers.
///
/// Multicasts and subjects keep their downstream observers here. Each entry
/// gets an id when it is added so the teardown of its subscription can remove
/// exactly that entry later.
///
/// - **SmallVec**: most shared streams have one or two observers, which fit
///   without a heap allocation.
/// - **Reserved ids**: `reserve_id()` + `insert()` hand out the id before the
///   entry exists, for teardowns that must be built before the observer is
///   stored.
///
/// ```rust
/// use multitude::subscription::DynamicObservers;
///
/// let mut observers: DynamicObservers<&str> = DynamicObservers::default();
///
/// let first = observers.add("first");
/// let second = observers.reserve_id();
/// observers.insert(second, "second");
/// assert_eq!(observers.len(), 2);
///
/// assert_eq!(observers.remove(first), Some("first"));
/// assert_eq!(observers.iter().collect::<Vec<_>>(), vec![&"second"]);
/// ```
pub struct DynamicObservers<U> {
  next_id: usize,
  items: SmallVec<[(usize, U); 2]>,
}

impl<U> Default for DynamicObservers<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DynamicObservers<U> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Add an entry and return its id.
  #[inline]
  pub fn add(&mut self, item: U) -> usize {
    let id = self.reserve_id();
    self.items.push((id, item));
    id
  }

  #[inline]
  pub fn reserve_id(&mut self) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Insert an entry under an id obtained from `reserve_id()`.
  #[inline]
  pub fn insert(&mut self, id: usize, item: U) { self.items.push((id, item)); }

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

  /// Remove every entry, oldest first.
  #[inline]
  pub fn drain(&mut self) -> impl Iterator<Item = U> + '_ {
    self.items.drain(..).map(|(_, item)| item)
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}

impl<U: Clone> DynamicObservers<U> {
  /// Copy of the current entries.
  ///
  /// Fan-out iterates a snapshot, so observers may subscribe or unsubscribe
  /// from inside their own callbacks.
  pub fn snapshot(&self) -> Vec<U> { self.iter().cloned().collect() }
}
