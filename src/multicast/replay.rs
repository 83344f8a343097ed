use std::collections::VecDeque;

/// Bounded history of the most recent values of a connection, plus the
/// single last value.
///
/// The last value survives even when the buffer holds nothing, so
/// `Multicast::value` works with a replay of zero.
#[derive(Debug, Clone)]
pub struct MulticastReplay<T> {
  values: VecDeque<T>,
  max: usize,
  last: Option<T>,
}

impl<T> Default for MulticastReplay<T> {
  fn default() -> Self { Self { values: VecDeque::new(), max: 0, last: None } }
}

impl<T: Clone> MulticastReplay<T> {
  /// An empty buffer keeping at most `max` values. `usize::MAX` keeps
  /// everything.
  pub fn new(max: usize) -> Self { Self { max, ..Self::default() } }

  pub fn push(&mut self, value: T) {
    if self.max > 0 {
      if self.values.len() == self.max {
        self.values.pop_front();
      }
      self.values.push_back(value.clone());
    }
    self.last = Some(value);
  }

  /// Change the capacity, dropping the oldest values that no longer fit.
  pub fn limit(&mut self, max: usize) {
    self.max = max;
    let excess = self.values.len().saturating_sub(max);
    self.values.drain(..excess);
  }

  #[inline]
  pub fn max(&self) -> usize { self.max }

  /// The last value pushed, buffered or not.
  #[inline]
  pub fn value(&self) -> Option<T> { self.last.clone() }

  /// Buffered values, oldest first.
  pub fn values(&self) -> Vec<T> { self.values.iter().cloned().collect() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keeps_most_recent_values() {
    let mut replay = MulticastReplay::new(2);
    (1..=5).for_each(|v| replay.push(v));
    assert_eq!(replay.values(), vec![4, 5]);
    assert_eq!(replay.value(), Some(5));
  }

  #[test]
  fn zero_capacity_still_remembers_last() {
    let mut replay = MulticastReplay::new(0);
    replay.push("a");
    assert!(replay.values().is_empty());
    assert_eq!(replay.value(), Some("a"));
  }

  #[test]
  fn shrinking_drops_oldest() {
    let mut replay = MulticastReplay::new(usize::MAX);
    (1..=4).for_each(|v| replay.push(v));
    assert_eq!(replay.values(), vec![1, 2, 3, 4]);

    replay.limit(1);
    assert_eq!(replay.values(), vec![4]);
    replay.limit(0);
    assert!(replay.values().is_empty());
    assert_eq!(replay.max(), 0);
  }

  #[test]
  fn growing_keeps_existing() {
    let mut replay = MulticastReplay::new(1);
    replay.push(1);
    replay.limit(3);
    replay.push(2);
    assert_eq!(replay.values(), vec![1, 2]);
  }
}
