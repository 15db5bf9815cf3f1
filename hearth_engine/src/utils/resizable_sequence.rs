use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice::SliceIndex;

/// Growable, indexable sequence with bulk resize and clear.
///
/// Storage primitive for GPU object lists (presentation images, framebuffers,
/// fences, shader stages, vertex inputs). Thin wrapper over `Vec<T>` that
/// keeps the vocabulary of the render context: `add` appends, `resize`
/// grows with default values or truncates, `size` counts.
///
/// # Example
///
/// ```
/// use hearth_engine::hearth::utils::ResizableSequence;
///
/// let mut fences = ResizableSequence::new();
/// fences.add(10u64);
/// fences.add(11u64);
/// fences.resize(3);
/// assert_eq!(fences.size(), 3);
/// assert_eq!(fences[2], 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResizableSequence<T> {
    items: Vec<T>,
}

impl<T> ResizableSequence<T> {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Create an empty sequence with room for `capacity` items
    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: Vec::with_capacity(capacity) }
    }

    /// Append an item at the end
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// Remove every item, keeping the allocation
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of items
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Whether the sequence holds no item
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Last item, if any
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Take ownership of every item, leaving the sequence empty
    pub fn drain_all(&mut self) -> std::vec::Drain<'_, T> {
        self.items.drain(..)
    }

    /// Consume into the backing vector
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Default> ResizableSequence<T> {
    /// Grow (filling with `T::default()`) or truncate to `new_size` items
    pub fn resize(&mut self, new_size: usize) {
        self.items.resize_with(new_size, T::default);
    }
}

impl<T> Default for ResizableSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for ResizableSequence<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for ResizableSequence<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

/// Positions and ranges, like `Vec`
impl<T, I: SliceIndex<[T]>> Index<I> for ResizableSequence<T> {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.items[index]
    }
}

impl<T, I: SliceIndex<[T]>> IndexMut<I> for ResizableSequence<T> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.items[index]
    }
}

impl<T> From<Vec<T>> for ResizableSequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for ResizableSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}

impl<T> IntoIterator for ResizableSequence<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ResizableSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Extend<T> for ResizableSequence<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
#[path = "resizable_sequence_tests.rs"]
mod tests;
