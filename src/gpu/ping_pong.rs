//! Two-slot double buffer.

/// A pair of equally-shaped resources where one is read and the other is
/// written. Only the roles move on [`swap`](Self::swap); the resources stay
/// where they are, so bind groups precreated per slot remain valid.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    /// `front` starts as the current (readable) slot.
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            current: 0,
        }
    }

    /// Build both slots from their index.
    pub fn from_fn(mut f: impl FnMut(usize) -> T) -> Self {
        Self::new(f(0), f(1))
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn next_index(&self) -> usize {
        1 - self.current
    }

    /// The slot readers see this frame.
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    /// The write target for the next step.
    pub fn next(&self) -> &T {
        &self.slots[self.next_index()]
    }

    pub fn next_mut(&mut self) -> &mut T {
        let index = self.next_index();
        &mut self.slots[index]
    }

    /// Hand the write target over to readers.
    pub fn swap(&mut self) {
        self.current = self.next_index();
    }

    pub fn slots(&self) -> &[T; 2] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_toggles_roles() {
        let mut pair = PingPong::new("a", "b");
        assert_eq!(*pair.current(), "a");
        assert_eq!(*pair.next(), "b");

        pair.swap();
        assert_eq!(*pair.current(), "b");
        assert_eq!(*pair.next(), "a");
        assert_eq!(pair.current_index(), 1);

        pair.swap();
        assert_eq!(pair.current_index(), 0);
    }

    #[test]
    fn test_write_then_swap_publishes() {
        let mut pair = PingPong::from_fn(|i| vec![i]);
        pair.next_mut().push(7);
        pair.swap();
        assert_eq!(pair.current(), &vec![1, 7]);
        assert_eq!(pair.next(), &vec![0]);
    }

    #[test]
    fn test_current_and_next_never_alias() {
        let mut pair = PingPong::from_fn(|i| i);
        for _ in 0..5 {
            assert_ne!(pair.current_index(), pair.next_index());
            assert_ne!(pair.current(), pair.next());
            pair.swap();
        }
    }
}
