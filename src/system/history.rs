use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 30;

/// Fixed-capacity, insertion-ordered buffer; the oldest value is evicted on
/// overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

/// Utilization history owned by the coordinator.
#[derive(Debug, Clone)]
pub struct SystemHistory {
    pub cpu: RingBuffer<f64>,
    pub memory: RingBuffer<f64>,
    pub swap: RingBuffer<f64>,
}

impl SystemHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu: RingBuffer::new(capacity),
            memory: RingBuffer::new(capacity),
            swap: RingBuffer::new(capacity),
        }
    }
}

impl Default for SystemHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_insertion_order() {
        let mut ring = RingBuffer::new(30);
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn thirty_one_pushes_drop_the_first() {
        let mut ring = RingBuffer::new(DEFAULT_CAPACITY);
        for i in 0..31 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 30);
        assert_eq!(ring.to_vec(), (1..31).collect::<Vec<_>>());
    }

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let mut ring = RingBuffer::new(5);
        for i in 0..10 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut ring = RingBuffer::new(0);
        ring.push('a');
        ring.push('b');
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.to_vec(), vec!['b']);
    }
}
