//! Fixed-capacity sliding window
//!
//! Recursive forecasters feed their own predictions back as inputs. The
//! window they read from never grows: once full, every push evicts the
//! oldest value by rotating the head index over a fixed slot array.

use crate::{MathError, Result};

/// Sliding window over the most recent `capacity` values
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    slots: Vec<f64>,
    /// Index of the oldest stored value
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create an empty window holding at most `capacity` values
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MathError::InvalidInput(
                "Window capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            slots: vec![0.0; capacity],
            head: 0,
            len: 0,
        })
    }

    /// Create a window seeded with the last `capacity` entries of `values`
    pub fn from_slice(capacity: usize, values: &[f64]) -> Result<Self> {
        let mut window = Self::new(capacity)?;
        let start = values.len().saturating_sub(capacity);
        for &value in &values[start..] {
            window.push(value);
        }
        Ok(window)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append a value, returning the evicted oldest value when full
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let capacity = self.slots.len();
        if self.len < capacity {
            let idx = (self.head + self.len) % capacity;
            self.slots[idx] = value;
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head];
            self.slots[self.head] = value;
            self.head = (self.head + 1) % capacity;
            Some(evicted)
        }
    }

    /// Value `k` steps back; `lag(1)` is the newest value
    pub fn lag(&self, k: usize) -> Option<f64> {
        if k == 0 || k > self.len {
            return None;
        }
        let idx = (self.head + self.len - k) % self.slots.len();
        Some(self.slots[idx])
    }

    /// Newest value
    pub fn latest(&self) -> Option<f64> {
        self.lag(1)
    }

    /// Mean of the newest `n` values, if that many are stored
    pub fn mean_last(&self, n: usize) -> Option<f64> {
        if n == 0 || n > self.len {
            return None;
        }
        let sum: f64 = (1..=n).filter_map(|k| self.lag(k)).sum();
        Some(sum / n as f64)
    }

    /// Stored values, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let capacity = self.slots.len();
        (0..self.len).map(move |i| self.slots[(self.head + i) % capacity])
    }

    /// Stored values as a vector, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}
