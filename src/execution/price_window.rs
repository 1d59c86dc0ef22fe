use crate::{Error, Result};
use std::collections::VecDeque;

/// Rolling window of the most recent prices for one instrument
///
/// Owned by a single stream worker, so no locking. Never holds more than
/// `capacity` prices; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    /// Create a new window
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of prices to keep (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a price
    ///
    /// If the window is full, removes the oldest price. Non-finite prices are
    /// rejected and leave the window untouched.
    pub fn push(&mut self, price: f64) -> Result<()> {
        if !price.is_finite() {
            return Err(Error::MalformedTick(format!("non-finite price {}", price)));
        }

        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);

        Ok(())
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
