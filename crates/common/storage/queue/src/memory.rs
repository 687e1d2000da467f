// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Volatile in-process queues.

use std::collections::VecDeque;

use bytes::Bytes;
use snafu::ensure;

use crate::{BackingStore, QueueOrder, Result, error::ClosedSnafu};

/// An in-memory queue of `T`, popping in the order fixed at construction.
///
/// Used directly for typed work items that never leave the process, and as
/// [`MemoryStore`] underneath a codec.
#[derive(Debug)]
pub struct MemoryQueue<T> {
    items:  VecDeque<T>,
    order:  QueueOrder,
    closed: bool,
}

/// Byte store kept in memory.
pub type MemoryStore = MemoryQueue<Bytes>;

impl<T> MemoryQueue<T> {
    pub const fn new(order: QueueOrder) -> Self {
        Self {
            items: VecDeque::new(),
            order,
            closed: false,
        }
    }

    pub const fn fifo() -> Self { Self::new(QueueOrder::Fifo) }

    pub const fn lifo() -> Self { Self::new(QueueOrder::Lifo) }

    pub const fn order(&self) -> QueueOrder { self.order }

    pub fn push(&mut self, item: T) -> Result<()> {
        ensure!(!self.closed, ClosedSnafu);
        self.items.push_back(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Option<T>> {
        ensure!(!self.closed, ClosedSnafu);
        Ok(match self.order {
            QueueOrder::Fifo => self.items.pop_front(),
            QueueOrder::Lifo => self.items.pop_back(),
        })
    }

    pub fn peek(&self) -> Result<Option<&T>> {
        ensure!(!self.closed, ClosedSnafu);
        Ok(match self.order {
            QueueOrder::Fifo => self.items.front(),
            QueueOrder::Lifo => self.items.back(),
        })
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Drop every pending item. Later operations fail with `Closed`.
    pub fn close(&mut self) {
        self.items.clear();
        self.closed = true;
    }
}

impl<T> Default for MemoryQueue<T> {
    fn default() -> Self { Self::fifo() }
}

impl BackingStore for MemoryStore {
    fn push(&mut self, data: Bytes) -> Result<()> { Self::push(self, data) }

    fn pop(&mut self) -> Result<Option<Bytes>> { Self::pop(self) }

    fn peek(&mut self) -> Result<Option<Bytes>> { Ok(Self::peek(self)?.cloned()) }

    fn len(&self) -> u64 { self.items.len() as u64 }

    fn close(&mut self) -> Result<()> {
        Self::close(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;

    #[test]
    fn test_fifo_order() {
        let mut queue = MemoryQueue::fifo();
        for item in ["a", "b", "c"] {
            queue.push(item).unwrap();
        }
        assert_eq!(queue.pop().unwrap(), Some("a"));
        assert_eq!(queue.pop().unwrap(), Some("b"));
        assert_eq!(queue.pop().unwrap(), Some("c"));
        assert_eq!(queue.pop().unwrap(), None);
    }

    #[test]
    fn test_lifo_order() {
        let mut queue = MemoryQueue::lifo();
        for item in 1..=3 {
            queue.push(item).unwrap();
        }
        assert_eq!(queue.peek().unwrap(), Some(&3));
        assert_eq!(queue.pop().unwrap(), Some(3));
        assert_eq!(queue.pop().unwrap(), Some(2));
        assert_eq!(queue.pop().unwrap(), Some(1));
        assert_eq!(queue.pop().unwrap(), None);
    }

    #[test]
    fn test_pop_empty_does_not_change_state() {
        let mut queue = MemoryQueue::fifo();
        assert_eq!(queue.pop().unwrap(), None);
        assert_eq!(queue.peek().unwrap(), None);

        queue.push(1).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap(), Some(1));
    }

    #[test]
    fn test_operations_after_close() {
        let mut queue = MemoryQueue::fifo();
        queue.push(1).unwrap();
        queue.close();
        queue.close();

        assert!(queue.is_empty());
        assert!(matches!(queue.push(2), Err(QueueError::Closed { .. })));
        assert!(matches!(queue.pop(), Err(QueueError::Closed { .. })));
        assert!(matches!(queue.peek(), Err(QueueError::Closed { .. })));
    }

    #[test]
    fn test_byte_store_peek_keeps_item() {
        let mut store = MemoryStore::fifo();
        BackingStore::push(&mut store, Bytes::from_static(b"x")).unwrap();

        assert_eq!(
            BackingStore::peek(&mut store).unwrap(),
            Some(Bytes::from_static(b"x"))
        );
        assert_eq!(BackingStore::len(&store), 1);
    }
}
