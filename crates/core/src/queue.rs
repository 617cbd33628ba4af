//! Per-device FIFO command queue.
//!
//! Multi-producer, single-consumer: any task may push concurrently, and
//! the dispatcher is the only drainer. Insertion order is delivery order.

use crate::report::Packet;
use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO queue of encoded commands for one device.
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<VecDeque<Packet>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command. Never blocks beyond the queue lock itself.
    pub fn push(&self, packet: Packet) {
        self.inner.lock().unwrap().push_back(packet);
    }

    /// Take every queued command, oldest first, leaving the queue empty.
    pub fn drain(&self) -> VecDeque<Packet> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }

    /// Drop all queued commands without delivering them.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
