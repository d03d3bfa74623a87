//! Bounded frame queues.
//!
//! [`OutputQueue`] holds frames waiting for a link. A frame a link rejected is
//! put back at the head and the queue stays stalled on that link until it
//! reports that it drained:
//!
//! ```text
//!  send ──► [ f3 f2 f1 ] ──► link
//!                     ▲        │ rejected(f1)
//!                     └────────┘ stalled_on = link
//! ```
//!
//! [`ClientQueue`] holds frames for a control-plane client and drops the oldest
//! frame when full.

use std::collections::VecDeque;

use crate::link::LinkId;
use crate::packet::Packet;

/// Interface output queue.
#[derive(Debug)]
pub(crate) struct OutputQueue {
    frames: VecDeque<Packet>,
    capacity: usize,
    stalled_on: Option<LinkId>,
}

impl OutputQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            stalled_on: None,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Append a frame; hands it back if the queue is full.
    pub(crate) fn push_back(&mut self, frame: Packet) -> Result<(), Packet> {
        if self.is_full() {
            return Err(frame);
        }
        self.frames.push_back(frame);
        Ok(())
    }

    pub(crate) fn pop_front(&mut self) -> Option<Packet> {
        self.frames.pop_front()
    }

    /// Put a rejected frame back at the head and stall on `link`.
    ///
    /// The held frame may take the queue one past its bound.
    pub(crate) fn hold(&mut self, frame: Packet, link: LinkId) {
        self.frames.push_front(frame);
        self.stalled_on = Some(link);
    }

    #[inline]
    pub(crate) fn stalled_on(&self) -> Option<LinkId> {
        self.stalled_on
    }

    /// Clear the stall; returns the link it was waiting on.
    pub(crate) fn unstall(&mut self) -> Option<LinkId> {
        self.stalled_on.take()
    }

    #[cfg(test)]
    pub(crate) fn front(&self) -> Option<&Packet> {
        self.frames.front()
    }

    /// Drop everything; returns how many frames were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        self.stalled_on = None;
        dropped
    }
}

/// Receive queue for a control-plane client.
#[derive(Debug)]
pub(crate) struct ClientQueue {
    frames: VecDeque<Packet>,
    capacity: usize,
}

impl ClientQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
        }
    }

    /// Queue a frame; returns `true` if the oldest frame was dropped for it.
    pub(crate) fn push(&mut self, frame: Packet) -> bool {
        let dropped = self.frames.len() >= self.capacity;
        if dropped {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        dropped
    }

    pub(crate) fn pop(&mut self) -> Option<Packet> {
        self.frames.pop_front()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Packet {
        Packet::from_slice(&[0x00, 0x21, tag])
    }

    #[test]
    fn test_output_queue_bound() {
        let mut queue = OutputQueue::new(2);
        queue.push_back(frame(1)).unwrap();
        queue.push_back(frame(2)).unwrap();
        assert!(queue.is_full());

        let rejected = queue.push_back(frame(3)).unwrap_err();
        assert_eq!(rejected, frame(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_hold_goes_first() {
        let mut queue = OutputQueue::new(4);
        queue.push_back(frame(2)).unwrap();
        queue.hold(frame(1), 7);

        assert_eq!(queue.stalled_on(), Some(7));
        assert_eq!(queue.front(), Some(&frame(1)));
        assert_eq!(queue.unstall(), Some(7));
        assert_eq!(queue.pop_front(), Some(frame(1)));
        assert_eq!(queue.pop_front(), Some(frame(2)));
    }

    #[test]
    fn test_clear_resets_stall() {
        let mut queue = OutputQueue::new(4);
        queue.hold(frame(1), 1);
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.stalled_on(), None);
    }

    #[test]
    fn test_client_queue_drops_oldest() {
        let mut queue = ClientQueue::new(2);
        assert!(!queue.push(frame(1)));
        assert!(!queue.push(frame(2)));
        assert!(queue.push(frame(3)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(frame(2)));
        assert_eq!(queue.pop(), Some(frame(3)));
        assert_eq!(queue.pop(), None);
    }
}
