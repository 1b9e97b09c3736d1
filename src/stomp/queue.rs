use std::collections::VecDeque;

/// FIFO of encoded frames waiting for a connected session.
///
/// Unbounded unless a capacity is given, in which case [`OutboundQueue::enqueue`] refuses new
/// frames once full and hands them back.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<String>,
    capacity: Option<usize>,
}

impl OutboundQueue {
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
        }
    }

    /// Append `frame`. Returns it back when the queue is at capacity.
    pub fn enqueue(&mut self, frame: String) -> Result<(), String> {
        if let Some(capacity) = self.capacity
            && self.frames.len() >= capacity
        {
            return Err(frame);
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Next frame to transmit.
    pub fn pop(&mut self) -> Option<String> {
        self.frames.pop_front()
    }

    /// Put back a frame whose transmission failed so it goes out first next time.
    pub fn requeue_front(&mut self, frame: String) {
        self.frames.push_front(frame);
    }

    /// Drain every frame in order through `send`, stopping at the first one it rejects.
    ///
    /// The rejected frame stays at the head of the queue. Returns how many frames went out.
    pub fn drain_in_order<F>(&mut self, mut send: F) -> usize
    where
        F: FnMut(String) -> Result<(), String>,
    {
        let mut sent = 0;
        while let Some(frame) = self.pop() {
            if let Err(frame) = send(frame) {
                self.requeue_front(frame);
                break;
            }
            sent += 1;
        }
        sent
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
