//! Multi-producer, single-consumer FIFO channel.
//!
//! The buffer sits behind a [Mutex] with two [Condvar]s: one for receivers
//! waiting on items, one for senders waiting on space in a bounded channel.
//! The channel closes exactly when the last [Sender] is dropped, not when any
//! single one is. An unused sender kept alive therefore keeps the channel
//! open and a receiver blocked in [Receiver::recv] waits forever; drop the
//! original sender once it has been cloned out to the producers.

use super::condvar::Condvar;
use super::errors::{
    PoisonError, RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError,
    TrySendError,
};
use super::mutex::{Mutex, MutexGuard};
use super::refcount::RefCount;
use log::*;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Items in arrival order plus the closed flag. Items buffered when the
/// channel closes stay receivable, in order.
struct ChannelBuffer<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    buffer: Mutex<ChannelBuffer<T>>,
    available: Condvar,
    space: Condvar,
    capacity: Option<usize>,
    senders: RefCount,
}

impl<T> Shared<T> {
    #[inline]
    fn buffer(&self) -> MutexGuard<'_, ChannelBuffer<T>> {
        // Nothing user supplied runs under this lock, the buffer is consistent.
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_full(&self, buffer: &ChannelBuffer<T>) -> bool {
        self.capacity
            .map_or(false, |capacity| buffer.items.len() >= capacity)
    }

    fn close(&self) -> bool {
        let mut buffer = self.buffer();
        let was_open = !buffer.closed;
        buffer.closed = true;
        drop(buffer);

        self.available.notify_all();
        self.space.notify_all();
        was_open
    }
}

///
/// Creates an unbounded channel. `send` never blocks.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    with_capacity(None)
}

///
/// Creates a bounded channel: `send` blocks while `capacity` items are
/// buffered. A capacity of zero is treated as one.
pub fn sync_channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    with_capacity(Some(capacity.max(1)))
}

fn with_capacity<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        buffer: Mutex::new(ChannelBuffer {
            items: VecDeque::new(),
            closed: false,
        }),
        available: Condvar::new(),
        space: Condvar::new(),
        capacity,
        senders: RefCount::new(),
    });

    (
        Sender {
            shared: shared.clone(),
        },
        Receiver {
            shared,
            _not_sync: PhantomData,
        },
    )
}

/// Sending half. Clone it to add producers.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    ///
    /// Appends `value`, blocking while a bounded channel is full.
    ///
    /// Fails, handing the value back, once the channel is closed.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let shared = &*self.shared;
        let mut buffer = shared.buffer();
        if shared.capacity.is_some() {
            buffer = shared
                .space
                .wait_while(buffer, |b| !b.closed && shared.is_full(b))
                .unwrap_or_else(PoisonError::into_inner);
        }

        if buffer.closed {
            return Err(SendError(value));
        }
        buffer.items.push_back(value);
        drop(buffer);

        shared.available.notify_one();
        Ok(())
    }

    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let shared = &*self.shared;
        let mut buffer = shared.buffer();
        if buffer.closed {
            return Err(TrySendError::Closed(value));
        }
        if shared.is_full(&buffer) {
            return Err(TrySendError::Full(value));
        }
        buffer.items.push_back(value);
        drop(buffer);

        shared.available.notify_one();
        Ok(())
    }

    ///
    /// Like [Sender::send], giving up after `timeout` on a full channel.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        let shared = &*self.shared;
        let buffer = shared.buffer();
        let (mut buffer, _) = shared
            .space
            .wait_timeout_while(buffer, timeout, |b| !b.closed && shared.is_full(b))
            .unwrap_or_else(PoisonError::into_inner);

        if buffer.closed {
            return Err(SendTimeoutError::Closed(value));
        }
        if shared.is_full(&buffer) {
            return Err(SendTimeoutError::Timeout(value));
        }
        buffer.items.push_back(value);
        drop(buffer);

        shared.available.notify_one();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.buffer().closed
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.acquire();
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.senders.release() && self.shared.close() {
            debug!("channel::closed::last_sender_dropped");
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("senders", &self.shared.senders.get())
            .finish()
    }
}

/// Receiving half. There is exactly one per channel.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Receiver<T> {
    #[inline]
    fn take(&self, mut buffer: MutexGuard<'_, ChannelBuffer<T>>) -> Option<T> {
        let item = buffer.items.pop_front();
        drop(buffer);
        if item.is_some() && self.shared.capacity.is_some() {
            self.shared.space.notify_one();
        }
        item
    }

    ///
    /// Returns the oldest buffered item, blocking while the channel is empty
    /// and open. Fails once the channel is closed and drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        let buffer = self
            .shared
            .available
            .wait_while(self.shared.buffer(), |b| b.items.is_empty() && !b.closed)
            .unwrap_or_else(PoisonError::into_inner);

        self.take(buffer).ok_or(RecvError)
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let buffer = self.shared.buffer();
        let closed = buffer.closed;
        match self.take(buffer) {
            Some(item) => Ok(item),
            None if closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    ///
    /// Like [Receiver::recv], giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let (buffer, _) = self
            .shared
            .available
            .wait_timeout_while(self.shared.buffer(), timeout, |b| {
                b.items.is_empty() && !b.closed
            })
            .unwrap_or_else(PoisonError::into_inner);

        let closed = buffer.closed;
        match self.take(buffer) {
            Some(item) => Ok(item),
            None if closed => Err(RecvTimeoutError::Closed),
            None => Err(RecvTimeoutError::Timeout),
        }
    }

    ///
    /// Like [Receiver::recv_timeout] with an absolute deadline.
    pub fn recv_deadline(&self, deadline: Instant) -> Result<T, RecvTimeoutError> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        self.recv_timeout(timeout)
    }

    ///
    /// Closes the channel from the receiving side. Senders fail from now on;
    /// items already buffered can still be received.
    pub fn close(&self) {
        if self.shared.close() {
            debug!("channel::closed::receiver");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.buffer().closed
    }

    pub fn len(&self) -> usize {
        self.shared.buffer().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.buffer().items.is_empty()
    }

    ///
    /// Blocking iterator ending when the channel is closed and drained.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { rx: self }
    }

    ///
    /// Iterator over the items buffered right now, never blocking.
    pub fn try_iter(&self) -> TryIter<'_, T> {
        TryIter { rx: self }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.shared.buffer();
        f.debug_struct("Receiver")
            .field("buffered", &buffer.items.len())
            .field("closed", &buffer.closed)
            .finish()
    }
}

pub struct Iter<'a, T> {
    rx: &'a Receiver<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

pub struct TryIter<'a, T> {
    rx: &'a Receiver<T>,
}

impl<'a, T> Iterator for TryIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

pub struct IntoIter<T> {
    rx: Receiver<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

impl<'a, T> IntoIterator for &'a Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { rx: self }
    }
}
