//! Handshake channels connecting a master to a slave.
//!
//! A [`Channel`] stands in for the wires of one AXI4-Lite channel together with the bus adapter
//! that samples them. Each handshake moves one beat into a FIFO queue. The queue has an
//! occupancy limit: while it is full, the sending side is stalled (`valid` without `ready`), which
//! is how back-pressure reaches the master. A channel can also be *held*, which stalls every
//! handshake regardless of occupancy, the way a slave keeps `ready` low while in reset.
//!
//! A slave does not use a channel directly, but through a direction-specific endpoint: a [`Sink`]
//! for channels it receives on (AW, W, AR) and a [`Source`] for channels it sends on (B, R).
//!
//! All waiting is cancel safe: a `recv` that is dropped before completing never consumes a beat,
//! and a `send` that is dropped before completing never enqueues its beat.

use log::trace;
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// One AXI4-Lite channel, carrying beats of type `T`.
///
/// Cloning yields another handle to the same channel.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    name: &'static str,
    queue: Mutex<Queue<T>>,
    /// Signalled whenever a beat was pushed.
    not_empty: Notify,
    /// Signalled whenever a beat was popped, the queue was cleared, or the channel was released.
    not_full: Notify,
}

struct Queue<T> {
    beats: VecDeque<T>,
    /// `None` means the queue is unbounded.
    occupancy_limit: Option<usize>,
    /// While set, no handshake completes.
    held: bool,
    /// Bumped by every [`Channel::clear`]. A sender stalled across a clear drops its beat.
    generation: u64,
    /// Number of senders currently stalled.
    stalled: usize,
}

impl<T> Queue<T> {
    fn is_full(&self) -> bool {
        self.occupancy_limit
            .is_some_and(|limit| self.beats.len() >= limit)
    }

    fn accepts(&self) -> bool {
        !self.held && !self.is_full()
    }
}

impl<T> Shared<T> {
    fn queue(&self) -> MutexGuard<'_, Queue<T>> {
        // The queue is never left in an inconsistent state, so a poisoned lock is still usable.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a sender as stalled for as long as it lives.
struct Stall<'a, T>(&'a Shared<T>);

impl<'a, T> Stall<'a, T> {
    fn new(shared: &'a Shared<T>) -> Self {
        shared.queue().stalled += 1;
        Self(shared)
    }
}

impl<T> Drop for Stall<'_, T> {
    fn drop(&mut self) {
        self.0.queue().stalled -= 1;
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue();
        f.debug_struct("Channel")
            .field("name", &self.shared.name)
            .field("len", &queue.beats.len())
            .field("occupancy_limit", &queue.occupancy_limit)
            .field("held", &queue.held)
            .field("stalled", &queue.stalled)
            .finish()
    }
}

impl<T> Channel<T> {
    /// Creates an idle channel with an unbounded queue.
    pub fn new(name: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                queue: Mutex::new(Queue {
                    beats: VecDeque::new(),
                    occupancy_limit: None,
                    held: false,
                    generation: 0,
                    stalled: 0,
                }),
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Returns the maximum number of queued beats, or `None` if the queue is unbounded.
    pub fn occupancy_limit(&self) -> Option<usize> {
        self.shared.queue().occupancy_limit
    }

    /// Changes the maximum number of queued beats. Beats already queued beyond a lowered limit
    /// are kept; no new beat is admitted until the queue drained below the limit.
    pub fn set_occupancy_limit(&self, limit: Option<usize>) {
        self.shared.queue().occupancy_limit = limit;
        self.shared.not_full.notify_waiters();
    }

    /// Holds off every handshake while `held` is set. Releasing lets stalled senders complete.
    pub fn set_held(&self, held: bool) {
        self.shared.queue().held = held;
        if !held {
            self.shared.not_full.notify_waiters();
        }
    }

    pub fn is_held(&self) -> bool {
        self.shared.queue().held
    }

    /// Returns the number of queued beats.
    pub fn len(&self) -> usize {
        self.shared.queue().beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue().beats.is_empty()
    }

    /// Returns `true` if the queue reached its occupancy limit.
    pub fn is_full(&self) -> bool {
        self.shared.queue().is_full()
    }

    /// Returns `true` if no beat is queued and no sender is stalled, i.e. nothing is in flight.
    pub fn is_idle(&self) -> bool {
        let queue = self.shared.queue();
        queue.beats.is_empty() && queue.stalled == 0
    }

    /// Completes a handshake for `beat`, waiting for as long as the queue is full or the channel
    /// is held.
    ///
    /// Beats are queued in the order their `send` completed. If the channel is cleared while the
    /// sender is stalled, the beat is discarded along with the queued ones and `send` returns.
    pub async fn send(&self, beat: T) {
        let generation = self.shared.queue().generation;
        let mut stall = None;
        loop {
            let notified = self.shared.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut queue = self.shared.queue();
                if queue.generation != generation {
                    trace!(
                        "channel {}: cleared while stalled, dropping beat",
                        self.shared.name
                    );
                    return;
                }
                if queue.accepts() {
                    queue.beats.push_back(beat);
                    drop(queue);
                    self.shared.not_empty.notify_waiters();
                    return;
                }
            }

            if stall.is_none() {
                trace!("channel {}: stalling sender", self.shared.name);
                stall = Some(Stall::new(&self.shared));
            }
            notified.await;
        }
    }

    /// Completes a handshake for `beat` if the queue is not full and the channel is not held,
    /// handing it back otherwise.
    pub fn try_send(&self, beat: T) -> Result<(), T> {
        let mut queue = self.shared.queue();
        if !queue.accepts() {
            return Err(beat);
        }
        queue.beats.push_back(beat);
        drop(queue);
        self.shared.not_empty.notify_waiters();
        Ok(())
    }

    /// Takes the oldest queued beat, waiting for one to arrive if the queue is empty.
    pub async fn recv(&self) -> T {
        loop {
            let notified = self.shared.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(beat) = self.try_recv() {
                return beat;
            }

            notified.await;
        }
    }

    /// Takes the oldest queued beat, if any.
    pub fn try_recv(&self) -> Option<T> {
        let beat = self.shared.queue().beats.pop_front()?;
        self.shared.not_full.notify_waiters();
        Some(beat)
    }

    /// Discards all queued beats, as well as the beats of senders currently stalled, which then
    /// return without completing a handshake.
    pub fn clear(&self) {
        let dropped = {
            let mut queue = self.shared.queue();
            queue.generation = queue.generation.wrapping_add(1);
            std::mem::take(&mut queue.beats)
        };
        if !dropped.is_empty() {
            trace!(
                "channel {}: dropped {} queued beats",
                self.shared.name,
                dropped.len()
            );
        }
        self.shared.not_full.notify_waiters();
    }
}

/// Slave endpoint of a channel the slave receives on.
#[derive(Debug)]
pub struct Sink<T>(Channel<T>);

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Sink<T> {
    /// Binds to `channel`, limiting it to `occupancy_limit` queued beats.
    pub fn new(channel: Channel<T>, occupancy_limit: usize) -> Self {
        channel.set_occupancy_limit(Some(occupancy_limit));
        Self(channel)
    }

    /// Waits for the next beat handed over by the master.
    pub async fn recv(&self) -> T {
        self.0.recv().await
    }

    /// Refuses (or accepts again) handshakes from the master. See [`Channel::set_held`].
    pub fn hold(&self, held: bool) {
        self.0.set_held(held)
    }

    pub fn clear(&self) {
        self.0.clear()
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.0
    }
}

/// Slave endpoint of a channel the slave sends on.
#[derive(Debug)]
pub struct Source<T>(Channel<T>);

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Source<T> {
    /// Binds to `channel`, limiting it to `occupancy_limit` queued beats.
    pub fn new(channel: Channel<T>, occupancy_limit: usize) -> Self {
        channel.set_occupancy_limit(Some(occupancy_limit));
        Self(channel)
    }

    /// Waits until `beat` has been handed over to the wire.
    pub async fn send(&self, beat: T) {
        self.0.send(beat).await
    }

    pub fn clear(&self) {
        self.0.clear()
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.0
    }
}
