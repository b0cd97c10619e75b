use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::io::IoSlice;

use log::{debug, trace};

use crate::capability::{AlwaysReady, Completion, Deliver, Readiness};
use crate::config::QueueConfig;
use crate::guard::DeliveringGuard;
use crate::outcome::Outcome;
use crate::packet::{Packet, PacketFlags, PayloadDump, iov_len};
use crate::stats::QueueStats;

// ==========================================
// Admission policy
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePolicy {
    /// No completion: dropped once `len() >= capacity()`.
    BoundedDrop,
    /// Completion present: always buffered, the caller paces itself off the completion.
    CallerManaged,
}

impl EnqueuePolicy {
    pub fn for_completion(tracked: bool) -> Self {
        if tracked {
            EnqueuePolicy::CallerManaged
        } else {
            EnqueuePolicy::BoundedDrop
        }
    }

    pub fn admits(self, len: usize, capacity: usize) -> bool {
        match self {
            EnqueuePolicy::BoundedDrop => len < capacity,
            EnqueuePolicy::CallerManaged => true,
        }
    }
}

// ==========================================
// Delivery queue
// ==========================================
/// FIFO relay between a sender and a [`Deliver`] capability.
///
/// All operations take `&self` so the capability and completions may call back into
/// the queue. The backlog is never borrowed while a collaborator runs; the capability
/// stays borrowed during a delivery, and the `delivering` flag stops every nested
/// delivery before it gets there.
pub struct DeliveryQueue<S> {
    capacity: Cell<usize>,
    delivering: Cell<bool>,
    backlog: RefCell<VecDeque<Packet<S>>>,
    deliver: RefCell<Box<dyn Deliver<S>>>,
    readiness: Box<dyn Readiness<S>>,
    stats: Cell<QueueStats>,
}

impl<S> DeliveryQueue<S> {
    pub fn new<D>(deliver: D) -> Self
    where
        D: Deliver<S> + 'static,
    {
        Self {
            capacity: Cell::new(QueueConfig::default().capacity),
            delivering: Cell::new(false),
            backlog: RefCell::new(VecDeque::new()),
            deliver: RefCell::new(Box::new(deliver)),
            readiness: Box::new(AlwaysReady),
            stats: Cell::new(QueueStats::default()),
        }
    }

    pub fn with_config<D>(config: QueueConfig, deliver: D) -> Self
    where
        D: Deliver<S> + 'static,
    {
        let queue = Self::new(deliver);
        queue.capacity.set(config.capacity);
        queue
    }

    pub fn with_readiness<R>(mut self, readiness: R) -> Self
    where
        R: Readiness<S> + 'static,
    {
        self.readiness = Box::new(readiness);
        self
    }

    pub fn len(&self) -> usize {
        self.backlog.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    // later admissions only, nothing already buffered is evicted
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.set(capacity);
    }

    pub fn is_delivering(&self) -> bool {
        self.delivering.get()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.get()
    }

    /// Destroys the backlog without firing completions and returns the final counters.
    pub fn teardown(self) -> QueueStats {
        let mut stats = self.stats.get();
        stats.discarded += self.len() as u64;
        drop(self);
        stats
    }

    fn bump(&self, update: impl FnOnce(&mut QueueStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    fn enqueue(
        &self,
        sender: S,
        flags: PacketFlags,
        iov: &[IoSlice<'_>],
        completion: Option<Completion<S>>,
    ) -> bool {
        let policy = EnqueuePolicy::for_completion(completion.is_some());
        let capacity = self.capacity.get();
        let mut backlog = self.backlog.borrow_mut();

        if !policy.admits(backlog.len(), capacity) {
            drop(backlog);
            trace!(
                "backlog full ({} >= {}), dropping untracked packet of {} bytes",
                self.len(),
                capacity,
                iov_len(iov)
            );
            self.bump(|s| s.dropped += 1);
            return false;
        }

        backlog.push_back(Packet::new(sender, flags, iov, completion));
        let len = backlog.len();
        drop(backlog);

        trace!("buffered packet ({:?}), backlog now {}", policy, len);
        self.bump(|s| s.queued += 1);
        true
    }

    fn deliver_now(&self, sender: Option<&S>, flags: PacketFlags, iov: &[IoSlice<'_>]) -> Outcome {
        let Some(_guard) = DeliveringGuard::try_acquire(&self.delivering) else {
            return Outcome::NotDelivered;
        };
        let raw = self.deliver.borrow_mut().deliver(sender, flags, iov);
        let outcome = raw.normalize();
        if outcome != raw {
            debug!("capability returned {:?}, treated as {:?}", raw, outcome);
        }

        match outcome {
            Outcome::Delivered(_) => self.bump(|s| s.delivered += 1),
            Outcome::Failed(_) => self.bump(|s| s.failed += 1),
            Outcome::NotDelivered => {}
        }
        outcome
    }

    /// Direct injection, never buffered. Refused with `NotDelivered` inside a delivery.
    pub fn receive(&self, data: &[u8]) -> Outcome {
        self.receive_scattered(&[IoSlice::new(data)])
    }

    pub fn receive_scattered(&self, iov: &[IoSlice<'_>]) -> Outcome {
        if self.delivering.get() {
            trace!("receive refused, delivery in progress");
            return Outcome::NotDelivered;
        }
        trace!("receive [{}]", PayloadDump(iov));
        self.deliver_now(None, PacketFlags::NONE, iov)
    }

    /// Sends `data` on behalf of `sender`, buffering it if it cannot go out now.
    ///
    /// Returns [`Outcome::NotDelivered`] when the packet was buffered or dropped,
    /// otherwise the capability's outcome after an opportunistic [`flush`](Self::flush).
    /// `completion` only fires for a buffered packet.
    pub fn send(
        &self,
        sender: S,
        flags: PacketFlags,
        data: &[u8],
        completion: Option<Completion<S>>,
    ) -> Outcome {
        self.send_scattered(sender, flags, &[IoSlice::new(data)], completion)
    }

    pub fn send_scattered(
        &self,
        sender: S,
        flags: PacketFlags,
        iov: &[IoSlice<'_>],
        completion: Option<Completion<S>>,
    ) -> Outcome {
        trace!("send {} bytes [{}]", iov_len(iov), PayloadDump(iov));

        if self.delivering.get() || !self.readiness.can_send(&sender) {
            trace!("send #1: not ready or delivering, buffering");
            self.enqueue(sender, flags, iov, completion);
            return Outcome::NotDelivered;
        }

        let outcome = self.deliver_now(Some(&sender), flags, iov);
        if outcome == Outcome::NotDelivered {
            trace!("send #3: destination busy, buffering");
            self.enqueue(sender, flags, iov, completion);
            return Outcome::NotDelivered;
        }

        trace!("send #2: delivered immediately ({:?})", outcome);
        self.flush();
        outcome
    }

    /// Drains the backlog head first, stopping at the first refused packet, which goes
    /// back to the head. `true` only when the backlog ended up empty; always `false`
    /// from inside a delivery.
    pub fn flush(&self) -> bool {
        if self.delivering.get() {
            trace!("flush refused, delivery in progress");
            return false;
        }
        trace!("flush, backlog {}", self.len());

        let mut attempt = 0usize;
        loop {
            let head = self.backlog.borrow_mut().pop_front();
            let Some(packet) = head else {
                trace!("flush done after {} packet(s)", attempt);
                return true;
            };
            trace!(
                "flush #{}: {} bytes [{}]",
                attempt,
                packet.payload.len(),
                PayloadDump(&[IoSlice::new(&packet.payload)])
            );
            attempt += 1;

            let outcome = self.deliver_now(
                Some(&packet.sender),
                packet.flags,
                &[IoSlice::new(&packet.payload)],
            );

            if outcome == Outcome::NotDelivered {
                self.backlog.borrow_mut().push_front(packet);
                trace!("destination busy, head requeued, backlog {}", self.len());
                return false;
            }

            let Packet {
                sender, completion, ..
            } = packet;
            if let Some(completion) = completion {
                completion(&sender, outcome);
            }
        }
    }
}

impl<S: PartialEq> DeliveryQueue<S> {
    /// Removes every buffered packet from `sender` and fires each completion with
    /// [`Outcome::NotDelivered`]. Everything else keeps its order.
    pub fn purge(&self, sender: &S) -> usize {
        let removed: VecDeque<Packet<S>> = {
            let mut backlog = self.backlog.borrow_mut();
            let (removed, kept): (VecDeque<_>, VecDeque<_>) =
                backlog.drain(..).partition(|packet| packet.sender == *sender);
            *backlog = kept;
            removed
        };

        let count = removed.len();
        if count > 0 {
            debug!("purged {} buffered packet(s), backlog now {}", count, self.len());
            self.bump(|s| s.purged += count as u64);
        }

        for packet in removed {
            let Packet {
                sender, completion, ..
            } = packet;
            if let Some(completion) = completion {
                completion(&sender, Outcome::NotDelivered);
            }
        }
        count
    }
}

impl<S> Drop for DeliveryQueue<S> {
    fn drop(&mut self) {
        let backlog = self.backlog.get_mut();
        if backlog.is_empty() {
            return;
        }
        let count = backlog.len();
        backlog.clear();
        self.stats.get_mut().discarded += count as u64;
        debug!("teardown discarded {} buffered packet(s)", count);
    }
}

impl<S> fmt::Debug for DeliveryQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("len", &self.backlog.try_borrow().map(|b| b.len()).ok())
            .field("capacity", &self.capacity.get())
            .field("delivering", &self.delivering.get())
            .field("stats", &self.stats.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::capability::deliver_fn;

    fn busy(capacity: usize) -> DeliveryQueue<u32> {
        DeliveryQueue::with_config(
            QueueConfig::default().with_capacity(capacity),
            deliver_fn(|_: Option<&u32>, _: PacketFlags, _: &[IoSlice<'_>]| Outcome::NotDelivered),
        )
    }

    fn frame(byte: u8) -> [IoSlice<'static>; 1] {
        static FRAMES: [[u8; 1]; 4] = [[0], [1], [2], [3]];
        [IoSlice::new(&FRAMES[byte as usize])]
    }

    #[test]
    fn policy_follows_completion() {
        assert_eq!(EnqueuePolicy::for_completion(false), EnqueuePolicy::BoundedDrop);
        assert_eq!(EnqueuePolicy::for_completion(true), EnqueuePolicy::CallerManaged);
        assert!(!EnqueuePolicy::BoundedDrop.admits(2, 2));
        assert!(EnqueuePolicy::BoundedDrop.admits(1, 2));
        assert!(EnqueuePolicy::CallerManaged.admits(usize::MAX, 2));
    }

    #[test]
    fn bounded_drop_at_capacity() {
        let queue = busy(2);
        assert!(queue.enqueue(1, PacketFlags::NONE, &frame(1), None));
        assert!(queue.enqueue(1, PacketFlags::NONE, &frame(2), None));

        assert!(!queue.enqueue(1, PacketFlags::NONE, &frame(3), None));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().dropped, 1);
        assert_eq!(queue.stats().queued, 2);
    }

    #[test]
    fn caller_managed_grows_past_capacity() {
        let queue = busy(2);
        queue.enqueue(1, PacketFlags::NONE, &frame(1), None);
        queue.enqueue(1, PacketFlags::NONE, &frame(2), None);

        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        let completion: Completion<u32> = Box::new(move |_, _| seen.set(seen.get() + 1));
        assert!(queue.enqueue(1, PacketFlags::NONE, &frame(3), Some(completion)));

        assert_eq!(queue.len(), 3);
        assert!(queue.len() > queue.capacity());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn set_capacity_keeps_existing_backlog() {
        let queue = busy(2);
        queue.enqueue(1, PacketFlags::NONE, &frame(1), None);
        queue.enqueue(1, PacketFlags::NONE, &frame(2), None);

        queue.set_capacity(1);
        assert_eq!(queue.len(), 2);
        assert!(!queue.enqueue(1, PacketFlags::NONE, &frame(3), None));
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn zero_capacity_admits_only_tracked_packets() {
        let queue = busy(0);
        assert!(!queue.enqueue(1, PacketFlags::NONE, &frame(1), None));
        assert!(queue.is_empty());

        let completion: Completion<u32> = Box::new(|_, _| {});
        assert!(queue.enqueue(1, PacketFlags::NONE, &frame(2), Some(completion)));
        assert!(!queue.enqueue(1, PacketFlags::NONE, &frame(3), None));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().dropped, 2);
    }
}
