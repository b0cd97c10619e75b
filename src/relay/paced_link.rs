use std::cell::{Cell, RefCell};
use std::io::IoSlice;
use std::rc::Rc;

use log::trace;
use net_queue::{Deliver, Outcome, PacketFlags, iov_len};

use super::token_bucket::{TokenBucket, TokenBucketLimiter};

// ==========================================
// Rate-limited destination
// Refuses with NotDelivered when the bucket runs dry, and remembers that it owes
// the queue a flush.
// ==========================================
pub struct PacedLink {
    bucket: Rc<RefCell<TokenBucket>>,
    stalled: Rc<Cell<bool>>,
    overhead: usize,
}

#[derive(Clone)]
pub struct LinkHandle {
    bucket: Rc<RefCell<TokenBucket>>,
    stalled: Rc<Cell<bool>>,
    resume_cost: usize,
}

impl PacedLink {
    pub fn new(bucket: TokenBucket, overhead: usize, resume_cost: usize) -> (Self, LinkHandle) {
        let bucket = Rc::new(RefCell::new(bucket));
        let stalled = Rc::new(Cell::new(false));
        let handle = LinkHandle {
            bucket: bucket.clone(),
            stalled: stalled.clone(),
            resume_cost: resume_cost + overhead,
        };
        (
            Self {
                bucket,
                stalled,
                overhead,
            },
            handle,
        )
    }
}

impl Deliver<usize> for PacedLink {
    fn deliver(
        &mut self,
        sender: Option<&usize>,
        _flags: PacketFlags,
        iov: &[IoSlice<'_>],
    ) -> Outcome {
        let len = iov_len(iov);
        if self.bucket.borrow_mut().consume(len + self.overhead) {
            return Outcome::Delivered(len);
        }
        if !self.stalled.replace(true) {
            trace!("link stalled on packet from {:?}", sender);
        }
        Outcome::NotDelivered
    }
}

impl LinkHandle {
    pub fn is_stalled(&self) -> bool {
        self.stalled.get()
    }

    pub fn tokens(&self) -> f64 {
        self.bucket.borrow().tokens()
    }

    /// True once a stalled link has tokens again. Clears the stall, the caller must
    /// flush right away.
    pub fn take_resume(&self) -> bool {
        if !self.stalled.get() {
            return false;
        }
        if !self.bucket.borrow_mut().can_spend(self.resume_cost) {
            return false;
        }
        self.stalled.set(false);
        true
    }
}
