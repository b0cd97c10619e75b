use std::io::IoSlice;
use std::marker::PhantomData;

use crate::outcome::Outcome;
use crate::packet::PacketFlags;

pub type Completion<S> = Box<dyn FnOnce(&S, Outcome)>;

/// Moves a packet toward its destination. `sender` is `None` for `receive`.
///
/// Returning [`Outcome::NotDelivered`] is a promise: the implementation must call
/// [`DeliveryQueue::flush`](crate::DeliveryQueue::flush) once it can accept again,
/// otherwise the backlog stalls for good.
pub trait Deliver<S> {
    fn deliver(&mut self, sender: Option<&S>, flags: PacketFlags, iov: &[IoSlice<'_>])
        -> Outcome;
}

// Only `send` asks.
pub trait Readiness<S> {
    fn can_send(&self, sender: &S) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl<S> Readiness<S> for AlwaysReady {
    fn can_send(&self, _sender: &S) -> bool {
        true
    }
}

// ==========================================
// Closure adapters
// ==========================================
pub struct DeliverFn<S, F> {
    f: F,
    _sender: PhantomData<fn(&S)>,
}

pub fn deliver_fn<S, F>(f: F) -> DeliverFn<S, F>
where
    F: FnMut(Option<&S>, PacketFlags, &[IoSlice<'_>]) -> Outcome,
{
    DeliverFn {
        f,
        _sender: PhantomData,
    }
}

impl<S, F> Deliver<S> for DeliverFn<S, F>
where
    F: FnMut(Option<&S>, PacketFlags, &[IoSlice<'_>]) -> Outcome,
{
    fn deliver(
        &mut self,
        sender: Option<&S>,
        flags: PacketFlags,
        iov: &[IoSlice<'_>],
    ) -> Outcome {
        (self.f)(sender, flags, iov)
    }
}

pub struct ReadyFn<S, F> {
    f: F,
    _sender: PhantomData<fn(&S)>,
}

pub fn ready_fn<S, F>(f: F) -> ReadyFn<S, F>
where
    F: Fn(&S) -> bool,
{
    ReadyFn {
        f,
        _sender: PhantomData,
    }
}

impl<S, F> Readiness<S> for ReadyFn<S, F>
where
    F: Fn(&S) -> bool,
{
    fn can_send(&self, sender: &S) -> bool {
        (self.f)(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::iov_len;

    #[test]
    fn closure_adapters_forward_arguments() {
        let mut seen = Vec::new();
        let mut deliver = deliver_fn(|sender: Option<&u8>, flags: PacketFlags, iov: &[IoSlice<'_>]| {
            seen.push((sender.copied(), flags.bits()));
            Outcome::Delivered(iov_len(iov))
        });
        let data = [1u8, 2, 3];

        let outcome = deliver.deliver(Some(&9), PacketFlags::RAW, &[IoSlice::new(&data)]);
        assert_eq!(outcome, Outcome::Delivered(3));
        drop(deliver);
        assert_eq!(seen, vec![(Some(9), 1)]);

        let ready = ready_fn(|sender: &u8| *sender != 4);
        assert!(ready.can_send(&3));
        assert!(!ready.can_send(&4));
        assert!(Readiness::<u8>::can_send(&AlwaysReady, &4));
    }
}
