use std::fmt;
use std::io::IoSlice;

use bitflags::bitflags;

use crate::capability::Completion;

bitflags! {
    // Opaque per-packet flags, forwarded verbatim. Unknown bits are kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u32 {
        /// Frame has not been through the sender's own processing.
        const RAW = 1 << 0;

        const _ = !0;
    }
}

impl PacketFlags {
    pub const NONE: PacketFlags = PacketFlags::empty();
}

// ==========================================
// A buffered, not-yet-delivered packet
// ==========================================
pub(crate) struct Packet<S> {
    pub sender: S,
    pub flags: PacketFlags,
    // one contiguous copy, the caller's buffers are not kept past the call
    pub payload: Box<[u8]>,
    pub completion: Option<Completion<S>>,
}

impl<S> Packet<S> {
    pub fn new(
        sender: S,
        flags: PacketFlags,
        iov: &[IoSlice<'_>],
        completion: Option<Completion<S>>,
    ) -> Self {
        Self {
            sender,
            flags,
            payload: coalesce(iov),
            completion,
        }
    }
}

pub fn iov_len(iov: &[IoSlice<'_>]) -> usize {
    iov.iter().map(|slice| slice.len()).sum()
}

fn coalesce(iov: &[IoSlice<'_>]) -> Box<[u8]> {
    let mut buf = Vec::with_capacity(iov_len(iov));
    for slice in iov {
        buf.extend_from_slice(slice);
    }
    buf.into_boxed_slice()
}

// Trace view of a payload: alphanumerics as-is, anything else as \xx
pub(crate) struct PayloadDump<'a, 'b>(pub &'a [IoSlice<'b>]);

impl fmt::Display for PayloadDump<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().flat_map(|slice| slice.iter()) {
            if byte.is_ascii_alphanumeric() {
                write!(f, "{}", *byte as char)?;
            } else {
                write!(f, "\\{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scattered_input_is_stored_contiguously() {
        let head = [0x45u8, 0x00];
        let body = *b"payload";
        let iov = [IoSlice::new(&head), IoSlice::new(&[]), IoSlice::new(&body)];

        let packet = Packet::new(7u32, PacketFlags::RAW, &iov, None);

        assert_eq!(&packet.payload[..2], &head);
        assert_eq!(&packet.payload[2..], b"payload");
        assert_eq!(packet.payload.len(), iov_len(&iov));
        assert!(packet.flags.contains(PacketFlags::RAW));
    }

    #[test]
    fn unknown_flag_bits_pass_through() {
        let flags = PacketFlags::from_bits_retain(0x8000_0000) | PacketFlags::RAW;
        assert_eq!(flags.bits(), 0x8000_0001);
        assert!(flags.contains(PacketFlags::RAW));
        assert!(!PacketFlags::NONE.contains(PacketFlags::RAW));
        assert!(PacketFlags::NONE.is_empty());
    }

    #[test]
    fn payload_dump_escapes_non_alphanumerics() {
        let iov = [IoSlice::new(b"GET a1"), IoSlice::new(&[0x00, b'Z', 0xff])];
        assert_eq!(PayloadDump(&iov).to_string(), "GET\\20a1\\00Z\\ff");
        assert_eq!(PayloadDump(&[]).to_string(), "");
    }
}
