//! Link-level framing applied around every driver.
//!
//! Outbound frame as handed to a driver:
//! ```text
//! ┌─────────┬──────────────┬─────────────┐
//! │ FF 03   │ Protocol     │ Payload     │
//! │ 0 or 2  │ 1 or 2       │ ...         │
//! └─────────┴──────────────┴─────────────┘
//! ```
//!
//! The prefix is omitted when the transport elides it or address/control
//! compression is negotiated (never for LCP); the protocol loses its zero high
//! byte when protocol-field compression is negotiated.

use crate::error::{PppError, Result};
use crate::packet::Packet;
use crate::protocol::{
    has_ac_prefix, is_link_protocol, proto, take_protocol, AC_PREFIX_LEN, PPP_ALLSTATIONS,
    PPP_HDRLEN, PPP_UI, PROTO_LEN,
};

use super::{LinkCaps, LinkFlags};

/// Frame a packet that starts with its two-byte protocol field.
///
/// Returns the framed packet and whether it belongs on the priority queue.
pub fn frame_outbound(mut frame: Packet, flags: LinkFlags, caps: LinkCaps) -> (Packet, bool) {
    let mut field = [0u8; PROTO_LEN];
    if !frame.copy_prefix(&mut field) {
        return (frame, false);
    }
    let protocol = u16::from_be_bytes(field);

    if flags.contains(LinkFlags::COMP_PROT) && field[0] == 0 {
        frame.trim_front(1);
    }

    if !caps.contains(LinkCaps::ELIDES_AC)
        && (protocol == proto::LCP || !flags.contains(LinkFlags::COMP_AC))
    {
        frame.prepend(&[PPP_ALLSTATIONS, PPP_UI]);
    }

    let priority = is_link_protocol(protocol) && caps.contains(LinkCaps::OOB_QUEUE);
    (frame, priority)
}

/// Strip the link-level framing from a received frame.
///
/// Returns the protocol and payload, or `InvalidArgument` for a frame that
/// must be counted as an input error.
pub fn deframe_inbound(
    mut frame: Packet,
    flags: LinkFlags,
    caps: LinkCaps,
    mru: u16,
) -> Result<(u16, Packet)> {
    if frame.len() > mru as usize + PPP_HDRLEN {
        return Err(PppError::InvalidArgument(format!(
            "Frame of {} bytes exceeds MRU {}",
            frame.len(),
            mru
        )));
    }

    if !caps.contains(LinkCaps::ELIDES_AC) {
        if has_ac_prefix(&frame) {
            frame.trim_front(AC_PREFIX_LEN);
        } else if flags.contains(LinkFlags::REJ_COMP_AC) {
            return Err(PppError::InvalidArgument(
                "Frame without address/control prefix".into(),
            ));
        }
    }

    let protocol = take_protocol(&mut frame)?;
    Ok((protocol, frame))
}
