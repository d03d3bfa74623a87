//! Protocol module - discriminators, address/control prefix and CCP layout.
//!
//! This module implements the PPP wire conventions the core relies on:
//! - 1-or-2 byte protocol discriminator (low-bit rule)
//! - `FF 03` address/control prefix
//! - CCP packet header and option blocks

mod ccp;
mod wire_format;

pub use ccp::{CcpCode, CcpPacket, OptionBlock, CCP_HDRLEN, CCP_OPT_MINLEN};
pub use wire_format::{
    decode_protocol, encode_protocol, has_ac_prefix, is_link_protocol, is_network_data,
    is_valid_protocol, proto, push_protocol, take_protocol, AC_PREFIX_LEN, LINK_PROTOCOL_BASE,
    PPP_ALLSTATIONS, PPP_HDRLEN, PPP_MRU, PPP_UI, PROTO_LEN,
};
