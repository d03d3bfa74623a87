//! Doubles shared by the integration suites.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use pppmux::protocol::proto;
use pppmux::vj::{IPPROTO_TCP, IPV4_MIN_HDRLEN};
use pppmux::{Link, LinkCaps, Packet, ProtocolConsumer, SendOutcome, VjCodec, VjFactory};

// ---- links -----------------------------------------------------------

/// Frames a [`WireLink`] handed to its "transport".
#[derive(Default)]
pub struct Wire {
    pub frames: Mutex<VecDeque<Vec<u8>>>,
    /// Number of further frames accepted; `None` accepts everything.
    pub budget: Mutex<Option<usize>>,
}

impl Wire {
    pub fn take(&self) -> Vec<Vec<u8>> {
        self.frames.lock().drain(..).collect()
    }

    pub fn set_budget(&self, budget: Option<usize>) {
        *self.budget.lock() = budget;
    }
}

pub struct WireLink {
    pub caps: LinkCaps,
    pub wire: Arc<Wire>,
}

impl WireLink {
    pub fn new(caps: LinkCaps) -> (Box<Self>, Arc<Wire>) {
        let wire = Arc::new(Wire::default());
        (
            Box::new(Self {
                caps,
                wire: wire.clone(),
            }),
            wire,
        )
    }
}

impl Link for WireLink {
    fn caps(&self) -> LinkCaps {
        self.caps
    }

    fn send(&mut self, frame: Packet, _priority: bool) -> SendOutcome {
        let mut budget = self.wire.budget.lock();
        match budget.as_mut() {
            Some(0) => return SendOutcome::Rejected(frame),
            Some(left) => *left -= 1,
            None => {}
        }
        self.wire.frames.lock().push_back(frame.to_vec());
        SendOutcome::Sent
    }
}

// ---- consumers -------------------------------------------------------

#[derive(Default)]
pub struct Recorder(pub Mutex<Vec<(u32, u16, Vec<u8>)>>);

impl Recorder {
    pub fn take(&self) -> Vec<(u32, u16, Vec<u8>)> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl ProtocolConsumer for Recorder {
    fn input(&self, unit: u32, protocol: u16, packet: Packet) {
        self.0.lock().push((unit, protocol, packet.to_vec()));
    }
}

// ---- VJ double -------------------------------------------------------

/// Header-caching VJ stand-in.
///
/// A datagram whose TCP/IP header matches the cached header of its slot is
/// sent as `VJC_COMP` (`[cid] + payload`); otherwise the header is cached and
/// the datagram goes out as `VJC_UNCOMP` with the cid in the IP protocol field.
pub struct ToyVj {
    tx: Vec<Option<Vec<u8>>>,
    rx: Vec<Option<Vec<u8>>>,
}

fn header_len(datagram: &[u8]) -> Option<usize> {
    let ip = ((*datagram.first()? & 0x0F) as usize) * 4;
    let tcp = ((*datagram.get(ip + 12)? >> 4) as usize) * 4;
    let total = ip + tcp;
    (ip >= IPV4_MIN_HDRLEN && tcp >= 20 && datagram.len() >= total).then_some(total)
}

/// Connection key: addresses and ports.
fn connection(header: &[u8]) -> Vec<u8> {
    let ip = ((header[0] & 0x0F) as usize) * 4;
    let mut key = header[12..20].to_vec();
    key.extend_from_slice(&header[ip..ip + 4]);
    key
}

impl ToyVj {
    pub fn new(slots: u8) -> Self {
        Self {
            tx: vec![None; slots as usize],
            rx: vec![None; slots as usize],
        }
    }
}

impl VjCodec for ToyVj {
    fn compress_tcp(&mut self, datagram: Packet, _compress_cid: bool) -> (u16, Packet) {
        let bytes = datagram.to_vec();
        let Some(len) = header_len(&bytes) else {
            return (proto::IP, datagram);
        };
        let header = &bytes[..len];
        let key = connection(header);

        let slot = self
            .tx
            .iter()
            .position(|cached| cached.as_deref().map(connection) == Some(key.clone()))
            .or_else(|| self.tx.iter().position(Option::is_none))
            .unwrap_or(0);

        if self.tx[slot].as_deref() == Some(header) {
            let mut out = vec![slot as u8];
            out.extend_from_slice(&bytes[len..]);
            return (proto::VJC_COMP, Packet::from(out));
        }

        self.tx[slot] = Some(header.to_vec());
        let mut out = bytes;
        out[9] = slot as u8;
        (proto::VJC_UNCOMP, Packet::from(out))
    }

    fn uncompress(&mut self, protocol: u16, packet: Packet) -> Option<Packet> {
        let mut bytes = packet.to_vec();
        match protocol {
            proto::VJC_UNCOMP => {
                let slot = *bytes.get(9)? as usize;
                if slot >= self.rx.len() {
                    return None;
                }
                bytes[9] = IPPROTO_TCP;
                let len = header_len(&bytes)?;
                self.rx[slot] = Some(bytes[..len].to_vec());
                Some(Packet::from(bytes))
            }
            proto::VJC_COMP => {
                let slot = *bytes.first()? as usize;
                let mut datagram = self.rx.get(slot)?.clone()?;
                datagram.extend_from_slice(&bytes[1..]);
                Some(Packet::from(datagram))
            }
            _ => None,
        }
    }

    fn toss(&mut self) {
        self.rx.iter_mut().for_each(|slot| *slot = None);
    }
}

pub struct ToyVjFactory;

impl VjFactory for ToyVjFactory {
    fn create(&self, slots: u8) -> Option<Box<dyn VjCodec>> {
        Some(Box::new(ToyVj::new(slots)))
    }
}

// ---- packets ---------------------------------------------------------

/// IPv4/TCP datagram from 10.0.0.1:`port` to 10.0.0.2:80.
pub fn tcp_datagram(port: u16, payload: &[u8]) -> Vec<u8> {
    let total = (40 + payload.len()) as u16;
    let mut d = vec![
        0x45, 0x00, 0, 0, 0x00, 0x01, 0x40, 0x00, 64, IPPROTO_TCP, 0, 0, 10, 0, 0, 1, 10, 0, 0,
        2,
    ];
    d[2..4].copy_from_slice(&total.to_be_bytes());
    d.extend_from_slice(&port.to_be_bytes());
    d.extend_from_slice(&80u16.to_be_bytes());
    d.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x18, 0xFF, 0xFF, 0, 0, 0, 0]);
    d.extend_from_slice(payload);
    d
}

/// CCP packet: code, identifier 1, length, options.
pub fn ccp(code: u8, options: &[u8]) -> Vec<u8> {
    let len = (4 + options.len()) as u16;
    let mut p = vec![code, 1];
    p.extend_from_slice(&len.to_be_bytes());
    p.extend_from_slice(options);
    p
}

/// Deflate option block with a 15-bit window.
pub const DEFLATE_OPTS: [u8; 4] = [26, 4, 0x78, 0];
