//! Integration tests for pppmux.
//!
//! Two registries are wired back to back through in-memory links; frames a
//! peer's link "transmits" are fed to the other peer's `link_input`.

mod common;

use std::sync::Arc;

use common::{ccp, tcp_datagram, Recorder, ToyVjFactory, Wire, WireLink, DEFLATE_OPTS};
use pppmux::protocol::proto;
use pppmux::{
    ControlPlane, Direction, HandleId, InterfaceFlags, IoctlCmd, IoctlReply, LinkCaps, LinkFlags,
    LinkId, NpMode, Packet, PppError, Registry, RegistryConfig, UnitHint,
};

const CONFIG_REQUEST: u8 = 1;
const CONFIG_ACK: u8 = 2;
const TERM_ACK: u8 = 6;

struct Peer {
    control: ControlPlane,
    handle: HandleId,
    unit: u32,
    link: LinkId,
    wire: Arc<Wire>,
    ip: Arc<Recorder>,
}

impl Peer {
    fn new(vj: bool) -> Self {
        let mut builder = Registry::builder();
        if vj {
            builder = builder.vj_factory(Arc::new(ToyVjFactory));
        }
        let registry = Arc::new(builder.build().unwrap());
        let control = ControlPlane::new(registry.clone());

        let handle = control.open();
        let unit = control.new_unit(handle, UnitHint::Auto).unwrap();
        let (driver, wire) = WireLink::new(LinkCaps::empty());
        let link = registry.register_link(driver);
        registry.connect_link(link, unit).unwrap();

        let ip = Arc::new(Recorder::default());
        registry.attach_protocol(unit, proto::IP, ip.clone()).unwrap();

        Self {
            control,
            handle,
            unit,
            link,
            wire,
            ip,
        }
    }

    fn registry(&self) -> &Arc<Registry> {
        self.control.registry()
    }

    fn ioctl(&self, cmd: IoctlCmd) -> IoctlReply {
        self.control.ioctl(self.handle, &cmd).unwrap()
    }

    fn flags(&self) -> InterfaceFlags {
        match self.ioctl(IoctlCmd::GetFlags) {
            IoctlReply::Flags(flags) => flags,
            other => panic!("unexpected reply {:?}", other),
        }
    }

    fn send_ip(&self, datagram: &[u8]) {
        self.registry()
            .send(self.unit, proto::IP, Packet::from_slice(datagram))
            .unwrap();
    }

    fn send_ccp(&self, code: u8, options: &[u8]) {
        let mut frame = vec![0x80, 0xFD];
        frame.extend_from_slice(&ccp(code, options));
        self.control.send(self.handle, Packet::from(frame)).unwrap();
    }

    /// Move everything this peer transmitted to `other`.
    fn deliver_to(&self, other: &Peer) -> Vec<Vec<u8>> {
        let frames = self.wire.take();
        for frame in &frames {
            other
                .registry()
                .link_input(other.link, Packet::from_slice(frame));
        }
        frames
    }
}

/// Negotiate Deflate from `tx` to `rx` the way two CCP engines would.
fn negotiate_deflate(tx: &Peer, rx: &Peer) {
    rx.ioctl(IoctlCmd::SetCompressor {
        direction: Direction::Receive,
        options: DEFLATE_OPTS.to_vec(),
    });
    tx.ioctl(IoctlCmd::SetCompressor {
        direction: Direction::Transmit,
        options: DEFLATE_OPTS.to_vec(),
    });
    rx.ioctl(IoctlCmd::SetFlags(InterfaceFlags::CCP_OPEN));
    tx.ioctl(IoctlCmd::SetFlags(InterfaceFlags::CCP_OPEN));

    rx.send_ccp(CONFIG_REQUEST, &DEFLATE_OPTS);
    rx.deliver_to(tx);
    tx.send_ccp(CONFIG_ACK, &DEFLATE_OPTS);
    tx.deliver_to(rx);

    let up = InterfaceFlags::CCP_OPEN | InterfaceFlags::CCP_UP;
    rx.ioctl(IoctlCmd::SetFlags(up));
    tx.ioctl(IoctlCmd::SetFlags(up));
}

#[test]
fn test_ip_crosses_between_peers() {
    let a = Peer::new(false);
    let b = Peer::new(false);

    a.send_ip(&[0x45, 0x00, 0x00, 0x14]);
    let frames = a.deliver_to(&b);

    assert_eq!(frames, vec![vec![0xFF, 0x03, 0x00, 0x21, 0x45, 0x00, 0x00, 0x14]]);
    assert_eq!(b.ip.take(), vec![(b.unit, proto::IP, vec![0x45, 0x00, 0x00, 0x14])]);
}

#[test]
fn test_ccp_frames_reach_control_client() {
    let a = Peer::new(false);
    let b = Peer::new(false);

    b.send_ccp(CONFIG_REQUEST, &DEFLATE_OPTS);
    b.deliver_to(&a);

    let frame = a.control.recv(a.handle).unwrap().unwrap();
    let mut expected = vec![0x80, 0xFD];
    expected.extend_from_slice(&ccp(CONFIG_REQUEST, &DEFLATE_OPTS));
    assert_eq!(frame.to_vec(), expected);
    assert!(a.ip.take().is_empty());
}

#[test]
fn test_deflate_negotiation_and_data() {
    let a = Peer::new(false);
    let b = Peer::new(false);
    negotiate_deflate(&a, &b);

    assert!(a.flags().contains(InterfaceFlags::COMP_RUN));
    assert!(b.flags().contains(InterfaceFlags::DECOMP_RUN));

    let datagram: Vec<u8> = b"0123456789abcdef".iter().cycle().take(600).copied().collect();
    for _ in 0..3 {
        a.send_ip(&datagram);
    }

    let frames = a.deliver_to(&b);
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert_eq!(frame[..4], [0xFF, 0x03, 0x00, 0xFD]);
        assert!(frame.len() < datagram.len());
    }

    let received = b.ip.take();
    assert_eq!(received.len(), 3);
    assert!(received.iter().all(|(_, p, data)| *p == proto::IP && *data == datagram));

    match a.ioctl(IoctlCmd::GetCompStats) {
        IoctlReply::CompStats(stats) => {
            assert_eq!(stats.transmit.comp_packets, 3);
            assert!(stats.transmit.ratio() > 1.0);
        }
        other => panic!("unexpected reply {:?}", other),
    }
    match b.ioctl(IoctlCmd::GetCompStats) {
        IoctlReply::CompStats(stats) => assert_eq!(stats.receive.comp_packets, 3),
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn test_incompressible_frames_keep_histories_aligned() {
    let a = Peer::new(false);
    let b = Peer::new(false);
    negotiate_deflate(&a, &b);

    let mut seed = 0x1234_5678u32;
    let noise: Vec<u8> = (0..300)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 24) as u8
        })
        .collect();
    let text: Vec<u8> = b"abcabcabcabc".iter().cycle().take(400).copied().collect();

    a.send_ip(&noise);
    a.send_ip(&text);
    a.send_ip(&text);
    let frames = a.deliver_to(&b);

    // The noise goes out uncompressed, the text compressed.
    assert_eq!(frames[0][..4], [0xFF, 0x03, 0x00, 0x21]);
    assert_eq!(frames[1][..4], [0xFF, 0x03, 0x00, 0xFD]);

    let received: Vec<Vec<u8>> = b.ip.take().into_iter().map(|(_, _, d)| d).collect();
    assert_eq!(received, vec![noise, text.clone(), text]);
    assert!(!b.flags().contains(InterfaceFlags::DC_ERROR));
}

#[test]
fn test_term_ack_stops_compression() {
    let a = Peer::new(false);
    let b = Peer::new(false);
    negotiate_deflate(&a, &b);

    b.send_ccp(TERM_ACK, &[]);
    b.deliver_to(&a);
    let flags = a.flags();
    assert!(!flags.contains(InterfaceFlags::COMP_RUN));
    assert!(!flags.contains(InterfaceFlags::DECOMP_RUN));

    let datagram = vec![0x45; 200];
    a.send_ip(&datagram);
    let frames = a.deliver_to(&b);
    assert_eq!(frames[0][..4], [0xFF, 0x03, 0x00, 0x21]);
    assert_eq!(b.ip.take()[0].2, datagram);
}

#[test]
fn test_corrupt_compressed_frame_marks_error() {
    let a = Peer::new(false);
    let b = Peer::new(false);
    negotiate_deflate(&a, &b);

    let datagram = vec![0x45; 200];
    a.send_ip(&datagram);
    let mut frame = a.wire.take().remove(0);
    // Out of sequence.
    frame[5] ^= 0x01;
    b.registry().link_input(b.link, Packet::from(frame));

    assert!(b.flags().contains(InterfaceFlags::DC_ERROR));
    assert!(b.ip.take().is_empty());
    assert_eq!(b.registry().stats(b.unit).unwrap().rx_errors, 1);
}

#[test]
fn test_vj_compresses_repeated_headers() {
    let a = Peer::new(true);
    let b = Peer::new(true);
    a.ioctl(IoctlCmd::SetFlags(InterfaceFlags::COMP_TCP));

    let first = tcp_datagram(1000, b"GET / HTTP/1.0\r\n");
    let second = tcp_datagram(1000, b"Host: example.\r\n");
    a.send_ip(&first);
    a.send_ip(&second);

    let frames = a.deliver_to(&b);
    assert_eq!(frames[0][2..4], [0x00, 0x2F]);
    assert_eq!(frames[1][2..4], [0x00, 0x2D]);
    assert!(frames[1].len() < second.len());

    let received: Vec<Vec<u8>> = b.ip.take().into_iter().map(|(_, _, d)| d).collect();
    assert_eq!(received, vec![first, second]);
}

#[test]
fn test_vj_rejected_when_configured() {
    let a = Peer::new(true);
    let b = Peer::new(true);
    a.ioctl(IoctlCmd::SetFlags(InterfaceFlags::COMP_TCP));
    b.ioctl(IoctlCmd::SetFlags(InterfaceFlags::REJ_COMP_TCP));

    a.send_ip(&tcp_datagram(1000, b"x"));
    a.deliver_to(&b);

    assert!(b.ip.take().is_empty());
    assert_eq!(b.registry().stats(b.unit).unwrap().rx_errors, 1);
}

#[test]
fn test_set_max_cid_recreates_vj() {
    let a = Peer::new(true);
    assert_eq!(a.ioctl(IoctlCmd::SetMaxCid(4)), IoctlReply::Done);
    assert!(matches!(
        a.control.ioctl(a.handle, &IoctlCmd::SetMaxCid(0)),
        Err(PppError::InvalidArgument(_))
    ));
}

#[test]
fn test_rejected_frame_is_retransmitted_first() {
    let a = Peer::new(false);
    a.wire.set_budget(Some(1));

    for tag in 1..=3u8 {
        a.send_ip(&[0x45, tag]);
    }
    assert_eq!(a.wire.take(), vec![vec![0xFF, 0x03, 0x00, 0x21, 0x45, 1]]);

    a.wire.set_budget(None);
    a.registry().link_drained(a.link);
    assert_eq!(
        a.wire.take(),
        vec![
            vec![0xFF, 0x03, 0x00, 0x21, 0x45, 2],
            vec![0xFF, 0x03, 0x00, 0x21, 0x45, 3],
        ]
    );
    assert_eq!(a.registry().stats(a.unit).unwrap().tx_packets, 3);
}

#[test]
fn test_full_output_queue_is_reported() {
    let registry = Registry::builder().output_queue_len(2).build().unwrap();
    let unit = registry.new_unit(UnitHint::Auto).unwrap();
    let (driver, wire) = WireLink::new(LinkCaps::empty());
    let link = registry.register_link(driver);
    registry.connect_link(link, unit).unwrap();
    wire.set_budget(Some(0));

    registry.send(unit, proto::IP, Packet::from_slice(&[1])).unwrap();
    registry.send(unit, proto::IP, Packet::from_slice(&[2])).unwrap();
    let result = registry.send(unit, proto::IP, Packet::from_slice(&[3]));

    assert!(matches!(result, Err(PppError::ResourceExhausted(_))));
    assert_eq!(registry.stats(unit).unwrap().tx_errors, 1);
}

#[test]
fn test_multilink_round_robin() {
    let registry = Registry::new();
    let unit = registry.new_unit(UnitHint::Auto).unwrap();
    let wires: Vec<Arc<Wire>> = (0..2)
        .map(|_| {
            let (driver, wire) = WireLink::new(LinkCaps::ELIDES_AC);
            let link = registry.register_link(driver);
            registry.connect_link(link, unit).unwrap();
            wire
        })
        .collect();

    for tag in 0..4u8 {
        registry.send(unit, proto::IP, Packet::from_slice(&[tag])).unwrap();
    }
    assert_eq!(wires[0].take(), vec![vec![0x00, 0x21, 0], vec![0x00, 0x21, 2]]);
    assert_eq!(wires[1].take(), vec![vec![0x00, 0x21, 1], vec![0x00, 0x21, 3]]);
}

#[test]
fn test_link_handle_negotiated_framing() {
    let a = Peer::new(false);
    let link_handle = a.control.open();
    a.control.attach_link(link_handle, a.link).unwrap();
    a.control
        .ioctl(
            link_handle,
            &IoctlCmd::SetLinkFlags(LinkFlags::COMP_PROT | LinkFlags::COMP_AC),
        )
        .unwrap();

    a.send_ip(&[0x45]);
    a.control
        .send(link_handle, Packet::from_slice(&[0xC0, 0x21, 9, 1, 0, 4]))
        .unwrap();

    assert_eq!(
        a.wire.take(),
        vec![vec![0x21, 0x45], vec![0xFF, 0x03, 0xC0, 0x21, 9, 1, 0, 4]]
    );
}

#[test]
fn test_rejected_address_control_compression() {
    let a = Peer::new(false);
    a.registry()
        .link_ioctl(a.link, &IoctlCmd::SetLinkFlags(LinkFlags::REJ_COMP_AC))
        .unwrap();

    a.registry().link_input(a.link, Packet::from_slice(&[0x00, 0x21, 0x45]));
    assert!(a.ip.take().is_empty());
    assert_eq!(a.registry().stats(a.unit).unwrap().rx_errors, 1);

    a.registry()
        .link_input(a.link, Packet::from_slice(&[0xFF, 0x03, 0x21, 0x45]));
    assert_eq!(a.ip.take(), vec![(a.unit, proto::IP, vec![0x45])]);
}

#[test]
fn test_modes() {
    let a = Peer::new(false);
    let b = Peer::new(false);

    a.ioctl(IoctlCmd::SetNpMode(proto::IP, NpMode::Queue));
    a.send_ip(&[0x45]);
    assert!(a.wire.take().is_empty());
    assert_eq!(a.registry().stats(a.unit).unwrap().tx_dropped, 1);

    b.ioctl(IoctlCmd::SetNpMode(proto::IP, NpMode::Drop));
    b.registry()
        .link_input(b.link, Packet::from_slice(&[0x00, 0x21, 0x45]));
    assert!(b.ip.take().is_empty());
    assert_eq!(b.registry().stats(b.unit).unwrap().rx_dropped, 1);

    assert!(matches!(
        a.control
            .ioctl(a.handle, &IoctlCmd::SetNpMode(proto::LCP, NpMode::Drop)),
        Err(PppError::InvalidArgument(_))
    ));
}

#[test]
fn test_config_from_json() {
    let config =
        RegistryConfig::from_json(r#"{ "max_interfaces": 1, "client_queue_len": 1 }"#).unwrap();
    let registry = Registry::builder().config(config).build().unwrap();

    let unit = registry.new_unit(UnitHint::Auto).unwrap();
    assert!(matches!(
        registry.new_unit(UnitHint::Auto),
        Err(PppError::ResourceExhausted(_))
    ));

    let control = ControlPlane::new(Arc::new(registry));
    let handle = control.open();
    control.attach(handle, unit).unwrap();
    let (driver, _) = WireLink::new(LinkCaps::empty());
    let link = control.registry().register_link(driver);
    control.registry().connect_link(link, unit).unwrap();

    // Queue of one: the second CCP frame replaces the first.
    for code in [1u8, 2] {
        let mut frame = vec![0x80, 0xFD];
        frame.extend_from_slice(&ccp(code, &[]));
        control.registry().link_input(link, Packet::from(frame));
    }
    let frame = control.recv(handle).unwrap().unwrap();
    assert_eq!(frame.byte_at(2), Some(2));
    assert_eq!(control.registry().stats(unit).unwrap().rx_dropped, 1);

    assert!(matches!(
        RegistryConfig::from_json(r#"{ "output_queue_len": 0 }"#),
        Err(PppError::InvalidArgument(_))
    ));
}

#[test]
fn test_report_serializes() {
    let a = Peer::new(false);
    a.send_ip(&[0x45]);

    let report = a.control.report(a.handle).unwrap();
    let mut line = Vec::new();
    pppmux::control::write_report(&mut line, &report).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&line).unwrap();

    assert_eq!(parsed["unit"], a.unit);
    assert_eq!(parsed["stats"]["tx_packets"], 1);
}
