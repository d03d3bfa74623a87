//! Two PPP endpoints joined by an in-memory byte stream.
//!
//! Each side owns a registry with one interface and one HDLC stream link.
//! The control clients negotiate Deflate through CCP, then IP datagrams are
//! pushed through the family shims and reported on arrival.
//!
//! ```text
//! cargo run --example loopback
//! RUST_LOG=pppmux=debug cargo run --example loopback
//! ```

use std::sync::Arc;
use std::time::Duration;

use pppmux::protocol::{proto, CcpCode};
use pppmux::transport::{spawn_stream_link, StreamConfig, StreamTasks};
use pppmux::{
    ControlPlane, Direction, FamilyShim, HandleId, HostStack, InterfaceFlags, IoctlCmd, Packet,
    Registry, UnitHint,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const DEFLATE_OPTS: [u8; 4] = [26, 4, 0x78, 0];

struct Host {
    name: &'static str,
    tx: mpsc::UnboundedSender<Packet>,
}

impl HostStack for Host {
    fn input(&self, unit: u32, protocol: u16, packet: Packet) {
        tracing::info!(
            "{}: ppp{} protocol {:#06x}, {} bytes",
            self.name,
            unit,
            protocol,
            packet.len()
        );
        let _ = self.tx.send(packet);
    }
}

struct Endpoint {
    control: ControlPlane,
    handle: HandleId,
    shim: FamilyShim,
    tasks: StreamTasks,
}

impl Endpoint {
    fn new<S>(
        name: &'static str,
        stream: S,
        delivered: mpsc::UnboundedSender<Packet>,
    ) -> pppmux::Result<Self>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let registry = Arc::new(Registry::new());
        let control = ControlPlane::new(registry.clone());
        let handle = control.open();
        let unit = control.new_unit(handle, UnitHint::Auto)?;

        let tasks = spawn_stream_link(registry.clone(), stream, StreamConfig::default());
        registry.connect_link(tasks.link, unit)?;

        let host = Arc::new(Host {
            name,
            tx: delivered,
        });
        let shim = FamilyShim::new(registry, unit, host);
        shim.attach(proto::IP)?;

        Ok(Self {
            control,
            handle,
            shim,
            tasks,
        })
    }

    fn ccp(&self, code: CcpCode, options: &[u8]) -> pppmux::Result<()> {
        let len = (4 + options.len()) as u16;
        let mut frame = vec![0x80, 0xFD, u8::from(code), 1];
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(options);
        self.control.send(self.handle, Packet::from(frame))
    }

    /// Wait for the next frame queued for the control client.
    async fn next_control(&self) -> pppmux::Result<Packet> {
        loop {
            if let Some(frame) = self.control.recv(self.handle)? {
                return Ok(frame);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[tokio::main]
async fn main() -> pppmux::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (left, right) = tokio::io::duplex(4096);
    let (a_tx, _a_rx) = mpsc::unbounded_channel();
    let (b_tx, mut b_rx) = mpsc::unbounded_channel();
    let a = Endpoint::new("a", left, a_tx)?;
    let b = Endpoint::new("b", right, b_tx)?;

    // a compresses towards b.
    a.control.ioctl(
        a.handle,
        &IoctlCmd::SetCompressor {
            direction: Direction::Transmit,
            options: DEFLATE_OPTS.to_vec(),
        },
    )?;
    b.control.ioctl(
        b.handle,
        &IoctlCmd::SetCompressor {
            direction: Direction::Receive,
            options: DEFLATE_OPTS.to_vec(),
        },
    )?;
    for end in [&a, &b] {
        end.control
            .ioctl(end.handle, &IoctlCmd::SetFlags(InterfaceFlags::CCP_OPEN))?;
    }

    b.ccp(CcpCode::ConfigRequest, &DEFLATE_OPTS)?;
    let request = a.next_control().await?;
    tracing::info!("a: CCP request {:02x?}", request.to_vec());
    a.ccp(CcpCode::ConfigAck, &DEFLATE_OPTS)?;
    let ack = b.next_control().await?;
    tracing::info!("b: CCP ack {:02x?}", ack.to_vec());

    for end in [&a, &b] {
        end.control.ioctl(
            end.handle,
            &IoctlCmd::SetFlags(InterfaceFlags::CCP_OPEN | InterfaceFlags::CCP_UP),
        )?;
    }

    let datagram = {
        let mut d = vec![0x45, 0x00, 0x00, 0x00];
        d.extend(std::iter::repeat(b'x').take(200));
        d
    };
    for _ in 0..3 {
        a.shim.send(proto::IP, Packet::from_slice(&datagram))?;
    }
    for _ in 0..3 {
        if let Some(packet) = b_rx.recv().await {
            assert_eq!(packet.to_vec(), datagram);
        }
    }

    let report = a.control.report(a.handle)?;
    tracing::info!("a: {}", report);
    let report = b.control.report(b.handle)?;
    tracing::info!("b: {}", report);

    a.tasks.abort();
    b.tasks.abort();
    Ok(())
}
