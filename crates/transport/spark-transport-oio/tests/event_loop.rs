//! 调度器集成：兼容性闸门、回显驱动与跨线程关闭。

use bytes::Bytes;
use spark_transport::{
    BufferPort, ByteBuffer, Channel, ChannelCapabilities, ChannelError, ChannelId, ChannelState,
    EventLoopKind, InboundHandler, NoopSchedulerHooks, ReadOutcome, Result, SchedulerHooks,
    SocketChannelConfig, TransportSocketAddr, ensure_compatible,
};
use spark_transport_oio::{OioSocketChannel, SingleBlockingChannelEventLoop};
use std::{
    io::{Read, Write},
    net::{Ipv4Addr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

fn connected(read_timeout_millis: u64) -> (Arc<dyn Channel>, TcpStream) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
    let addr = TransportSocketAddr::from(listener.local_addr().expect("listener addr"));
    let channel = OioSocketChannel::new(
        SocketChannelConfig::default().with_read_timeout_millis(read_timeout_millis),
    )
    .expect("create channel");
    channel.connect(addr, None).expect("connect");
    let (peer, _) = listener.accept().expect("accept");
    (Arc::new(channel), peer)
}

#[derive(Default)]
struct Callbacks {
    active: AtomicBool,
    inactive: AtomicBool,
    errors: AtomicUsize,
}

struct Echo {
    seen: Arc<Callbacks>,
}

impl InboundHandler for Echo {
    fn on_active(&mut self, channel: &dyn Channel) {
        assert!(channel.is_active());
        self.seen.active.store(true, Ordering::SeqCst);
    }

    fn on_read(&mut self, channel: &dyn Channel, buf: &mut ByteBuffer) {
        channel.write_bytes(buf, false).expect("echo write");
    }

    fn on_error(&mut self, _channel: &dyn Channel, _error: &ChannelError) {
        self.seen.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_inactive(&mut self, channel: &dyn Channel) {
        assert!(!channel.is_open());
        self.seen.inactive.store(true, Ordering::SeqCst);
    }
}

#[test]
fn echoes_until_peer_closes() {
    let (channel, mut peer) = connected(100);
    let seen = Arc::new(Callbacks::default());
    let handle = SingleBlockingChannelEventLoop::new()
        .register(
            Arc::clone(&channel),
            Echo {
                seen: Arc::clone(&seen),
            },
        )
        .expect("register");

    peer.write_all(b"ping").expect("peer write");
    let mut echoed = [0_u8; 4];
    peer.read_exact(&mut echoed).expect("peer read");
    assert_eq!(&echoed, b"ping");

    drop(peer);
    handle.join().expect("loop thread");
    assert!(seen.active.load(Ordering::SeqCst));
    assert!(seen.inactive.load(Ordering::SeqCst));
    assert_eq!(seen.errors.load(Ordering::SeqCst), 0);
    assert!(!channel.is_open());
}

#[test]
fn handle_close_stops_idle_loop() {
    let (channel, _peer) = connected(50);
    let seen = Arc::new(Callbacks::default());
    let handle = SingleBlockingChannelEventLoop::new()
        .register(
            Arc::clone(&channel),
            Echo {
                seen: Arc::clone(&seen),
            },
        )
        .expect("register");
    assert!(Arc::ptr_eq(handle.channel(), &channel));

    handle.close().expect("close");
    handle.join().expect("loop thread");
    assert!(seen.inactive.load(Ordering::SeqCst));
    assert!(!channel.is_active());
}

/// 从不消费缓冲的处理器。
struct Hoarder {
    seen: Arc<Callbacks>,
}

impl InboundHandler for Hoarder {
    fn on_read(&mut self, _channel: &dyn Channel, _buf: &mut ByteBuffer) {}

    fn on_inactive(&mut self, _channel: &dyn Channel) {
        self.seen.inactive.store(true, Ordering::SeqCst);
    }
}

#[test]
fn unconsumed_inbound_buffer_closes_channel() {
    let (channel, mut peer) = connected(1_000);
    let seen = Arc::new(Callbacks::default());
    let handle = SingleBlockingChannelEventLoop::new()
        .with_read_buffer_capacity(4)
        .register(
            Arc::clone(&channel),
            Hoarder {
                seen: Arc::clone(&seen),
            },
        )
        .expect("register");

    peer.write_all(b"more than four bytes").expect("peer write");
    handle.join().expect("loop thread");
    assert!(seen.inactive.load(Ordering::SeqCst));
    assert!(!channel.is_open());
}

/// 读到数据即 panic 的处理器。
struct Faulty {
    seen: Arc<Callbacks>,
}

impl InboundHandler for Faulty {
    fn on_read(&mut self, _channel: &dyn Channel, _buf: &mut ByteBuffer) {
        panic!("handler failure");
    }

    fn on_inactive(&mut self, _channel: &dyn Channel) {
        self.seen.inactive.store(true, Ordering::SeqCst);
    }
}

#[test]
fn panicking_handler_still_closes_channel() {
    let (channel, mut peer) = connected(1_000);
    let seen = Arc::new(Callbacks::default());
    let handle = SingleBlockingChannelEventLoop::new()
        .register(
            Arc::clone(&channel),
            Faulty {
                seen: Arc::clone(&seen),
            },
        )
        .expect("register");

    peer.write_all(b"x").expect("peer write");
    assert!(handle.join().is_err());
    assert!(!channel.is_open());
    assert!(!channel.is_active());
    assert!(!seen.inactive.load(Ordering::SeqCst));

    let mut rest = Vec::new();
    peer.read_to_end(&mut rest).expect("peer observes close");
    assert!(rest.is_empty());
}

#[test]
fn oio_channel_fits_only_thread_per_channel_loops() {
    let channel = OioSocketChannel::new(SocketChannelConfig::default()).expect("create channel");
    for kind in EventLoopKind::ALL {
        let result = ensure_compatible(&channel, kind);
        if kind == EventLoopKind::ThreadPerChannel {
            assert!(result.is_ok());
        } else {
            let err = result.expect_err("incompatible event loop");
            assert!(matches!(err, ChannelError::Configuration { .. }));
            assert!(err.to_string().contains(kind.as_str()));
        }
    }
    assert_eq!(channel.state(), ChannelState::Unbound);
}

/// 只接受多路复用调度器的通道，用于验证闸门先于注册钩子执行。
struct SelectorOnly {
    id: ChannelId,
    config: SocketChannelConfig,
    hooks: NoopSchedulerHooks,
    registered: AtomicBool,
}

impl Channel for SelectorOnly {
    fn kind_name(&self) -> &'static str {
        "selector-only"
    }

    fn id(&self) -> ChannelId {
        self.id
    }

    fn parent(&self) -> Option<Arc<dyn Channel>> {
        None
    }

    fn state(&self) -> ChannelState {
        ChannelState::Unbound
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::READ_BYTES
    }

    fn config(&self) -> &SocketChannelConfig {
        &self.config
    }

    fn is_open(&self) -> bool {
        true
    }

    fn is_active(&self) -> bool {
        false
    }

    fn local_addr(&self) -> Option<TransportSocketAddr> {
        None
    }

    fn remote_addr(&self) -> Option<TransportSocketAddr> {
        None
    }

    fn is_compatible(&self, kind: EventLoopKind) -> bool {
        kind == EventLoopKind::Multiplexed
    }

    fn scheduler_hooks(&self) -> &dyn SchedulerHooks {
        &self.hooks
    }

    fn register(&self) -> Result<()> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn bind(&self, _local: TransportSocketAddr) -> Result<()> {
        Ok(())
    }

    fn connect(
        &self,
        _remote: TransportSocketAddr,
        _local: Option<TransportSocketAddr>,
    ) -> Result<()> {
        Ok(())
    }

    fn finish_connect(&self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn read_bytes(&self, _buf: &mut dyn BufferPort) -> Result<ReadOutcome> {
        Ok(ReadOutcome::NoData)
    }

    fn write_bytes(&self, _buf: &mut dyn BufferPort, _continuation_hint: bool) -> Result<usize> {
        Ok(0)
    }
}

#[test]
fn incompatible_channel_is_rejected_before_registration() {
    let selector_only = Arc::new(SelectorOnly {
        id: ChannelId::next(),
        config: SocketChannelConfig::default(),
        hooks: NoopSchedulerHooks,
        registered: AtomicBool::new(false),
    });
    let seen = Arc::new(Callbacks::default());
    let err = SingleBlockingChannelEventLoop::new()
        .register(selector_only.clone(), Echo { seen })
        .expect_err("gate rejects selector-only channel");
    assert!(matches!(err, ChannelError::Configuration { .. }));
    assert!(!selector_only.registered.load(Ordering::SeqCst));

    let mut out: Vec<Bytes> = Vec::new();
    assert!(matches!(
        selector_only.read_messages(&mut out),
        Err(ChannelError::Unsupported {
            operation: "read_messages",
            channel_kind: "selector-only"
        })
    ));
}
