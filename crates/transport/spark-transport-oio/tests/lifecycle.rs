//! 生命周期契约：建连、绑定、关闭与不支持操作在各状态下的表现。

use bytes::Bytes;
use socket2::Socket;
use spark_transport::{
    Channel, ChannelError, ChannelId, ChannelState, SocketChannelConfig, TransportSocketAddr,
};
use spark_transport_oio::OioSocketChannel;
use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener},
    sync::Arc,
};

fn loopback(port: u16) -> TransportSocketAddr {
    TransportSocketAddr::from(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}

fn listener() -> (TcpListener, TransportSocketAddr) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    (listener, TransportSocketAddr::from(addr))
}

fn channel() -> OioSocketChannel {
    OioSocketChannel::new(SocketChannelConfig::default().with_connect_timeout_millis(2_000))
        .expect("create channel")
}

fn assert_unsupported(channel: &OioSocketChannel) {
    let err = channel.finish_connect().expect_err("finish_connect");
    assert!(matches!(
        err,
        ChannelError::Unsupported {
            operation: "finish_connect",
            ..
        }
    ));
    let mut out: Vec<Bytes> = Vec::new();
    let err = channel.read_messages(&mut out).expect_err("read_messages");
    assert!(matches!(
        err,
        ChannelError::Unsupported {
            operation: "read_messages",
            ..
        }
    ));
    assert!(out.is_empty());
}

#[test]
fn connect_to_unreachable_peer_closes_channel() {
    let (listener, addr) = listener();
    drop(listener);

    let channel = channel();
    let err = channel.connect(addr, None).expect_err("connection refused");
    assert!(matches!(err, ChannelError::Connect { addr: a, .. } if a == addr));
    assert!(err.requires_close());
    assert!(!channel.is_open());
    assert!(!channel.is_active());
    assert_eq!(channel.state(), ChannelState::Closed);
}

/// 取得一个当前空闲的回环端口。
fn free_loopback() -> TransportSocketAddr {
    let (reserved, addr) = listener();
    drop(reserved);
    addr
}

#[test]
fn connect_with_local_address_binds_first() {
    let (listener, addr) = listener();
    let local = free_loopback();
    let channel = channel();
    channel
        .connect(addr, Some(local))
        .expect("connect with local bind");
    let (_peer, peer_sees) = listener.accept().expect("accept");

    assert_eq!(channel.state(), ChannelState::Active);
    assert!(channel.is_active());
    assert_eq!(channel.local_addr(), Some(local));
    assert_eq!(TransportSocketAddr::from(peer_sees), local);
    assert_eq!(channel.remote_addr(), Some(addr));
}

#[test]
fn adopted_stream_is_active_immediately() {
    let (listener, addr) = listener();
    let stream = std::net::TcpStream::connect(SocketAddr::from(addr)).expect("connect");
    let _peer = listener.accept().expect("accept");

    let channel =
        OioSocketChannel::from_stream(stream, SocketChannelConfig::default()).expect("adopt");
    assert_eq!(channel.state(), ChannelState::Active);
    assert!(channel.is_open());
    assert!(channel.is_active());
    assert_eq!(channel.remote_addr(), Some(addr));
}

#[test]
fn close_is_idempotent() {
    let (listener, addr) = listener();
    let channel = channel();
    channel.connect(addr, None).expect("connect");
    let _peer = listener.accept().expect("accept");

    channel.close().expect("first close");
    channel.close().expect("second close");
    channel.disconnect().expect("disconnect after close");
    assert!(!channel.is_open());
    assert!(!channel.is_active());
    assert_eq!(channel.remote_addr(), None);
}

#[test]
fn bind_to_address_in_use_keeps_channel_unbound() {
    let (_listener, addr) = listener();
    let channel = channel();
    let err = channel.bind(addr).expect_err("address in use");
    assert!(matches!(err, ChannelError::Bind { addr: a, .. } if a == addr));
    assert_eq!(channel.state(), ChannelState::Unbound);
    assert!(channel.is_open());
}

#[test]
fn failed_bind_does_not_pin_address_family() {
    let Ok(v6_listener) = TcpListener::bind((Ipv6Addr::LOCALHOST, 0)) else {
        // 环境未启用 IPv6 回环。
        return;
    };
    let v6_addr = TransportSocketAddr::from(v6_listener.local_addr().expect("listener addr"));
    let (_busy, busy_addr) = listener();

    let channel = channel();
    channel.bind(busy_addr).expect_err("address in use");
    assert_eq!(channel.state(), ChannelState::Unbound);
    assert_eq!(channel.local_addr(), None);

    channel
        .connect(v6_addr, None)
        .expect("connect over the other address family");
    let _peer = v6_listener.accept().expect("accept");
    assert!(channel.is_active());
    assert_eq!(channel.remote_addr(), Some(v6_addr));
}

#[test]
fn bind_is_accepted_only_once() {
    let channel = channel();
    channel.bind(loopback(0)).expect("bind");
    assert_eq!(channel.state(), ChannelState::Bound);
    assert!(channel.local_addr().is_some_and(|addr| addr.port() != 0));

    let err = channel.bind(loopback(0)).expect_err("second bind");
    assert!(matches!(
        err,
        ChannelError::InvalidState {
            operation: "bind",
            state: ChannelState::Bound
        }
    ));
}

#[test]
fn closed_channel_rejects_connect() {
    let (_listener, addr) = listener();
    let channel = channel();
    channel.close().expect("close");
    let err = channel.connect(addr, None).expect_err("connect after close");
    assert!(matches!(
        err,
        ChannelError::InvalidState {
            operation: "connect",
            state: ChannelState::Closed
        }
    ));
}

#[test]
fn unsupported_operations_fail_in_every_state() {
    let unbound = channel();
    assert_unsupported(&unbound);

    let bound = channel();
    bound.bind(loopback(0)).expect("bind");
    assert_unsupported(&bound);

    let (listener, addr) = listener();
    let active = channel();
    active.connect(addr, None).expect("connect");
    let _peer = listener.accept().expect("accept");
    assert_unsupported(&active);

    active.close().expect("close");
    assert_unsupported(&active);
}

#[test]
fn child_channel_holds_weak_parent() {
    let parent: Arc<dyn Channel> = Arc::new(channel());
    let (listener, addr) = listener();
    let _client = std::net::TcpStream::connect(SocketAddr::from(addr)).expect("connect");
    let (accepted, _) = listener.accept().expect("accept");

    let child = OioSocketChannel::with_parent(
        &parent,
        ChannelId::from_raw(7),
        Socket::from(accepted),
        SocketChannelConfig::default(),
    )
    .expect("adopt accepted socket");
    assert_eq!(child.id(), ChannelId::from_raw(7));
    assert!(child.is_active());
    assert_eq!(child.parent().map(|p| p.id()), Some(parent.id()));

    drop(parent);
    assert!(child.parent().is_none());
}
