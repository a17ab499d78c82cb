use crate::{
    error::{CHANNEL_KIND, Operation, is_soft_timeout, map_io_error, unsupported},
    lifecycle::Lifecycle,
    socket::SocketResource,
};
use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, SockAddr, Socket};
use spark_transport::{
    BufferPort, ByteBuffer, Channel, ChannelCapabilities, ChannelError, ChannelId, ChannelState,
    EventLoopKind, NoopSchedulerHooks, ReadOutcome, Result, SchedulerHooks, SocketChannelConfig,
    TransportSocketAddr,
};
use std::{
    fmt, io,
    net::{SocketAddr, TcpStream},
    sync::{Arc, Weak},
};

/// 基于阻塞套接字的通道实现。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让同步阻塞的 TCP 套接字接入面向事件的框架：调度器为每个通道独占一个线程，
///   反复调用 `read_bytes`/`write_bytes`，通道负责把阻塞语义翻译成轮询式契约；
/// - 读操作以配置的读超时为上界，“超时无数据”返回 [`ReadOutcome::NoData`]，
///   线程因此不会被单次停滞的读取永久占用，也能及时响应关闭。
///
/// ## 逻辑 (How)
/// - 套接字由 `SocketResource` 独占持有，首次 `bind`/`connect` 时按地址族惰性创建；
/// - 生命周期由 `Lifecycle` 原子单元推进，谓词 `is_open`/`is_active` 直接读取套接字标志；
/// - 建连同步完成，失败时先 `close` 再返回 [`ChannelError::Connect`]，外部观察不到半连接状态；
/// - 跨线程 `close` 以关闭套接字作为取消原语，阻塞中的读取随之返回 `EndOfStream`。
///
/// ## 契约 (What)
/// - `finish_connect`、`read_messages` 在任何状态下都返回 [`ChannelError::Unsupported`]；
/// - `register`/`deregister` 为无操作；
/// - 仅与 [`EventLoopKind::ThreadPerChannel`] 兼容。
///
/// ## 注意事项 (Trade-offs)
/// - `write_bytes` 一次性阻塞写完全部可读字节，背压完全依赖内核发送缓冲；
/// - 读超时在套接字创建时落地，此后不再随配置变化。
pub struct OioSocketChannel {
    id: ChannelId,
    parent: Option<Weak<dyn Channel>>,
    config: SocketChannelConfig,
    socket: SocketResource,
    lifecycle: Lifecycle,
    hooks: NoopSchedulerHooks,
    outbound: Mutex<ByteBuffer>,
}

impl OioSocketChannel {
    /// 创建尚未绑定的通道；套接字在首次 `bind`/`connect` 时创建。
    pub fn new(config: SocketChannelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(
            None,
            ChannelId::next(),
            SocketResource::vacant(),
            ChannelState::Unbound,
            config,
        ))
    }

    /// 接管已有套接字；若其已建连，通道立即处于 `Active`。
    ///
    /// 初始化失败时返回 [`ChannelError::Initialization`]，套接字随之被释放。
    pub fn from_socket(socket: Socket, config: SocketChannelConfig) -> Result<Self> {
        Self::adopt(None, ChannelId::next(), socket, config)
    }

    /// 接管标准库的 `TcpStream`。
    pub fn from_stream(stream: TcpStream, config: SocketChannelConfig) -> Result<Self> {
        Self::from_socket(Socket::from(stream), config)
    }

    /// 以子通道身份接管套接字（例如监听端接受的连接），只保留对父通道的弱引用。
    pub fn with_parent(
        parent: &Arc<dyn Channel>,
        id: ChannelId,
        socket: Socket,
        config: SocketChannelConfig,
    ) -> Result<Self> {
        Self::adopt(Some(Arc::downgrade(parent)), id, socket, config)
    }

    fn adopt(
        parent: Option<Weak<dyn Channel>>,
        id: ChannelId,
        socket: Socket,
        config: SocketChannelConfig,
    ) -> Result<Self> {
        config.validate()?;
        let resource = SocketResource::adopt(socket, &config)
            .map_err(|err| map_io_error(Operation::Initialize, err))?;
        let state = if resource.is_connected() {
            ChannelState::Active
        } else if resource
            .with_socket(|socket| socket.local_addr())
            .ok()
            .and_then(|addr| addr.as_socket())
            .is_some_and(|addr| addr.port() != 0)
        {
            ChannelState::Bound
        } else {
            ChannelState::Unbound
        };
        Ok(Self::assemble(parent, id, resource, state, config))
    }

    fn assemble(
        parent: Option<Weak<dyn Channel>>,
        id: ChannelId,
        socket: SocketResource,
        state: ChannelState,
        config: SocketChannelConfig,
    ) -> Self {
        let outbound = ByteBuffer::with_max_capacity(config.outbound_buffer_capacity());
        Self {
            id,
            parent,
            config,
            socket,
            lifecycle: Lifecycle::new(state),
            hooks: NoopSchedulerHooks,
            outbound: Mutex::new(outbound),
        }
    }

    /// 将字节暂存到出站缓冲，返回实际暂存的字节数。
    ///
    /// 缓冲上限由 [`SocketChannelConfig::outbound_buffer_capacity`] 决定；超出部分被丢弃并记录
    /// `warn!`，调用方应依据返回值先 `flush` 再暂存剩余字节。
    pub fn stage(&self, bytes: &[u8]) -> usize {
        let mut outbound = self.outbound.lock();
        let staged = outbound.put_slice(bytes);
        if staged < bytes.len() {
            tracing::warn!(
                channel.id = %self.id,
                requested = bytes.len(),
                staged,
                capacity = outbound.max_capacity(),
                "outbound buffer full; excess bytes not staged"
            );
        }
        staged
    }

    /// 出站缓冲中待写出的字节数。
    pub fn pending_outbound(&self) -> usize {
        self.outbound.lock().len()
    }

    /// 将出站缓冲一次性写出。该冲刷从不由调度器驱动，需调用方显式触发。
    pub fn flush(&self) -> Result<usize> {
        let mut outbound = self.outbound.lock();
        self.write_bytes(&mut *outbound, false)
    }

    fn connect0(
        &self,
        remote: TransportSocketAddr,
        local: Option<TransportSocketAddr>,
    ) -> io::Result<()> {
        let remote_addr = SocketAddr::from(remote);
        self.socket
            .ensure_created(Domain::for_address(remote_addr), &self.config)?;

        if let Some(local) = local {
            let local_addr = SockAddr::from(SocketAddr::from(local));
            self.socket.with_socket(|socket| socket.bind(&local_addr))?;
            self.lifecycle.advance(ChannelState::Bound);
        }

        let target = SockAddr::from(remote_addr);
        let timeout = self.config.connect_timeout();
        self.socket.with_socket(|socket| match timeout {
            Some(timeout) => socket.connect_timeout(&target, timeout),
            None => socket.connect(&target),
        })?;
        self.socket.mark_connected();
        self.lifecycle.advance(ChannelState::Active);
        Ok(())
    }
}

impl Channel for OioSocketChannel {
    fn kind_name(&self) -> &'static str {
        CHANNEL_KIND
    }

    fn id(&self) -> ChannelId {
        self.id
    }

    fn parent(&self) -> Option<Arc<dyn Channel>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    fn state(&self) -> ChannelState {
        self.lifecycle.current()
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::BIND
            | ChannelCapabilities::CONNECT
            | ChannelCapabilities::READ_BYTES
            | ChannelCapabilities::WRITE_BYTES
    }

    fn config(&self) -> &SocketChannelConfig {
        &self.config
    }

    fn is_open(&self) -> bool {
        !self.socket.is_closed()
    }

    fn is_active(&self) -> bool {
        self.socket.is_connected()
    }

    fn local_addr(&self) -> Option<TransportSocketAddr> {
        if self.lifecycle.current() == ChannelState::Unbound {
            return None;
        }
        self.socket
            .with_socket(|socket| socket.local_addr())
            .ok()
            .and_then(|addr| addr.as_socket())
            .map(TransportSocketAddr::from)
    }

    fn remote_addr(&self) -> Option<TransportSocketAddr> {
        self.socket
            .with_socket(|socket| socket.peer_addr())
            .ok()
            .and_then(|addr| addr.as_socket())
            .map(TransportSocketAddr::from)
    }

    fn is_compatible(&self, kind: EventLoopKind) -> bool {
        kind == EventLoopKind::ThreadPerChannel
    }

    fn scheduler_hooks(&self) -> &dyn SchedulerHooks {
        &self.hooks
    }

    fn bind(&self, local: TransportSocketAddr) -> Result<()> {
        self.lifecycle.require("bind", &[ChannelState::Unbound])?;
        let addr = SocketAddr::from(local);
        let created = self
            .socket
            .ensure_created(Domain::for_address(addr), &self.config)
            .map_err(|err| map_io_error(Operation::Initialize, err))?;
        if let Err(err) = self
            .socket
            .with_socket(|socket| socket.bind(&SockAddr::from(addr)))
        {
            // 绑定失败不得固化地址族：新建的套接字随之丢弃，通道回到绑定前的状态。
            if created {
                self.socket.discard();
            }
            return Err(map_io_error(Operation::Bind(local), err));
        }
        self.lifecycle.advance(ChannelState::Bound);
        tracing::debug!(channel.id = %self.id, local = %local, "channel bound");
        Ok(())
    }

    fn connect(
        &self,
        remote: TransportSocketAddr,
        local: Option<TransportSocketAddr>,
    ) -> Result<()> {
        self.lifecycle
            .require("connect", &[ChannelState::Unbound, ChannelState::Bound])?;
        match self.connect0(remote, local) {
            Ok(()) => {
                tracing::debug!(channel.id = %self.id, remote = %remote, "channel connected");
                Ok(())
            }
            Err(err) => {
                self.close()?;
                Err(map_io_error(Operation::Connect(remote), err))
            }
        }
    }

    fn finish_connect(&self) -> Result<()> {
        Err(unsupported("finish_connect"))
    }

    fn disconnect(&self) -> Result<()> {
        self.close()
    }

    fn close(&self) -> Result<()> {
        self.lifecycle.advance(ChannelState::Closed);
        if self.socket.release() {
            tracing::debug!(channel.id = %self.id, "channel closed");
        }
        Ok(())
    }

    fn read_bytes(&self, buf: &mut dyn BufferPort) -> Result<ReadOutcome> {
        if self.socket.is_closed() {
            return Ok(ReadOutcome::EndOfStream);
        }
        if !self.socket.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let capacity = buf.writable_bytes();
        if capacity == 0 {
            return Ok(ReadOutcome::NoData);
        }

        let result = self.socket.with_socket(|socket| {
            let mut source: &Socket = socket;
            buf.absorb_from(&mut source, capacity)
        });
        match result {
            Ok(0) => Ok(ReadOutcome::EndOfStream),
            Ok(read) => Ok(ReadOutcome::Data(read)),
            // 另一线程关闭套接字后，阻塞中的读取以错误或 EOF 返回，均视为正常关闭。
            Err(_) if self.socket.is_closed() => Ok(ReadOutcome::EndOfStream),
            Err(err) if is_soft_timeout(&err) || err.kind() == io::ErrorKind::Interrupted => {
                tracing::trace!(channel.id = %self.id, "read timed out without data");
                Ok(ReadOutcome::NoData)
            }
            Err(err) => Err(map_io_error(Operation::Read, err)),
        }
    }

    fn read_messages(&self, _out: &mut Vec<Bytes>) -> Result<usize> {
        Err(unsupported("read_messages"))
    }

    fn write_bytes(&self, buf: &mut dyn BufferPort, _continuation_hint: bool) -> Result<usize> {
        if !self.socket.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let len = buf.readable_bytes();
        if len == 0 {
            return Ok(0);
        }
        self.socket
            .with_socket(|socket| {
                let mut sink: &Socket = socket;
                buf.drain_to(&mut sink, len)
            })
            .map_err(|err| map_io_error(Operation::Write, err))?;
        Ok(len)
    }
}

impl fmt::Debug for OioSocketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OioSocketChannel")
            .field("id", &self.id)
            .field("state", &self.lifecycle.current())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
