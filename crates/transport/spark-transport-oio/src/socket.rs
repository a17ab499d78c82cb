use crate::error::closed_socket;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use spark_transport::SocketChannelConfig;
use std::{
    io,
    net::Shutdown,
    sync::atomic::{AtomicBool, Ordering},
};

/// 通道独占的阻塞套接字句柄。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 阻塞通道的全部 IO 都在所属线程上执行，唯一的跨线程操作是 `release`；
///   句柄需要保证“关闭即取消”：另一个线程关闭套接字时，阻塞中的读取必须被唤醒；
/// - 套接字只有一个逻辑所有者，不使用引用计数，释放动作显式且幂等。
///
/// ## 逻辑 (How)
/// - `slot` 以读写锁保护：阻塞 IO 在**读锁**下执行，因此 `release` 可以同时拿到读锁
///   调用 `shutdown(Both)` 唤醒阻塞的 `recv`；
/// - 随后 `release` 获取**写锁**，等待在途调用返回后再丢弃 `Socket`，文件描述符不会在
///   仍被使用时被内核复用；
/// - `closed`/`connected` 两个原子标志承载谓词判断，查询无需加锁。
///
/// ## 契约 (What)
/// - `ensure_created`：首次绑定或建连时按地址族惰性创建套接字，并落地配置中的选项；
/// - `with_socket`：在共享访问下执行一次操作；套接字缺失或已关闭时返回 `NotConnected`；
/// - `release`：首次调用返回 `true` 并释放资源，之后的调用均为无操作并返回 `false`。
///
/// ## 注意事项 (Trade-offs)
/// - 建连也在读锁下进行，跨线程 `release` 会在 `shutdown` 后等待建连返回（最长为建连超时）
///   才真正丢弃描述符。
#[derive(Debug)]
pub(crate) struct SocketResource {
    slot: RwLock<Option<Socket>>,
    closed: AtomicBool,
    connected: AtomicBool,
}

impl SocketResource {
    /// 尚未创建套接字的空句柄。
    pub(crate) fn vacant() -> Self {
        Self {
            slot: RwLock::new(None),
            closed: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }
    }

    /// 接管调用方提供的套接字并落地配置；失败时套接字随 `socket` 一并被丢弃。
    pub(crate) fn adopt(socket: Socket, config: &SocketChannelConfig) -> io::Result<Self> {
        socket.set_nonblocking(false)?;
        apply_options(&socket, config)?;
        let connected = socket.peer_addr().is_ok();
        Ok(Self {
            slot: RwLock::new(Some(socket)),
            closed: AtomicBool::new(false),
            connected: AtomicBool::new(connected),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 已建连且未关闭，即输入/输出流可用。
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.is_closed()
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// 若尚无套接字，则以 `domain` 创建一个 TCP 套接字并应用配置；返回本次是否新建。
    pub(crate) fn ensure_created(
        &self,
        domain: Domain,
        config: &SocketChannelConfig,
    ) -> io::Result<bool> {
        let mut slot = self.slot.write();
        if self.is_closed() {
            return Err(closed_socket());
        }
        if slot.is_some() {
            return Ok(false);
        }
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        apply_options(&socket, config)?;
        *slot = Some(socket);
        Ok(true)
    }

    /// 丢弃尚未绑定的套接字，句柄回到空置状态；下一次绑定或建连可按新的地址族重建。
    pub(crate) fn discard(&self) {
        if !self.is_closed() {
            drop(self.slot.write().take());
        }
    }

    /// 在共享访问下对套接字执行 `op`。
    pub(crate) fn with_socket<R>(&self, op: impl FnOnce(&Socket) -> io::Result<R>) -> io::Result<R> {
        let slot = self.slot.read();
        match slot.as_ref() {
            Some(socket) if !self.is_closed() => op(socket),
            _ => Err(closed_socket()),
        }
    }

    /// 幂等释放。
    pub(crate) fn release(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.connected.store(false, Ordering::Release);

        if let Some(socket) = self.slot.read().as_ref()
            && let Err(err) = socket.shutdown(Shutdown::Both)
            && err.kind() != io::ErrorKind::NotConnected
        {
            tracing::warn!(error = %err, "failed to shut down socket during close");
        }
        drop(self.slot.write().take());
        true
    }
}

fn apply_options(socket: &Socket, config: &SocketChannelConfig) -> io::Result<()> {
    socket.set_read_timeout(Some(config.read_timeout()))?;
    if let Some(enabled) = config.tcp_nodelay() {
        socket.set_tcp_nodelay(enabled)?;
    }
    if let Some(enabled) = config.keep_alive() {
        socket.set_keepalive(enabled)?;
    }
    if let Some(enabled) = config.reuse_address() {
        socket.set_reuse_address(enabled)?;
    }
    if let Some(size) = config.send_buffer_size() {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = config.receive_buffer_size() {
        socket.set_recv_buffer_size(size)?;
    }
    if config.linger().is_some() {
        socket.set_linger(config.linger())?;
    }
    Ok(())
}
