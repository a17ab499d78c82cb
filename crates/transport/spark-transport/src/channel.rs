use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use bytes::Bytes;

use crate::{
    BufferPort, ChannelError, EventLoopKind, Result, SchedulerHooks, SocketChannelConfig,
    TransportSocketAddr,
};

/// 通道的不可变标识。
///
/// 未显式指定时由进程级计数器分配，保证同一进程内唯一。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// 分配下一个进程内唯一的标识。
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// 使用调用方提供的原始值。
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// 通道生命周期状态机。
///
/// # 契约说明（What）
/// - `Unbound`：套接字尚未绑定本地地址；
/// - `Bound`：已绑定本地地址，尚未建连；
/// - `Active`：已建连，可读写；
/// - `Closed`：终态，套接字已释放，任何操作均为惰性。
///
/// 状态只允许单调前进（`Unbound < Bound < Active < Closed`），关闭后不可重开。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ChannelState {
    Unbound = 0,
    Bound = 1,
    Active = 2,
    Closed = 3,
}

impl ChannelState {
    /// 是否为终态。
    pub fn is_terminal(self) -> bool {
        self == ChannelState::Closed
    }

    /// 从原始编码还原状态；越界值视为 `Closed`。
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ChannelState::Unbound,
            1 => ChannelState::Bound,
            2 => ChannelState::Active,
            _ => ChannelState::Closed,
        }
    }
}

bitflags! {
    /// 通道声明的能力集合。
    ///
    /// 框架据此在构造期选择通道变体，而不是依赖继承层次。
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ChannelCapabilities: u8 {
        /// 可绑定本地地址。
        const BIND = 1 << 0;
        /// 可主动建连。
        const CONNECT = 1 << 1;
        /// 支持字节流读取。
        const READ_BYTES = 1 << 2;
        /// 支持字节流写入。
        const WRITE_BYTES = 1 << 3;
        /// 支持面向报文的读取。
        const READ_MESSAGES = 1 << 4;
    }
}

/// 一次读取的结果。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 阻塞通道没有就绪通知，只能以有界超时轮询；把“超时无数据”建模为显式变体，
///   而非借用错误通道表达正常控制流。
///
/// ## 契约（What）
/// - `Data(n)`：读到 `n > 0` 字节；
/// - `NoData`：读超时内没有数据，通道保持打开，调用方可立即再次读取；
/// - `EndOfStream`：对端关闭或通道已关闭，调用方应关闭通道；
/// - 致命错误以 `Err(ChannelError::Read)` 返回。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    NoData,
    EndOfStream,
}

impl ReadOutcome {
    /// 本次读取的字节数，`NoData` 与 `EndOfStream` 均为 0。
    pub fn bytes(&self) -> usize {
        match self {
            ReadOutcome::Data(read) => *read,
            ReadOutcome::NoData | ReadOutcome::EndOfStream => 0,
        }
    }
}

/// `Channel` 抽象单个网络端点的生命周期与字节流读写契约。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 为阻塞与多路复用等不同通道变体提供统一接口，调度器只面向该 trait 编程；
/// - 所有方法取 `&self`：生命周期与 IO 由所属线程驱动，但 `close` 必须能在其他线程
///   并发调用，因此实现需使用内部可变性。
///
/// ## 契约（What）
/// - `bind`/`connect`/`disconnect`/`close` 推进 [`ChannelState`]；
/// - `read_bytes`/`write_bytes` 每次调用接收新的 [`BufferPort`]，实现不得持有；
/// - `register`/`deregister` 委托给 [`SchedulerHooks`] 策略对象；
/// - `finish_connect` 与 `read_messages` 对不支持的变体必须返回
///   [`ChannelError::Unsupported`]，不得静默成功。
pub trait Channel: Send + Sync + 'static {
    /// 通道类型名称，用于日志与错误信息。
    fn kind_name(&self) -> &'static str;

    /// 不可变标识。
    fn id(&self) -> ChannelId;

    /// 父通道（若仍存活）。子通道只持有非拥有引用。
    fn parent(&self) -> Option<Arc<dyn Channel>>;

    /// 当前生命周期状态。
    fn state(&self) -> ChannelState;

    /// 能力集合。
    fn capabilities(&self) -> ChannelCapabilities;

    /// 连接配置。
    fn config(&self) -> &SocketChannelConfig;

    /// 套接字未关闭。
    fn is_open(&self) -> bool;

    /// 套接字未关闭且已建连。
    fn is_active(&self) -> bool;

    /// 本地地址；尚未绑定时为 `None`。
    fn local_addr(&self) -> Option<TransportSocketAddr>;

    /// 对端地址；尚未建连时为 `None`。
    fn remote_addr(&self) -> Option<TransportSocketAddr>;

    /// 静态兼容性检查：该通道能否交由给定类型的调度器管理。
    fn is_compatible(&self, kind: EventLoopKind) -> bool;

    /// 调度器集成策略。
    fn scheduler_hooks(&self) -> &dyn SchedulerHooks;

    /// 调度器接管通道时调用。
    fn register(&self) -> Result<()> {
        self.scheduler_hooks().on_register(self.id())
    }

    /// 调度器释放通道时调用。
    fn deregister(&self) -> Result<()> {
        self.scheduler_hooks().on_deregister(self.id())
    }

    fn bind(&self, local: TransportSocketAddr) -> Result<()>;

    fn connect(
        &self,
        remote: TransportSocketAddr,
        local: Option<TransportSocketAddr>,
    ) -> Result<()>;

    fn finish_connect(&self) -> Result<()>;

    fn disconnect(&self) -> Result<()>;

    /// 幂等关闭，可跨线程调用。
    fn close(&self) -> Result<()>;

    fn read_bytes(&self, buf: &mut dyn BufferPort) -> Result<ReadOutcome>;

    /// 面向报文的读取入口。
    fn read_messages(&self, _out: &mut Vec<Bytes>) -> Result<usize> {
        Err(ChannelError::Unsupported {
            operation: "read_messages",
            channel_kind: self.kind_name(),
        })
    }

    /// 写出缓冲内全部可读字节。`continuation_hint` 表示调用方在仍有剩余数据时会立即再次调用。
    fn write_bytes(&self, buf: &mut dyn BufferPort, continuation_hint: bool) -> Result<usize>;
}
