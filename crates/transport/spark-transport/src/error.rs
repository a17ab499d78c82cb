use std::borrow::Cow;
use std::io;

use crate::{ChannelState, TransportSocketAddr};

/// 通道契约统一的返回值别名。
pub type Result<T, E = ChannelError> = std::result::Result<T, E>;

/// 通道操作可能产生的全部错误。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 将“初始化、绑定、建连、读写、误用”等失败路径收敛为一个枚举，调用方可据此决定
///   是否关闭通道，而无需解析错误文本；
/// - 每个变体都有稳定错误码（见 [`ChannelError::code`]），便于日志与告警聚合。
///
/// ## 契约（What）
/// - 读超时**不是**错误：它以 [`ReadOutcome::NoData`](crate::ReadOutcome::NoData) 的形式返回；
/// - `Initialization`、`Connect`、`Read`、`Write` 发生时，通道已经或必须被关闭；
/// - `Bind`、`NotConnected`、`InvalidState`、`Configuration` 不改变通道状态；
/// - `Unsupported` 表示框架误用了通道类型，属于编程错误，禁止静默吞掉。
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// 构造阶段的套接字初始化失败，套接字已被释放。
    #[error("failed to initialize a socket: {source}")]
    Initialization {
        #[source]
        source: io::Error,
    },
    /// 本地地址不可用（占用、协议族不匹配等）。
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: TransportSocketAddr,
        #[source]
        source: io::Error,
    },
    /// 建连失败或超时；错误抛出前通道已关闭。
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: TransportSocketAddr,
        #[source]
        source: io::Error,
    },
    /// 在建连前或关闭后写入。
    #[error("channel is not connected")]
    NotConnected,
    /// 该通道类型结构性地不支持此操作。
    #[error("`{operation}` is not supported by {channel_kind}")]
    Unsupported {
        operation: &'static str,
        channel_kind: &'static str,
    },
    /// 配置非法或调度器与通道不兼容。
    #[error("invalid configuration: {reason}")]
    Configuration { reason: Cow<'static, str> },
    /// 读路径出现致命 IO 错误，调用方需关闭通道。
    #[error("read failed: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    /// 写路径出现致命 IO 错误，调用方需关闭通道。
    #[error("write failed: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    /// 在当前状态下不允许执行该生命周期操作。
    #[error("`{operation}` is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ChannelState,
    },
}

/// 错误的处置分类，驱动调用方的重试、关闭或告警策略。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 换个时机或地址可能成功。
    Retryable,
    /// 重试无意义。
    NonRetryable,
    /// 由超时引起。
    Timeout,
    /// 调用方误用了通道，属于编程错误。
    Misuse,
}

impl ChannelError {
    /// 构造配置错误。
    pub fn configuration(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// 返回稳定错误码，遵循 `spark.transport.<语义>` 约定。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "spark.transport.initialize_failed",
            Self::Bind { .. } => "spark.transport.bind_failed",
            Self::Connect { .. } => "spark.transport.connect_failed",
            Self::NotConnected => "spark.transport.not_connected",
            Self::Unsupported { .. } => "spark.transport.unsupported",
            Self::Configuration { .. } => "spark.transport.configuration",
            Self::Read { .. } => "spark.transport.read_failed",
            Self::Write { .. } => "spark.transport.write_failed",
            Self::InvalidState { .. } => "spark.transport.invalid_state",
        }
    }

    /// 返回结构化分类。
    ///
    /// IO 类错误按底层 `io::ErrorKind` 细分；误用类错误一律归为 [`ErrorCategory::Misuse`]。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Initialization { source }
            | Self::Bind { source, .. }
            | Self::Connect { source, .. }
            | Self::Read { source }
            | Self::Write { source } => categorize_io_error(source),
            Self::NotConnected => ErrorCategory::NonRetryable,
            Self::Unsupported { .. } | Self::InvalidState { .. } => ErrorCategory::Misuse,
            Self::Configuration { .. } => ErrorCategory::NonRetryable,
        }
    }

    /// 指示调用方是否必须关闭通道。
    pub fn requires_close(&self) -> bool {
        matches!(
            self,
            Self::Initialization { .. }
                | Self::Connect { .. }
                | Self::Read { .. }
                | Self::Write { .. }
        )
    }
}

fn categorize_io_error(error: &io::Error) -> ErrorCategory {
    use io::ErrorKind;
    match error.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ErrorCategory::Timeout,
        ErrorKind::Interrupted
        | ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::AddrInUse
        | ErrorKind::AddrNotAvailable
        | ErrorKind::BrokenPipe => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}
