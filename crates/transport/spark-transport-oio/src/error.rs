use spark_transport::{ChannelError, TransportSocketAddr};
use std::io;

/// 日志与错误信息中使用的通道类型名称。
pub(crate) const CHANNEL_KIND: &str = "oio socket channel";

/// 描述一次失败的底层操作，决定映射出的 [`ChannelError`] 变体。
#[derive(Clone, Copy, Debug)]
pub(crate) enum Operation {
    Initialize,
    Bind(TransportSocketAddr),
    Connect(TransportSocketAddr),
    Read,
    Write,
}

impl Operation {
    fn message(self) -> &'static str {
        match self {
            Operation::Initialize => "oio initialize",
            Operation::Bind(_) => "oio bind",
            Operation::Connect(_) => "oio connect",
            Operation::Read => "oio read",
            Operation::Write => "oio write",
        }
    }
}

/// 将 IO 错误映射为通道错误，并在 `debug` 级别记录一次。
pub(crate) fn map_io_error(op: Operation, error: io::Error) -> ChannelError {
    tracing::debug!(operation = op.message(), error = %error, "socket operation failed");
    match op {
        Operation::Initialize => ChannelError::Initialization { source: error },
        Operation::Bind(addr) => ChannelError::Bind {
            addr,
            source: error,
        },
        Operation::Connect(addr) => ChannelError::Connect {
            addr,
            source: error,
        },
        Operation::Read => ChannelError::Read { source: error },
        Operation::Write => ChannelError::Write { source: error },
    }
}

/// 构造“不支持的操作”错误。
pub(crate) fn unsupported(operation: &'static str) -> ChannelError {
    ChannelError::Unsupported {
        operation,
        channel_kind: CHANNEL_KIND,
    }
}

/// 读超时在不同平台上表现为 `WouldBlock`（Unix 的 `EAGAIN`）或 `TimedOut`（Windows）。
pub(crate) fn is_soft_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// 套接字已被释放时返回给 IO 调用方的错误。
pub(crate) fn closed_socket() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket is closed")
}
