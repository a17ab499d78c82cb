#![deny(unsafe_code)]
#![doc = "spark-transport: 通道生命周期与字节流读写的统一契约。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：让阻塞（OIO）与多路复用等通道变体共享同一套生命周期、缓冲端口与调度器兼容性契约，调度器只面向 trait 编程。"]
#![doc = "- **What**：定义 `Channel`、`BufferPort`、`SocketChannelConfig`、`EventLoopKind`、`SchedulerHooks`、`InboundHandler` 与 `ChannelError`，并提供 `TransportSocketAddr`。"]
#![doc = "- **How**：本 crate 不包含任何套接字代码，具体实现（如 `spark-transport-oio`）仅依赖本 crate 即可接入调度器。"]

pub mod addr;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod handler;

pub use addr::TransportSocketAddr;
pub use buffer::{BufferPort, ByteBuffer};
pub use channel::{Channel, ChannelCapabilities, ChannelId, ChannelState, ReadOutcome};
pub use config::SocketChannelConfig;
pub use error::{ChannelError, ErrorCategory, Result};
pub use event_loop::{
    EventLoop, EventLoopKind, NoopSchedulerHooks, SchedulerHooks, ensure_compatible,
};
pub use handler::InboundHandler;
