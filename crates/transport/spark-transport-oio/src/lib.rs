#![deny(unsafe_code)]
#![doc = "spark-transport-oio: 基于阻塞套接字的通道实现。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：让同步阻塞的 TCP 套接字以轮询式契约接入 `spark-transport`，供每通道独占线程的调度器驱动。"]
#![doc = "- **What**：提供 [`OioSocketChannel`] 与 [`SingleBlockingChannelEventLoop`]；读操作以读超时为上界，超时返回 `ReadOutcome::NoData`。"]
#![doc = "- **How**：套接字选项经 `socket2` 落地；跨线程关闭通过 `shutdown` 唤醒阻塞读取；生命周期以原子状态单调推进。"]

mod channel;
mod error;
mod event_loop;
mod lifecycle;
mod socket;

pub use channel::OioSocketChannel;
pub use event_loop::{BlockingChannelHandle, SingleBlockingChannelEventLoop};
