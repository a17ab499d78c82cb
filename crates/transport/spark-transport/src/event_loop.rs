use std::fmt;

use crate::{Channel, ChannelError, ChannelId, Result};

/// 调度器的执行模型分类。
///
/// # 契约说明（What）
/// - `ThreadPerChannel`：为每个阻塞通道独占一个执行线程；
/// - `Multiplexed`：基于 selector/epoll 的就绪通知模型，要求通道非阻塞；
/// - `Local`：进程内通道（不经过内核套接字）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventLoopKind {
    ThreadPerChannel,
    Multiplexed,
    Local,
}

impl EventLoopKind {
    /// 全部已知的调度器类型。
    pub const ALL: [EventLoopKind; 3] = [
        EventLoopKind::ThreadPerChannel,
        EventLoopKind::Multiplexed,
        EventLoopKind::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventLoopKind::ThreadPerChannel => "thread-per-channel",
            EventLoopKind::Multiplexed => "multiplexed",
            EventLoopKind::Local => "local",
        }
    }
}

impl fmt::Display for EventLoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 调度器的最小外观：只暴露执行模型，注册方式由具体实现决定。
pub trait EventLoop: Send + Sync {
    fn kind(&self) -> EventLoopKind;
}

/// 注册前的兼容性闸门。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 阻塞通道交给多路复用调度器会让 selector 线程卡死在一次读取上；该检查在任何 IO
///   之前快速失败，属于静态类型匹配而非运行期能力协商。
///
/// ## 契约（What）
/// - `channel.is_compatible(kind)` 为真时返回 `Ok(())`；
/// - 否则返回 [`ChannelError::Configuration`]，通道状态不变。
pub fn ensure_compatible(channel: &dyn Channel, kind: EventLoopKind) -> Result<()> {
    if channel.is_compatible(kind) {
        return Ok(());
    }
    Err(ChannelError::configuration(format!(
        "{} {} cannot be registered with a {} event loop",
        channel.kind_name(),
        channel.id(),
        kind
    )))
}

/// 调度器集成策略，按通道实例插拔。
///
/// 就绪驱动的通道在此向 selector 注册兴趣集；阻塞通道使用 [`NoopSchedulerHooks`]。
pub trait SchedulerHooks: Send + Sync {
    fn on_register(&self, channel: ChannelId) -> Result<()>;

    fn on_deregister(&self, channel: ChannelId) -> Result<()>;
}

/// 不做任何事的调度器钩子。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSchedulerHooks;

impl SchedulerHooks for NoopSchedulerHooks {
    fn on_register(&self, _channel: ChannelId) -> Result<()> {
        Ok(())
    }

    fn on_deregister(&self, _channel: ChannelId) -> Result<()> {
        Ok(())
    }
}
