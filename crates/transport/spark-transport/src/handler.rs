use crate::{ByteBuffer, Channel, ChannelError};

/// 入站处理器：通道与流水线之间的边界。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 调度器读到字节后只需把缓冲交给处理器，流水线的组装与解码不属于通道职责；
///
/// ## 契约（What）
/// - `on_active`：调度器开始驱动通道前调用一次；
/// - `on_read`：每次读到数据调用；处理器应消费 `buf` 中它关心的字节，未消费的字节
///   保留到下一次读取；可通过 `channel` 回写；
/// - `on_error`：致命读错误，调用后通道随即被关闭；
/// - `on_inactive`：通道关闭并注销后调用一次。
///
/// ## 注意事项（Trade-offs）
/// - 所有回调都在通道专属线程上执行，回调内的阻塞会直接延迟下一次读取。
pub trait InboundHandler: Send + 'static {
    fn on_active(&mut self, _channel: &dyn Channel) {}

    fn on_read(&mut self, channel: &dyn Channel, buf: &mut ByteBuffer);

    fn on_error(&mut self, _channel: &dyn Channel, _error: &ChannelError) {}

    fn on_inactive(&mut self, _channel: &dyn Channel) {}
}
