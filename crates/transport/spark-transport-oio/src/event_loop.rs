use spark_transport::{
    BufferPort, ByteBuffer, Channel, ChannelError, EventLoop, EventLoopKind, InboundHandler,
    ReadOutcome, Result, ensure_compatible,
};
use std::{
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
};

const DEFAULT_THREAD_NAME_PREFIX: &str = "spark-oio";

/// 为每个阻塞通道独占一个线程的调度器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 阻塞通道没有就绪通知，只能由专属线程反复调用 `read_bytes`；读超时把“无数据”
///   转换为可重试的 `NoData`，线程因此能在停滞的连接上周期性醒来并响应关闭；
///
/// ## 逻辑 (How)
/// - `register` 先经过兼容性闸门，再调用通道的 `register` 钩子，随后启动命名线程；
/// - 线程循环：`Data` → `on_read`，`NoData` → 继续轮询，`EndOfStream` → 退出，
///   `Err` → `on_error` 后退出；退出时依次执行 `close`、`deregister`、`on_inactive`；
/// - 收尾放在 drop 守卫中，处理器 panic 时通道同样被关闭（此时跳过 `on_inactive`）。
///
/// ## 契约 (What)
/// - 与非 `ThreadPerChannel` 通道注册时返回 [`ChannelError::Configuration`]，且不会启动线程；
/// - 返回的 [`BlockingChannelHandle`] 可在任意线程调用 `close`。
///
/// ## 注意事项 (Trade-offs)
/// - 处理器若不消费入站缓冲，缓冲写满后线程会关闭通道，而不是空转。
#[derive(Clone, Debug)]
pub struct SingleBlockingChannelEventLoop {
    thread_name_prefix: String,
    read_buffer_capacity: usize,
}

impl Default for SingleBlockingChannelEventLoop {
    fn default() -> Self {
        Self {
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_owned(),
            read_buffer_capacity: ByteBuffer::DEFAULT_MAX_CAPACITY,
        }
    }
}

impl EventLoop for SingleBlockingChannelEventLoop {
    fn kind(&self) -> EventLoopKind {
        EventLoopKind::ThreadPerChannel
    }
}

impl SingleBlockingChannelEventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.read_buffer_capacity = capacity;
        self
    }

    /// 接管通道并启动其专属线程。
    pub fn register<H>(&self, channel: Arc<dyn Channel>, handler: H) -> Result<BlockingChannelHandle>
    where
        H: InboundHandler,
    {
        ensure_compatible(channel.as_ref(), self.kind())?;
        channel.register()?;

        let worker = Arc::clone(&channel);
        let capacity = self.read_buffer_capacity;
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.thread_name_prefix, channel.id()))
            .spawn(move || drive(worker, handler, capacity));
        let join = match spawned {
            Ok(join) => join,
            Err(source) => {
                channel.close()?;
                channel.deregister()?;
                return Err(ChannelError::Initialization { source });
            }
        };
        tracing::debug!(channel.id = %channel.id(), "channel registered with blocking event loop");
        Ok(BlockingChannelHandle { channel, join })
    }
}

/// 已注册通道的句柄。
pub struct BlockingChannelHandle {
    channel: Arc<dyn Channel>,
    join: JoinHandle<()>,
}

impl BlockingChannelHandle {
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// 跨线程关闭通道；专属线程会在阻塞读取返回后退出。
    pub fn close(&self) -> Result<()> {
        self.channel.close()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 等待专属线程退出；处理器 panic 时返回其负载。
    pub fn join(self) -> thread::Result<()> {
        self.join.join()
    }
}

impl fmt::Debug for BlockingChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingChannelHandle")
            .field("channel", &self.channel.id())
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

/// 专属线程的收尾守卫：无论循环正常退出还是处理器 panic，通道都会被关闭并注销。
struct Teardown<H: InboundHandler> {
    channel: Arc<dyn Channel>,
    handler: H,
}

impl<H: InboundHandler> Drop for Teardown<H> {
    fn drop(&mut self) {
        if let Err(err) = self.channel.close() {
            tracing::warn!(error = %err, "failed to close channel");
        }
        if let Err(err) = self.channel.deregister() {
            tracing::warn!(error = %err, "failed to deregister channel");
        }
        // 处理器已在 panic 中，再次回调可能二次 panic 导致进程中止。
        if thread::panicking() {
            tracing::warn!("inbound handler panicked; channel closed without on_inactive");
        } else {
            self.handler.on_inactive(self.channel.as_ref());
        }
    }
}

fn drive<H: InboundHandler>(channel: Arc<dyn Channel>, handler: H, capacity: usize) {
    let span = tracing::debug_span!("oio_channel_loop", channel.id = %channel.id());
    let _entered = span.enter();

    let mut guard = Teardown { channel, handler };
    guard.handler.on_active(guard.channel.as_ref());
    let mut buf = ByteBuffer::with_max_capacity(capacity);
    while guard.channel.is_open() {
        if buf.writable_bytes() == 0 {
            tracing::warn!(
                capacity,
                "inbound buffer exhausted without being consumed; closing channel"
            );
            break;
        }
        match guard.channel.read_bytes(&mut buf) {
            Ok(ReadOutcome::Data(read)) => {
                tracing::trace!(read, "inbound bytes");
                guard.handler.on_read(guard.channel.as_ref(), &mut buf);
            }
            Ok(ReadOutcome::NoData) => continue,
            Ok(ReadOutcome::EndOfStream) => break,
            Err(err) => {
                tracing::debug!(error = %err, code = err.code(), "read loop aborted");
                guard.handler.on_error(guard.channel.as_ref(), &err);
                break;
            }
        }
    }
}
