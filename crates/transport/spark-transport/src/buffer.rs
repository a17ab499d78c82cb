use std::io::{self, Read, Write};

use bytes::{Buf, Bytes, BytesMut};

/// 通道与缓冲之间的端口契约。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 阻塞通道不关心缓冲的内存布局，只需要“从源流吸收 N 字节”与“向汇流排出 N 字节”
///   两个动作；把它们抽象为端口，框架可替换为池化缓冲而无需修改通道。
///
/// ## 契约（What）
/// - `absorb_from`：对 `source` 只执行**一次** `read`，最多吸收 `max` 字节，返回实际字节数；
///   源返回 `Ok(0)` 表示流结束；失败时缓冲内容保持不变；
/// - `drain_to`：以一次阻塞 `write_all` 写出恰好 `len` 个可读字节，成功后这些字节被消费；
///   `len` 超过可读字节数时返回 `InvalidInput`；
/// - 端口实例由调用方在每次读写时传入，通道不会跨调用持有它。
pub trait BufferPort {
    /// 当前可读字节数。
    fn readable_bytes(&self) -> usize;

    /// 当前剩余可写容量。
    fn writable_bytes(&self) -> usize;

    /// 从 `source` 吸收至多 `max` 字节。
    fn absorb_from(&mut self, source: &mut dyn Read, max: usize) -> io::Result<usize>;

    /// 将 `len` 个可读字节写入 `sink`。
    fn drain_to(&mut self, sink: &mut dyn Write, len: usize) -> io::Result<()>;
}

/// 基于 `BytesMut` 的默认缓冲实现，带有容量上限。
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    inner: BytesMut,
    max_capacity: usize,
}

impl ByteBuffer {
    /// 默认容量上限：64 KiB。
    pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024;

    /// 创建使用默认上限的空缓冲。
    pub fn new() -> Self {
        Self::with_max_capacity(Self::DEFAULT_MAX_CAPACITY)
    }

    /// 创建指定容量上限的空缓冲。
    pub fn with_max_capacity(max_capacity: usize) -> Self {
        Self {
            inner: BytesMut::new(),
            max_capacity,
        }
    }

    /// 追加字节，超出上限的部分被截断；返回实际追加的字节数。
    pub fn put_slice(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(self.writable_bytes());
        self.inner.extend_from_slice(&src[..len]);
        len
    }

    /// 可读字节视图。
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// 取走全部可读字节。
    pub fn split_readable(&mut self) -> Bytes {
        self.inner.split().freeze()
    }

    /// 丢弃全部可读字节。
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPort for ByteBuffer {
    fn readable_bytes(&self) -> usize {
        self.inner.len()
    }

    fn writable_bytes(&self) -> usize {
        self.max_capacity.saturating_sub(self.inner.len())
    }

    fn absorb_from(&mut self, source: &mut dyn Read, max: usize) -> io::Result<usize> {
        let want = max.min(self.writable_bytes());
        if want == 0 {
            return Ok(0);
        }
        let start = self.inner.len();
        self.inner.resize(start + want, 0);
        match source.read(&mut self.inner[start..]) {
            Ok(read) => {
                self.inner.truncate(start + read);
                Ok(read)
            }
            Err(err) => {
                self.inner.truncate(start);
                Err(err)
            }
        }
    }

    fn drain_to(&mut self, sink: &mut dyn Write, len: usize) -> io::Result<()> {
        if len > self.inner.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot drain {len} bytes, only {} readable", self.inner.len()),
            ));
        }
        sink.write_all(&self.inner[..len])?;
        self.inner.advance(len);
        Ok(())
    }
}
