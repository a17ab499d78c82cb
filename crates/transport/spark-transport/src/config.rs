use std::time::Duration;

use serde::Deserialize;

use crate::{ChannelError, Result};

const DEFAULT_CONNECT_TIMEOUT_MILLIS: u64 = 30_000;
const DEFAULT_READ_TIMEOUT_MILLIS: u64 = 1_000;
const DEFAULT_OUTBOUND_BUFFER_CAPACITY: usize = 64 * 1024;

/// 套接字通道的只读配置视图。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 将建连超时、读超时与常用套接字选项集中在一个不可变结构里，通道只读取、从不修改；
/// - 读超时默认 1 秒，是阻塞通道“以超时代替就绪通知”的轮询粒度，作为可配置的默认值
///   而非硬编码常量暴露给部署方。
///
/// ## 契约（What）
/// - `connect_timeout_millis`：每次 `connect` 读取一次；`0` 表示不设上限，由操作系统决定；
/// - `read_timeout_millis`：在套接字初始化时落地，此后在套接字生命周期内不变；不允许为 `0`；
/// - `outbound_buffer_capacity`：出站暂存缓冲上限（默认 64 KiB），不允许为 `0`；
/// - 其余字段为可选套接字选项，`None` 表示沿用内核默认值；
/// - `from_toml_str`：缺省键取默认值，未知键与非法值返回 [`ChannelError::Configuration`]。
///
/// ## 设计取舍（Trade-offs）
/// - `linger` 在 Linux 上按秒取整，毫秒级配置仅在部分平台精确生效。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketChannelConfig {
    connect_timeout_millis: u64,
    read_timeout_millis: u64,
    tcp_nodelay: Option<bool>,
    keep_alive: Option<bool>,
    reuse_address: Option<bool>,
    send_buffer_size: Option<usize>,
    receive_buffer_size: Option<usize>,
    linger_millis: Option<u64>,
    outbound_buffer_capacity: usize,
}

impl Default for SocketChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_millis: DEFAULT_CONNECT_TIMEOUT_MILLIS,
            read_timeout_millis: DEFAULT_READ_TIMEOUT_MILLIS,
            tcp_nodelay: None,
            keep_alive: None,
            reuse_address: None,
            send_buffer_size: None,
            receive_buffer_size: None,
            linger_millis: None,
            outbound_buffer_capacity: DEFAULT_OUTBOUND_BUFFER_CAPACITY,
        }
    }
}

impl SocketChannelConfig {
    /// 等价于 [`Default::default`]。
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文本解析配置并校验。
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|err| ChannelError::configuration(format!("malformed socket config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值。
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_millis == 0 {
            return Err(ChannelError::configuration(
                "read_timeout_millis must be greater than zero",
            ));
        }
        if self.outbound_buffer_capacity == 0 {
            return Err(ChannelError::configuration(
                "outbound_buffer_capacity must be greater than zero",
            ));
        }
        if self.send_buffer_size == Some(0) || self.receive_buffer_size == Some(0) {
            return Err(ChannelError::configuration(
                "socket buffer sizes must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn with_connect_timeout_millis(mut self, millis: u64) -> Self {
        self.connect_timeout_millis = millis;
        self
    }

    pub fn with_read_timeout_millis(mut self, millis: u64) -> Self {
        self.read_timeout_millis = millis;
        self
    }

    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = Some(enabled);
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = Some(enabled);
        self
    }

    pub fn with_reuse_address(mut self, enabled: bool) -> Self {
        self.reuse_address = Some(enabled);
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = Some(size);
        self
    }

    /// 设置 `SO_LINGER`；`None` 沿用内核默认。
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger_millis =
            linger.map(|value| u64::try_from(value.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// 出站暂存缓冲的容量上限。
    pub fn with_outbound_buffer_capacity(mut self, capacity: usize) -> Self {
        self.outbound_buffer_capacity = capacity;
        self
    }

    pub fn connect_timeout_millis(&self) -> u64 {
        self.connect_timeout_millis
    }

    pub fn read_timeout_millis(&self) -> u64 {
        self.read_timeout_millis
    }

    /// 建连超时；`None` 表示不设上限。
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_millis {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_millis)
    }

    pub fn tcp_nodelay(&self) -> Option<bool> {
        self.tcp_nodelay
    }

    pub fn keep_alive(&self) -> Option<bool> {
        self.keep_alive
    }

    pub fn reuse_address(&self) -> Option<bool> {
        self.reuse_address
    }

    pub fn send_buffer_size(&self) -> Option<usize> {
        self.send_buffer_size
    }

    pub fn receive_buffer_size(&self) -> Option<usize> {
        self.receive_buffer_size
    }

    pub fn linger(&self) -> Option<Duration> {
        self.linger_millis.map(Duration::from_millis)
    }

    pub fn outbound_buffer_capacity(&self) -> usize {
        self.outbound_buffer_capacity
    }
}
