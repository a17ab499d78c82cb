use std::fmt;
use std::net::{Ipv6Addr, SocketAddr};

/// `TransportSocketAddr` 为所有通道实现提供统一的 Socket 地址表达。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - **统一抽象**：阻塞与多路复用通道共享同一地址类型，避免调用方在契约层直接依赖
///   `std::net::SocketAddr` 或 `socket2::SockAddr`。
/// - **可扩展性**：保留 `non_exhaustive`，为 Unix Domain Socket 等变体预留空间。
///
/// ## 合同（What）
/// - `V4` 与 `V6` 分别表示 IPv4/IPv6；
/// - `Display` 输出稳定字符串，适合作为日志字段；
/// - 与 `SocketAddr` 之间的转换是无损的（IPv6 的 flowinfo/scope_id 除外）。
///
/// ## 设计权衡（Trade-offs）
/// - IPv6 未做零压缩，优先保障可读性。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum TransportSocketAddr {
    /// IPv4 地址。
    V4 { addr: [u8; 4], port: u16 },
    /// IPv6 地址。
    V6 { addr: [u16; 8], port: u16 },
}

impl TransportSocketAddr {
    /// 返回端口号。
    pub fn port(&self) -> u16 {
        match self {
            Self::V4 { port, .. } | Self::V6 { port, .. } => *port,
        }
    }

    /// 是否为 IPv4 地址。
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Self::V4 { .. })
    }

    /// 将 IPv6 地址从 8 段转换为 `Ipv6Addr`；IPv4 返回 `None`。
    pub fn as_ipv6_addr(&self) -> Option<Ipv6Addr> {
        match self {
            Self::V6 { addr, .. } => Some(Ipv6Addr::from(*addr)),
            _ => None,
        }
    }
}

impl fmt::Display for TransportSocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSocketAddr::V4 { addr, port } => write!(
                f,
                "{}.{}.{}.{}:{}",
                addr[0], addr[1], addr[2], addr[3], port
            ),
            TransportSocketAddr::V6 { addr, port } => {
                let segments: Vec<String> = addr
                    .iter()
                    .map(|segment| format!("{:x}", segment))
                    .collect();
                write!(f, "[{}]:{}", segments.join(":"), port)
            }
        }
    }
}

impl From<SocketAddr> for TransportSocketAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::V4 {
                addr: v4.ip().octets(),
                port: v4.port(),
            },
            SocketAddr::V6(v6) => Self::V6 {
                addr: v6.ip().segments(),
                port: v6.port(),
            },
        }
    }
}

impl From<TransportSocketAddr> for SocketAddr {
    fn from(addr: TransportSocketAddr) -> Self {
        match addr {
            TransportSocketAddr::V4 { addr, port } => SocketAddr::from((addr, port)),
            TransportSocketAddr::V6 { addr, port } => {
                SocketAddr::from((Ipv6Addr::from(addr), port))
            }
        }
    }
}
