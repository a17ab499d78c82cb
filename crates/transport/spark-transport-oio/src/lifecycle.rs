use spark_transport::{ChannelError, ChannelState};
use std::sync::atomic::{AtomicU8, Ordering};

/// 通道生命周期的原子单元。
///
/// 状态以 `fetch_max` 推进，只会前进不会回退；`Closed` 为吸收态，
/// 跨线程的 `close` 与所属线程上的 `connect` 竞争时，关闭总是胜出。
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn new(initial: ChannelState) -> Self {
        Self {
            state: AtomicU8::new(initial as u8),
        }
    }

    pub(crate) fn current(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 推进到 `next`，返回推进前的状态；若当前状态已在 `next` 之后则保持不变。
    pub(crate) fn advance(&self, next: ChannelState) -> ChannelState {
        ChannelState::from_u8(self.state.fetch_max(next as u8, Ordering::AcqRel))
    }

    /// 校验当前状态是否允许执行 `operation`。
    pub(crate) fn require(
        &self,
        operation: &'static str,
        allowed: &[ChannelState],
    ) -> Result<ChannelState, ChannelError> {
        let state = self.current();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(ChannelError::InvalidState { operation, state })
        }
    }
}
