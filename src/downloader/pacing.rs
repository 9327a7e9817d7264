//! 延迟策略
//!
//! 两类等待：
//! - 下载间隔：每次成功下载后在 `[min, max]` 区间内随机等待，避免固定频率的请求特征
//! - 冷却时间：两个会话之间的固定等待，防止频繁重新登录触发更严格的限流
//!
//! 实际的等待通过 [`Sleeper`] 执行，测试中可替换为只记录不等待的实现。

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// 随机下载间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    min: Duration,
    max: Duration,
}

impl PacingPolicy {
    /// 创建随机区间；`min > max` 时按 `min` 固定等待
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// 固定间隔
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// 不等待
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// 生成下一次等待时长（毫秒精度）
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

/// 调度使用的全部延迟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    /// 会话之间的冷却时间
    pub cooldown: Duration,
    /// 下载间隔
    pub pacing: PacingPolicy,
}

impl DelayPolicy {
    /// 不做任何等待
    pub fn none() -> Self {
        Self {
            cooldown: Duration::ZERO,
            pacing: PacingPolicy::none(),
        }
    }
}

/// 等待的用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// 两次下载之间
    Pacing,
    /// 两个会话之间
    Cooldown,
}

/// 执行等待
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration, kind: DelayKind);
}

/// 基于 tokio 定时器的等待（不可取消）
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, _kind: DelayKind) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
