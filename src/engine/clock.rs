// ==========================================
// UMKM 餐饮经营自动化 - 时钟抽象
// ==========================================
// 职责: 为引擎/事件总线提供可替换的“当前时间”与延迟等待
// 说明: 生产环境用本地时间；测试用 ManualClock 推进虚拟时间
// ==========================================

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use std::sync::Mutex;

#[async_trait]
pub trait Clock: Send + Sync {
    /// 当前本地时间
    fn now(&self) -> NaiveDateTime;

    /// 等待直到 deadline（已过期则立即返回）
    async fn sleep_until(&self, deadline: NaiveDateTime);
}

// ==========================================
// SystemClock
// ==========================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep_until(&self, deadline: NaiveDateTime) {
        let remaining = deadline - self.now();
        if let Ok(std_dur) = remaining.to_std() {
            tokio::time::sleep(std_dur).await;
        }
    }
}

// ==========================================
// ManualClock
// ==========================================

/// 手动推进的虚拟时钟
///
/// sleep_until 直接把虚拟时间跳到 deadline（不真实等待），
/// 因此延迟事件在测试中会“立即到期”
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn sleep_until(&self, deadline: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            if *now < deadline {
                *now = deadline;
            }
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_manual_clock_jumps_to_deadline() {
        let clock = ManualClock::new(start());
        clock.sleep_until(start() + ChronoDuration::seconds(5)).await;
        assert_eq!(clock.now(), start() + ChronoDuration::seconds(5));

        // 过去的 deadline 不回拨
        clock.sleep_until(start()).await;
        assert_eq!(clock.now(), start() + ChronoDuration::seconds(5));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(start());
        clock.advance(ChronoDuration::hours(2));
        assert_eq!(clock.now(), start() + ChronoDuration::hours(2));
    }
}
