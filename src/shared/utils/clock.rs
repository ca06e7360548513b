// =====================================================
// Clock - 시간 소스
// =====================================================
// created_at (가격-시간 우선순위) 과 updated_at 에 사용합니다.
// 테스트에서는 ManualClock 으로 시간을 직접 제어합니다.
// =====================================================

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// 시간 소스
/// Timestamp source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동 시계 (테스트용)
/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    /// now() 호출마다 자동으로 더할 시간
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, Duration::zero())
    }

    /// now() 를 호출할 때마다 `step` 만큼 전진하는 시계
    /// Clock that advances by `step` after every reading
    pub fn with_step(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock();
        let current = *now;
        *now = current + self.step;
        current
    }
}
