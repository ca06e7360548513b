/// ID 생성기
/// ID Generator
///
/// 역할:
/// - 주문 ID, 체결 leg ID 생성
/// - AtomicU64 카운터로 스레드 안전하게 생성
///
/// 초기화:
/// 엔진 시작 시 저장소의 마지막 ID를 읽어와서 초기화
/// (재시작 후에도 ID가 중복되지 않도록)

use std::sync::atomic::{AtomicU64, Ordering};

/// 단조 증가 ID 생성기
/// Monotonic ID generator
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::starting_after(0)
    }
}

impl IdGenerator {
    /// `last_id` 다음부터 발급하는 생성기
    /// Generator that hands out ids after `last_id`
    pub fn starting_after(last_id: u64) -> Self {
        Self {
            next: AtomicU64::new(last_id + 1),
        }
    }

    /// 다음 ID 생성
    /// Generate next ID
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// 재초기화 (엔진 재시작 시)
    /// Reset so that the next id follows `last_id`
    pub fn initialize(&self, last_id: u64) {
        self.next.store(last_id + 1, Ordering::SeqCst);
    }

    /// 현재 ID 값 조회 (디버깅용)
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_continue_after_last() {
        let ids = IdGenerator::starting_after(41);
        assert_eq!(ids.next(), 42);
        assert_eq!(ids.next(), 43);

        ids.initialize(100);
        assert_eq!(ids.current(), 101);
        assert_eq!(ids.next(), 101);
    }
}
