// Shared configuration
pub mod app_config;

pub use app_config::*;

use std::str::FromStr;
use tracing::warn;

/// 환경 변수 조회 함수 (테스트에서는 HashMap 으로 대체)
/// Source of configuration values
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// 프로세스 환경 변수
/// Process environment
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for std::collections::HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).map(|v| v.to_string())
    }
}

/// 값 파싱 (없으면 기본값, 잘못된 값이면 경고 후 기본값)
/// Parse `key`, falling back to `default` when absent or malformed
pub fn parse_or<T>(source: &dyn ConfigSource, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "invalid configuration value, using default");
                default
            }
        },
    }
}
