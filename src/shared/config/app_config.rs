// =====================================================
// AppConfig - 서버 설정
// =====================================================
// .env (dotenv) → 환경 변수 → 기본값 순으로 적용됩니다.
//
// DATABASE_URL 이 없으면 인메모리 저장소로 실행합니다.
// =====================================================

use super::{parse_or, ConfigSource, EnvSource};

/// 서버 설정
/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// PostgreSQL 연결 문자열 (None 이면 MemoryStore)
    pub database_url: Option<String>,
    /// 최대 DB 연결 수
    pub database_max_connections: u32,
    /// 리슨 주소
    pub server_addr: String,
    /// CORS 허용 origin
    pub cors_origin: String,
    /// tracing EnvFilter 지시어
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_source(&EnvSource)
    }

    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self {
            database_url: source.get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(source, "DATABASE_MAX_CONNECTIONS", 10),
            server_addr: source.get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            cors_origin: source.get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string()),
            log_filter: source.get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }
}
