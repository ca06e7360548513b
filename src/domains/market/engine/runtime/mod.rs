// =====================================================
// Runtime - 매칭 엔진 런타임
// =====================================================
// 구조:
// - engine.rs: MatchingEngine (시작/정지, 명령 전달)
// - worker.rs: EngineWorker (호가창 소유, 명령 순차 처리)
// - commands.rs: EngineCommand enum
// - config.rs: EngineConfig (환경 변수)
// =====================================================

pub mod commands;
pub mod config;
pub mod engine;
pub mod worker;

pub use commands::EngineCommand;
pub use config::EngineConfig;
pub use engine::MatchingEngine;
pub use worker::EngineWorker;
