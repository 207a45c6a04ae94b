/// 환경 변수 기반 런타임 설정
// region:    --- Imports
use chrono::Duration;
use std::env;

// endregion: --- Imports

// region:    --- Defaults
/// 입찰자 초기 자본
const DEFAULT_INITIAL_CAPITAL: i64 = 1000;
/// 상품 기본 시작가
const DEFAULT_BASE_PRICE: i64 = 25;
/// 라운드 카운트다운(초) - 입찰이 수락될 때마다 전체 시간으로 재설정
const DEFAULT_ROUND_TIMER_SECS: i64 = 50;
/// 정산 후 쿨다운(초)
const DEFAULT_COOLDOWN_SECS: i64 = 3;
/// 기본 바인드 주소
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

// endregion: --- Defaults

// region:    --- Config

/// 프로세스 전체 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub round_timer_secs: i64,
    pub cooldown_secs: i64,
    pub initial_capital: i64,
    pub base_price: i64,
}

impl Config {
    /// 환경 변수에서 설정 로드 (DATABASE_URL만 필수)
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            round_timer_secs: env_i64("ROUND_TIMER_SECS", DEFAULT_ROUND_TIMER_SECS),
            cooldown_secs: env_i64("COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS),
            initial_capital: env_i64("INITIAL_CAPITAL", DEFAULT_INITIAL_CAPITAL),
            base_price: env_i64("BASE_PRICE", DEFAULT_BASE_PRICE),
        }
    }

    /// 엔진에 전달되는 설정 부분
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            round_timer: Duration::seconds(self.round_timer_secs),
            cooldown: Duration::seconds(self.cooldown_secs),
            initial_capital: self.initial_capital,
            base_price: self.base_price,
        }
    }
}

/// 엔진(라운드/원장) 설정
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub round_timer: Duration,
    pub cooldown: Duration,
    pub initial_capital: i64,
    pub base_price: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_timer: Duration::seconds(DEFAULT_ROUND_TIMER_SECS),
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            base_price: DEFAULT_BASE_PRICE,
        }
    }
}

/// 정수형 환경 변수 파싱 (실패 시 기본값)
fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// endregion: --- Config
