/// 타이머 권위
/// 라운드 만료와 쿨다운 종료의 판정은 엔진 루프 안에서만 일어난다.
/// 이 태스크는 주기적으로 CheckTimer를 큐에 넣을 뿐이다. 접속한 표시 측은
/// 각자 deadline - now를 렌더링할 뿐 만료를 스스로 판정하지 않는다.
// region:    --- Imports
use crate::engine::service::EngineHandle;
use tokio::time::{interval, Duration};
use tracing::info;

// endregion: --- Imports

// region:    --- Timer Authority

/// 만료 체크 주기
const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub struct TimerAuthority {
    handle: EngineHandle,
}

impl TimerAuthority {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }

    /// 틱 루프 시작
    pub fn start(self) {
        tokio::spawn(async move {
            info!("{:<12} --> 타이머 틱 시작 ({:?} 주기)", "Timer", TICK_INTERVAL);
            let mut ticker = interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                self.handle.check_timer().await;
            }
        });
    }
}

// endregion: --- Timer Authority
