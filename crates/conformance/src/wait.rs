//! 제한 시간이 있는 폴링 대기
//!
//! 모든 대기는 `tokio::time` 기반이며 busy wait 없이 폴링 주기마다
//! 조건을 확인합니다. 데드라인이 지나면 [`WaitOutcome::TimedOut`]을 반환하고,
//! 조건 확인 중 발생한 에러는 즉시 전파됩니다.
//!
//! 조건 확인 호출 자체도 데드라인에 묶입니다. 데드라인까지 돌아오지 않는 확인은
//! 관측 결과가 아니라 [`ConformanceError::Timeout`]입니다.

use std::future::Future;
use std::time::Duration;

use fencecheck_core::types::UnitStatus;
use tokio::time::Instant;
use tracing::debug;

use crate::cluster::ControlPlane;
use crate::error::ConformanceError;

/// 대기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    /// 조건이 만족됨
    Ready(T),
    /// 데드라인까지 조건이 만족되지 않음
    TimedOut,
}

impl<T> WaitOutcome<T> {
    /// 조건이 만족되었는지 확인합니다.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// 제한 시간과 폴링 주기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedWait {
    /// 전체 대기 제한 시간
    pub timeout: Duration,
    /// 조건 확인 주기
    pub poll_interval: Duration,
}

impl BoundedWait {
    /// 새 대기 설정을 생성합니다.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// 조건이 `Some`을 반환할 때까지 폴링합니다.
    ///
    /// 조건은 최소 한 번 확인됩니다. 제한 시간이 0이어도 첫 확인 결과가
    /// 준비되어 있으면 `Ready`를 반환합니다.
    ///
    /// # Errors
    ///
    /// 확인 호출이 데드라인까지 끝나지 않으면 `ConformanceError::Timeout`을 반환합니다.
    pub async fn until<T, F, Fut>(&self, mut check: F) -> Result<WaitOutcome<T>, ConformanceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ConformanceError>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let checked = match tokio::time::timeout(remaining, check()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ConformanceError::Timeout {
                        operation: "wait condition check".to_owned(),
                        waited_ms: duration_ms(self.timeout),
                    });
                }
            };
            if let Some(value) = checked {
                return Ok(WaitOutcome::Ready(value));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }

            let remaining = deadline - now;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// 유닛 상태가 조건을 만족할 때까지 대기합니다.
///
/// 상태 조회 한 번은 `api_timeout`과 남은 대기 시간 중 짧은 쪽에 묶입니다.
pub async fn wait_for_unit<C, P>(
    control_plane: &C,
    domain: &str,
    unit: &str,
    condition: P,
    wait: BoundedWait,
    api_timeout: Duration,
) -> Result<WaitOutcome<UnitStatus>, ConformanceError>
where
    C: ControlPlane,
    P: Fn(&UnitStatus) -> bool,
{
    let condition = &condition;
    let label = format!("get unit {domain}/{unit}");
    let label = label.as_str();
    wait.until(move || async move {
        let status = call_with_timeout(
            label,
            api_timeout,
            control_plane.get_unit(domain, unit),
        )
        .await?;
        debug!(domain, unit, phase = %status.phase, "polled unit status");
        Ok(condition(&status).then_some(status))
    })
    .await
}

/// 단일 컨트롤 플레인 호출을 제한 시간으로 감쌉니다.
///
/// 시간 초과 시 `ConformanceError::Timeout`을 반환합니다. 재시도하지 않습니다.
pub async fn call_with_timeout<T, Fut>(
    operation: &str,
    timeout: Duration,
    call: Fut,
) -> Result<T, ConformanceError>
where
    Fut: Future<Output = Result<T, ConformanceError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ConformanceError::Timeout {
            operation: operation.to_owned(),
            waited_ms: duration_ms(timeout),
        }),
    }
}

/// `Duration`을 밀리초 `u64`로 변환합니다 (포화).
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
