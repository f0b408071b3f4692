//! 프로브 프로토콜 -- 일회성 연결 시도 유닛으로 연결 가능 여부 관측
//!
//! 프로브는 두 단계로 결과를 읽습니다.
//!
//! 1. 유닛이 종료 단계(`Succeeded`/`Failed`)에 도달할 때까지 대기
//! 2. 종료 상태 확인: `Succeeded`(종료 코드 0)면 `Connected`, 그 외는 `NotConnected`
//!
//! 1단계에서 제한 시간이 지나면 [`DenyTimeout`] 설정에 따라 해석합니다.
//! 거부를 기대한 프로브이고 `ObservedDeny`라면 `NotConnected`로 보고,
//! 그 외에는 [`ConformanceError::ProbeTimeout`]을 반환합니다.
//!
//! `Unknown` 단계(노드 유실 등)는 종료로 보지 않습니다. 데드라인까지 `Unknown`이
//! 관측되었다면 설정과 무관하게 인프라 에러입니다.
//!
//! 프로브 유닛은 결과를 읽은 직후 삭제됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fencecheck_core::metrics as m;
use fencecheck_core::types::{ProbeResult, UnitPhase, Verdict};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cluster::ControlPlane;
use crate::config::DenyTimeout;
use crate::error::ConformanceError;
use crate::ledger::ResourceLedger;
use crate::provisioner::Provisioner;
use crate::wait::{BoundedWait, WaitOutcome, duration_ms, wait_for_unit};

/// 프로브 대상
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    /// 프로브 유닛을 만들 도메인
    pub domain: &'a str,
    /// 프로브 유닛 이름 (도메인 내에서 고유)
    pub unit: &'a str,
    /// 클라이언트 이름 (`pod-name` 라벨 값)
    pub client: &'a str,
    /// 목적지 주소
    pub address: &'a str,
    /// 목적지 포트
    pub port: u16,
}

/// 프로브 실행기
pub struct Prober<C: ControlPlane> {
    /// 컨트롤 플레인
    control_plane: Arc<C>,
    /// 프로브 유닛 생성에 사용하는 프로비저너
    provisioner: Provisioner<C>,
    /// API 호출 제한 시간
    api_timeout: Duration,
    /// 1단계 대기 설정
    wait: BoundedWait,
    /// 거부 프로브 타임아웃 해석
    deny_timeout: DenyTimeout,
}

impl<C: ControlPlane> Prober<C> {
    /// 새 프로브 실행기를 생성합니다.
    pub fn new(
        control_plane: Arc<C>,
        api_timeout: Duration,
        wait: BoundedWait,
        deny_timeout: DenyTimeout,
    ) -> Self {
        Self {
            provisioner: Provisioner::new(Arc::clone(&control_plane), api_timeout),
            control_plane,
            api_timeout,
            wait,
            deny_timeout,
        }
    }

    /// 프로브 하나를 실행하고 관측 결과를 반환합니다.
    ///
    /// `expect`는 1단계 타임아웃 해석에만 사용됩니다.
    pub async fn probe(
        &self,
        ledger: &mut ResourceLedger,
        target: ProbeTarget<'_>,
        expect: Verdict,
    ) -> Result<ProbeResult, ConformanceError> {
        let started = Instant::now();
        let unit = self
            .provisioner
            .create_probe_unit(
                ledger,
                target.domain,
                target.unit,
                target.client,
                target.address,
                target.port,
            )
            .await?;
        debug!(
            domain = target.domain,
            unit = target.unit,
            address = target.address,
            port = target.port,
            "probe unit created"
        );

        let saw_unknown = AtomicBool::new(false);
        let outcome = wait_for_unit(
            self.control_plane.as_ref(),
            target.domain,
            target.unit,
            |status| {
                if status.phase == UnitPhase::Unknown {
                    if !saw_unknown.swap(true, Ordering::Relaxed) {
                        warn!(
                            domain = target.domain,
                            unit = target.unit,
                            "probe unit phase is unknown, still waiting"
                        );
                    }
                } else {
                    saw_unknown.store(false, Ordering::Relaxed);
                }
                status.phase.is_terminal()
            },
            self.wait,
            self.api_timeout,
        )
        .await;

        ledger
            .release(self.control_plane.as_ref(), &unit, self.api_timeout)
            .await;

        let result = match outcome? {
            WaitOutcome::Ready(status) => {
                let result = ProbeResult::from_status(&status);
                debug!(
                    unit = target.unit,
                    phase = %status.phase,
                    exit_code = ?status.exit_code,
                    result = %result,
                    "probe finished"
                );
                result
            }
            WaitOutcome::TimedOut if saw_unknown.load(Ordering::Relaxed) => {
                return Err(ConformanceError::ControlPlane(format!(
                    "probe unit {}/{} was still in phase unknown after {}ms",
                    target.domain,
                    target.unit,
                    duration_ms(self.wait.timeout)
                )));
            }
            WaitOutcome::TimedOut => self.interpret_timeout(target, expect)?,
        };

        metrics::histogram!(m::PROBE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            domain = target.domain,
            client = target.client,
            port = target.port,
            result = %result,
            "probe observed"
        );
        Ok(result)
    }

    fn interpret_timeout(
        &self,
        target: ProbeTarget<'_>,
        expect: Verdict,
    ) -> Result<ProbeResult, ConformanceError> {
        match (expect, self.deny_timeout) {
            (Verdict::Deny, DenyTimeout::ObservedDeny) => {
                warn!(
                    unit = target.unit,
                    port = target.port,
                    "deny-expected probe did not finish, counting as not connected"
                );
                Ok(ProbeResult::NotConnected)
            }
            _ => Err(ConformanceError::ProbeTimeout {
                unit: format!("{}/{}", target.domain, target.unit),
                waited_ms: duration_ms(self.wait.timeout),
            }),
        }
    }
}
