//! 시나리오 결과 보고서
//!
//! 시나리오 하나의 결과는 [`ScenarioReport`]로, 여러 시나리오의 결과는
//! [`SuiteReport`]로 모입니다. 판정은 셋 중 하나입니다.
//!
//! - `Pass`: 모든 프로브가 기대와 일치
//! - `Fail`: 하나 이상의 프로브가 기대와 불일치 (불일치 목록 포함)
//! - `SetupError`: 프로비저닝/대기/프로브 인프라 실패 (단계와 사유, 그때까지의 불일치 포함)
//!
//! 정리 실패는 부가 진단이며 판정을 바꾸지 않습니다.

use std::fmt;

use fencecheck_core::types::{ProbeResult, Verdict};
use serde::Serialize;

use crate::cluster::ResourceRef;
use crate::engine::ScenarioPhase;

/// 정리 단계에서 삭제하지 못한 리소스
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownFailure {
    /// 삭제하지 못한 리소스
    pub resource: ResourceRef,
    /// 실패 사유
    pub reason: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.reason)
    }
}

/// 실행된 프로브 하나의 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRecord {
    /// 시나리오 내 단계 인덱스
    pub step: usize,
    /// 클라이언트 이름
    pub client: String,
    /// 클라이언트가 속한 도메인 별칭
    pub domain: String,
    /// 목적지 포트
    pub port: u16,
    /// 선언된 기대 판정
    pub expected: Verdict,
    /// 관측된 결과
    pub observed: ProbeResult,
    /// 로컬 정책 모델이 계산한 판정
    pub model: Verdict,
}

impl ProbeRecord {
    /// 관측 결과가 기대와 일치하는지 확인합니다.
    pub fn matches_expectation(&self) -> bool {
        self.observed.verdict() == self.expected
    }

    /// 선언된 기대가 로컬 정책 모델과 일치하는지 확인합니다.
    pub fn model_agrees(&self) -> bool {
        self.model == self.expected
    }
}

impl fmt::Display for ProbeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: {} in {} -> port {}: expected {}, observed {}",
            self.step, self.client, self.domain, self.port, self.expected, self.observed
        )
    }
}

/// 시나리오 판정
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ScenarioVerdict {
    /// 모든 프로브가 기대와 일치
    Pass,
    /// 기대와 다른 프로브가 있음
    Fail {
        /// 불일치한 프로브
        mismatches: Vec<ProbeRecord>,
    },
    /// 시나리오를 끝까지 실행하지 못함
    SetupError {
        /// 실패한 단계
        stage: ScenarioPhase,
        /// 실패 사유
        reason: String,
        /// 에러 전에 이미 관측된 불일치
        mismatches: Vec<ProbeRecord>,
    },
}

impl ScenarioVerdict {
    /// 통과했는지 확인합니다.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// 판정에 포함된 불일치 프로브를 반환합니다.
    pub fn mismatches(&self) -> &[ProbeRecord] {
        match self {
            Self::Pass => &[],
            Self::Fail { mismatches } | Self::SetupError { mismatches, .. } => mismatches,
        }
    }

    /// 메트릭 레이블용 고정된 결과명을 반환합니다.
    pub fn result_name(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail { .. } => "fail",
            Self::SetupError { .. } => "setup_error",
        }
    }
}

/// 단계 전이 기록
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    /// 이전 단계
    pub from: ScenarioPhase,
    /// 다음 단계
    pub to: ScenarioPhase,
    /// 시나리오 시작 후 경과 시간 (밀리초)
    pub elapsed_ms: u64,
}

/// 시나리오 하나의 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// 시나리오 이름
    pub scenario: String,
    /// 실행 식별자 (도메인 이름에 포함됨)
    pub run_id: String,
    /// 판정
    pub verdict: ScenarioVerdict,
    /// 실행된 프로브 기록 (실행 순서)
    pub probes: Vec<ProbeRecord>,
    /// 정리 실패 진단
    pub teardown_failures: Vec<TeardownFailure>,
    /// 단계 전이 기록
    pub trail: Vec<PhaseTransition>,
    /// 정리를 포함한 전체 소요 시간 (밀리초)
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// 선언된 기대가 로컬 모델과 다른 프로브를 반환합니다.
    pub fn model_disagreements(&self) -> impl Iterator<Item = &ProbeRecord> {
        self.probes.iter().filter(|p| !p.model_agrees())
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.verdict {
            ScenarioVerdict::Pass => "PASS",
            ScenarioVerdict::Fail { .. } => "FAIL",
            ScenarioVerdict::SetupError { .. } => "ERROR",
        };
        write!(
            f,
            "{label} {} (run {}, {} probes, {}ms)",
            self.scenario,
            self.run_id,
            self.probes.len(),
            self.duration_ms
        )?;

        if let ScenarioVerdict::SetupError { stage, reason, .. } = &self.verdict {
            write!(f, "\n  setup error during {stage}: {reason}")?;
        }
        for probe in self.verdict.mismatches() {
            write!(f, "\n  mismatch {probe}")?;
        }

        for probe in self.model_disagreements() {
            write!(
                f,
                "\n  note: policy model predicts {} for step {}",
                probe.model, probe.step
            )?;
        }

        for failure in &self.teardown_failures {
            write!(f, "\n  teardown: {failure}")?;
        }

        Ok(())
    }
}

/// 여러 시나리오의 실행 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    /// 시나리오별 결과 (실행 순서)
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    /// 통과한 시나리오 수
    pub fn passed(&self) -> usize {
        self.count(|v| matches!(v, ScenarioVerdict::Pass))
    }

    /// 실패한 시나리오 수
    pub fn failed(&self) -> usize {
        self.count(|v| matches!(v, ScenarioVerdict::Fail { .. }))
    }

    /// 셋업 에러로 끝난 시나리오 수
    pub fn errored(&self) -> usize {
        self.count(|v| matches!(v, ScenarioVerdict::SetupError { .. }))
    }

    /// 정리 실패 총 수
    pub fn teardown_failures(&self) -> usize {
        self.reports.iter().map(|r| r.teardown_failures.len()).sum()
    }

    /// 모든 시나리오가 통과했는지 확인합니다.
    ///
    /// 실행된 시나리오가 없으면 `false`입니다.
    pub fn all_passed(&self) -> bool {
        !self.reports.is_empty() && self.passed() == self.reports.len()
    }

    fn count(&self, pred: impl Fn(&ScenarioVerdict) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.verdict)).count()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{report}")?;
        }
        write!(
            f,
            "{} scenarios: {} passed, {} failed, {} errored",
            self.reports.len(),
            self.passed(),
            self.failed(),
            self.errored()
        )?;
        let leaked = self.teardown_failures();
        if leaked > 0 {
            write!(f, ", {leaked} teardown failures")?;
        }
        Ok(())
    }
}
