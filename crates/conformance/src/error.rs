//! 적합성 하네스 에러 타입
//!
//! [`ConformanceError`]는 시나리오 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<ConformanceError> for FencecheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use fencecheck_core::error::{ClusterError, ConfigError, FencecheckError, ScenarioError};
use fencecheck_core::types::ResourceKind;

/// 적합성 하네스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ConformanceError {
    /// 컨트롤 플레인 API 호출 실패
    #[error("control plane error: {0}")]
    ControlPlane(String),

    /// 컨트롤 플레인 연결 실패
    #[error("control plane connection error: {0}")]
    Connection(String),

    /// 리소스를 찾을 수 없음
    #[error("{kind} not found: {name}")]
    NotFound {
        /// 리소스 종류
        kind: ResourceKind,
        /// `domain/name` 형식의 리소스 이름
        name: String,
    },

    /// 같은 이름의 리소스가 이미 존재함
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// 리소스 종류
        kind: ResourceKind,
        /// `domain/name` 형식의 리소스 이름
        name: String,
    },

    /// 제한 시간 내에 작업이 끝나지 않음
    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout {
        /// 수행 중이던 작업
        operation: String,
        /// 기다린 시간 (밀리초)
        waited_ms: u64,
    },

    /// 프로브 유닛이 제한 시간 내에 종료되지 않음
    #[error("probe '{unit}' did not finish within {waited_ms}ms")]
    ProbeTimeout {
        /// 프로브 유닛 이름
        unit: String,
        /// 기다린 시간 (밀리초)
        waited_ms: u64,
    },

    /// 정책 객체 유효성 검증 실패
    #[error("policy validation error: policy '{policy}': {reason}")]
    PolicyValidation {
        /// 문제가 된 정책 이름
        policy: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 시나리오 파일 로딩 실패
    #[error("scenario load error: {path}: {reason}")]
    ScenarioLoad {
        /// 시나리오 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 시나리오 정의 검증 실패
    #[error("scenario validation error: scenario '{scenario}': {reason}")]
    ScenarioValidation {
        /// 시나리오 이름
        scenario: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ConformanceError> for FencecheckError {
    fn from(err: ConformanceError) -> Self {
        match err {
            ConformanceError::ControlPlane(msg) => FencecheckError::Cluster(ClusterError::Api(msg)),
            ConformanceError::Connection(msg) => {
                FencecheckError::Cluster(ClusterError::Unreachable(msg))
            }
            ConformanceError::NotFound { kind, name } => {
                FencecheckError::Cluster(ClusterError::NotFound {
                    kind: kind.to_string(),
                    name,
                })
            }
            ConformanceError::AlreadyExists { .. } => {
                FencecheckError::Cluster(ClusterError::Api(err.to_string()))
            }
            ConformanceError::Timeout {
                operation,
                waited_ms,
            } => FencecheckError::Cluster(ClusterError::Timeout {
                operation,
                waited_ms,
            }),
            ConformanceError::ProbeTimeout { unit, waited_ms } => {
                FencecheckError::Scenario(ScenarioError::ProbeTimeout { unit, waited_ms })
            }
            ConformanceError::PolicyValidation { ref policy, .. } => {
                FencecheckError::Scenario(ScenarioError::Invalid {
                    scenario: policy.clone(),
                    reason: err.to_string(),
                })
            }
            ConformanceError::ScenarioLoad { path, reason } => {
                FencecheckError::Scenario(ScenarioError::Load { path, reason })
            }
            ConformanceError::ScenarioValidation { scenario, reason } => {
                FencecheckError::Scenario(ScenarioError::Invalid { scenario, reason })
            }
            ConformanceError::Config { field, reason } => {
                FencecheckError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
