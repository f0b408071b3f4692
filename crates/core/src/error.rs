//! 에러 타입 -- 도메인별 에러 정의

/// fencecheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum FencecheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨트롤 플레인 호출 에러
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// 시나리오 정의/실행 에러
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨트롤 플레인 에러
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// 컨트롤 플레인에 연결할 수 없음
    #[error("control plane unreachable: {0}")]
    Unreachable(String),

    /// API 호출 실패
    #[error("api call failed: {0}")]
    Api(String),

    /// 리소스를 찾을 수 없음
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// 제한 시간 초과
    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout { operation: String, waited_ms: u64 },
}

/// 시나리오 에러
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 시나리오 정의가 유효하지 않음
    #[error("invalid scenario '{scenario}': {reason}")]
    Invalid { scenario: String, reason: String },

    /// 시나리오 파일 로딩 실패
    #[error("failed to load scenario from {path}: {reason}")]
    Load { path: String, reason: String },

    /// 프로브가 제한 시간 내에 종료되지 않음
    #[error("probe '{unit}' did not finish within {waited_ms}ms")]
    ProbeTimeout { unit: String, waited_ms: u64 },
}
