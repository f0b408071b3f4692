//! 설정 관리 -- fencecheck.toml 파싱 및 런타임 설정
//!
//! [`FencecheckConfig`]는 하네스 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FENCECHECK_SCENARIO_PROBE_TIMEOUT_SECS=90` 형식)
//! 3. 설정 파일 (`fencecheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), fencecheck_core::error::FencecheckError> {
//! use fencecheck_core::config::FencecheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = FencecheckConfig::load("fencecheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = FencecheckConfig::parse("[cluster]\nbackend = \"memory\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FencecheckError};

/// 지원하는 컨트롤 플레인 백엔드
pub const VALID_BACKENDS: [&str; 2] = ["kubernetes", "memory"];

/// 거부 프로브 타임아웃 해석 방식
pub const VALID_DENY_TIMEOUT_POLICIES: [&str; 2] = ["observed_deny", "infrastructure_failure"];

/// fencecheck 통합 설정
///
/// `fencecheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FencecheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 컨트롤 플레인 연결 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 시나리오 실행 설정
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// 서버/프로브 워크로드 설정
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl FencecheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FencecheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FencecheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FencecheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FencecheckError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FencecheckError> {
        toml::from_str(toml_str).map_err(|e| {
            FencecheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FENCECHECK_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FENCECHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FENCECHECK_GENERAL_LOG_FORMAT");

        // Cluster
        override_string(&mut self.cluster.backend, "FENCECHECK_CLUSTER_BACKEND");
        override_u64(
            &mut self.cluster.api_timeout_secs,
            "FENCECHECK_CLUSTER_API_TIMEOUT_SECS",
        );

        // Scenario
        override_string(
            &mut self.scenario.domain_prefix,
            "FENCECHECK_SCENARIO_DOMAIN_PREFIX",
        );
        override_u64(
            &mut self.scenario.ready_timeout_secs,
            "FENCECHECK_SCENARIO_READY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.scenario.probe_timeout_secs,
            "FENCECHECK_SCENARIO_PROBE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.scenario.poll_interval_ms,
            "FENCECHECK_SCENARIO_POLL_INTERVAL_MS",
        );
        override_string(
            &mut self.scenario.deny_timeout,
            "FENCECHECK_SCENARIO_DENY_TIMEOUT",
        );
        override_string(
            &mut self.scenario.scenario_dir,
            "FENCECHECK_SCENARIO_SCENARIO_DIR",
        );

        // Workload
        override_string(
            &mut self.workload.server_image,
            "FENCECHECK_WORKLOAD_SERVER_IMAGE",
        );
        override_string(
            &mut self.workload.client_image,
            "FENCECHECK_WORKLOAD_CLIENT_IMAGE",
        );
        override_u64(
            &mut self.workload.connect_timeout_secs,
            "FENCECHECK_WORKLOAD_CONNECT_TIMEOUT_SECS",
        );
        override_string(
            &mut self.workload.isolation_annotation,
            "FENCECHECK_WORKLOAD_ISOLATION_ANNOTATION",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FencecheckError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if !VALID_BACKENDS.contains(&self.cluster.backend.as_str()) {
            return Err(invalid(
                "cluster.backend",
                format!("must be one of: {}", VALID_BACKENDS.join(", ")),
            ));
        }

        if self.cluster.api_timeout_secs == 0 {
            return Err(invalid("cluster.api_timeout_secs", "must be greater than 0"));
        }

        if !is_dns_label(&self.scenario.domain_prefix) || self.scenario.domain_prefix.len() > 40 {
            return Err(invalid(
                "scenario.domain_prefix",
                "must be a lowercase DNS label of at most 40 characters",
            ));
        }

        if self.scenario.ready_timeout_secs == 0 {
            return Err(invalid(
                "scenario.ready_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.scenario.probe_timeout_secs == 0 {
            return Err(invalid(
                "scenario.probe_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.scenario.poll_interval_ms == 0 {
            return Err(invalid("scenario.poll_interval_ms", "must be greater than 0"));
        }

        if !VALID_DENY_TIMEOUT_POLICIES.contains(&self.scenario.deny_timeout.as_str()) {
            return Err(invalid(
                "scenario.deny_timeout",
                format!(
                    "must be one of: {}",
                    VALID_DENY_TIMEOUT_POLICIES.join(", ")
                ),
            ));
        }

        if self.workload.server_image.is_empty() {
            return Err(invalid("workload.server_image", "must not be empty"));
        }

        if self.workload.client_image.is_empty() {
            return Err(invalid("workload.client_image", "must not be empty"));
        }

        // 연결 시도가 프로브 대기 시간 안에 끝나야 허용 프로브가 판정 가능하다
        if self.workload.connect_timeout_secs == 0
            || self.workload.connect_timeout_secs >= self.scenario.probe_timeout_secs
        {
            return Err(invalid(
                "workload.connect_timeout_secs",
                "must be greater than 0 and less than scenario.probe_timeout_secs",
            ));
        }

        if self.workload.isolation_annotation.is_empty() {
            return Err(invalid(
                "workload.isolation_annotation",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 컨트롤 플레인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// 백엔드 종류 (kubernetes, memory)
    pub backend: String,
    /// 단일 API 호출 제한 시간 (초)
    pub api_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backend: "kubernetes".to_owned(),
            api_timeout_secs: 30,
        }
    }
}

/// 시나리오 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// 시나리오 전용 도메인 이름 접두어
    pub domain_prefix: String,
    /// 서버 유닛이 Running이 될 때까지 기다리는 시간 (초)
    pub ready_timeout_secs: u64,
    /// 프로브 유닛이 종료될 때까지 기다리는 시간 (초)
    pub probe_timeout_secs: u64,
    /// 상태 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 거부 예상 프로브가 타임아웃됐을 때의 해석 (observed_deny, infrastructure_failure)
    pub deny_timeout: String,
    /// 추가 시나리오 TOML 디렉토리 (비어있으면 사용 안 함)
    pub scenario_dir: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            domain_prefix: "fencecheck".to_owned(),
            ready_timeout_secs: 300,
            probe_timeout_secs: 120,
            poll_interval_ms: 2000,
            deny_timeout: "observed_deny".to_owned(),
            scenario_dir: String::new(),
        }
    }
}

/// 워크로드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// 서버 유닛 이미지 (nc 포함)
    pub server_image: String,
    /// 프로브 유닛 이미지 (nc, printf 포함)
    pub client_image: String,
    /// 프로브의 단일 연결 시도 제한 시간 (초, `nc -w`)
    pub connect_timeout_secs: u64,
    /// 격리 모드를 기록하는 도메인 annotation 키
    pub isolation_annotation: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            server_image: "gcr.io/google_containers/redis:e2e".to_owned(),
            client_image: "gcr.io/google_containers/redis:e2e".to_owned(),
            connect_timeout_secs: 8,
            isolation_annotation: "net.beta.kubernetes.io/network-policy".to_owned(),
        }
    }
}

/// 소문자 DNS 라벨(RFC 1123) 형식인지 확인합니다.
pub fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}

fn invalid(field: &str, reason: impl Into<String>) -> FencecheckError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
