//! 시나리오 엔진 설정
//!
//! [`HarnessConfig`]는 core의 [`FencecheckConfig`]를 기반으로 엔진 내부에서
//! 사용하는 값을 `Duration`과 열거형으로 정리해 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use fencecheck_core::config::FencecheckConfig;
//! use fencecheck_conformance::config::HarnessConfig;
//!
//! let core_config = FencecheckConfig::default();
//! let config = HarnessConfig::from_core(&core_config);
//! ```

use std::fmt;
use std::time::Duration;

use fencecheck_core::config::{FencecheckConfig, is_dns_label};
use serde::{Deserialize, Serialize};

use crate::error::ConformanceError;

/// 거부 예상 프로브가 제한 시간 내에 종료되지 않았을 때의 해석
///
/// 일부 정책 엔진은 거부된 연결을 즉시 끊지 않고 패킷을 버리므로
/// 프로브가 종료되지 않을 수 있습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyTimeout {
    /// 거부가 관측된 것으로 간주 (NotConnected)
    #[default]
    ObservedDeny,
    /// 인프라 장애로 간주 (시나리오 셋업 에러)
    InfrastructureFailure,
}

impl DenyTimeout {
    /// 설정 문자열을 변환합니다.
    pub fn from_config_str(value: &str) -> Option<Self> {
        match value {
            "observed_deny" => Some(Self::ObservedDeny),
            "infrastructure_failure" => Some(Self::InfrastructureFailure),
            _ => None,
        }
    }

    /// 설정 문자열 표현을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObservedDeny => "observed_deny",
            Self::InfrastructureFailure => "infrastructure_failure",
        }
    }
}

impl fmt::Display for DenyTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시나리오 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 도메인 이름 접두어
    pub domain_prefix: String,
    /// 단일 API 호출 제한 시간 (초)
    pub api_timeout_secs: u64,
    /// 서버 Running 대기 시간 (초)
    pub ready_timeout_secs: u64,
    /// 프로브 종료 대기 시간 (초)
    pub probe_timeout_secs: u64,
    /// 상태 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 거부 프로브 타임아웃 해석
    pub deny_timeout: DenyTimeout,
    /// 격리 모드 annotation 키
    pub isolation_annotation: String,
    /// 서버 이미지
    pub server_image: String,
    /// 프로브 이미지
    pub client_image: String,
    /// 프로브 연결 시도 제한 시간 (초)
    pub connect_timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::from_core(&FencecheckConfig::default())
    }
}

/// 설정 상한값 상수
const MAX_API_TIMEOUT_SECS: u64 = 600;
const MAX_READY_TIMEOUT_SECS: u64 = 3600;
const MAX_PROBE_TIMEOUT_SECS: u64 = 3600;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_DOMAIN_PREFIX_LEN: usize = 40;

impl HarnessConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    ///
    /// 알 수 없는 `deny_timeout` 값은 기본값으로 대체됩니다.
    /// core의 `validate()`를 통과한 설정이라면 발생하지 않습니다.
    pub fn from_core(core: &FencecheckConfig) -> Self {
        Self {
            domain_prefix: core.scenario.domain_prefix.clone(),
            api_timeout_secs: core.cluster.api_timeout_secs,
            ready_timeout_secs: core.scenario.ready_timeout_secs,
            probe_timeout_secs: core.scenario.probe_timeout_secs,
            poll_interval_ms: core.scenario.poll_interval_ms,
            deny_timeout: DenyTimeout::from_config_str(&core.scenario.deny_timeout)
                .unwrap_or_default(),
            isolation_annotation: core.workload.isolation_annotation.clone(),
            server_image: core.workload.server_image.clone(),
            client_image: core.workload.client_image.clone(),
            connect_timeout_secs: core.workload.connect_timeout_secs,
        }
    }

    /// 단일 API 호출 제한 시간
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// 서버 Running 대기 시간
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// 프로브 종료 대기 시간
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// 상태 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConformanceError> {
        if !is_dns_label(&self.domain_prefix) || self.domain_prefix.len() > MAX_DOMAIN_PREFIX_LEN {
            return Err(ConformanceError::Config {
                field: "domain_prefix".to_owned(),
                reason: format!(
                    "must be a lowercase DNS label of at most {MAX_DOMAIN_PREFIX_LEN} characters"
                ),
            });
        }

        if self.api_timeout_secs == 0 || self.api_timeout_secs > MAX_API_TIMEOUT_SECS {
            return Err(ConformanceError::Config {
                field: "api_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_API_TIMEOUT_SECS}"),
            });
        }

        if self.ready_timeout_secs == 0 || self.ready_timeout_secs > MAX_READY_TIMEOUT_SECS {
            return Err(ConformanceError::Config {
                field: "ready_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_READY_TIMEOUT_SECS}"),
            });
        }

        if self.probe_timeout_secs == 0 || self.probe_timeout_secs > MAX_PROBE_TIMEOUT_SECS {
            return Err(ConformanceError::Config {
                field: "probe_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_PROBE_TIMEOUT_SECS}"),
            });
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConformanceError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            });
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs >= self.probe_timeout_secs {
            return Err(ConformanceError::Config {
                field: "connect_timeout_secs".to_owned(),
                reason: "must be greater than 0 and less than probe_timeout_secs".to_owned(),
            });
        }

        if self.isolation_annotation.is_empty() {
            return Err(ConformanceError::Config {
                field: "isolation_annotation".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.server_image.is_empty() || self.client_image.is_empty() {
            return Err(ConformanceError::Config {
                field: "image".to_owned(),
                reason: "server_image and client_image must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 시나리오 엔진 설정 빌더
#[derive(Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 도메인 이름 접두어를 설정합니다.
    pub fn domain_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.domain_prefix = prefix.into();
        self
    }

    /// API 호출 제한 시간(초)을 설정합니다.
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// 서버 Running 대기 시간(초)을 설정합니다.
    pub fn ready_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ready_timeout_secs = secs;
        self
    }

    /// 프로브 종료 대기 시간(초)을 설정합니다.
    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 거부 프로브 타임아웃 해석을 설정합니다.
    pub fn deny_timeout(mut self, policy: DenyTimeout) -> Self {
        self.config.deny_timeout = policy;
        self
    }

    /// 격리 모드 annotation 키를 설정합니다.
    pub fn isolation_annotation(mut self, key: impl Into<String>) -> Self {
        self.config.isolation_annotation = key.into();
        self
    }

    /// 프로브 연결 시도 제한 시간(초)을 설정합니다.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `HarnessConfig`를 생성합니다.
    pub fn build(self) -> Result<HarnessConfig, ConformanceError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        HarnessConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = FencecheckConfig::default();
        core.scenario.domain_prefix = "np".to_owned();
        core.scenario.deny_timeout = "infrastructure_failure".to_owned();
        core.scenario.poll_interval_ms = 500;
        core.cluster.api_timeout_secs = 10;

        let config = HarnessConfig::from_core(&core);
        assert_eq!(config.domain_prefix, "np");
        assert_eq!(config.deny_timeout, DenyTimeout::InfrastructureFailure);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout_secs, 8);
    }

    #[test]
    fn from_core_falls_back_on_unknown_deny_timeout() {
        let mut core = FencecheckConfig::default();
        core.scenario.deny_timeout = "whatever".to_owned();
        let config = HarnessConfig::from_core(&core);
        assert_eq!(config.deny_timeout, DenyTimeout::ObservedDeny);
    }

    #[test]
    fn deny_timeout_string_roundtrip() {
        for policy in [DenyTimeout::ObservedDeny, DenyTimeout::InfrastructureFailure] {
            assert_eq!(DenyTimeout::from_config_str(policy.as_str()), Some(policy));
        }
        assert_eq!(DenyTimeout::from_config_str("deny"), None);
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let config = HarnessConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_uppercase_prefix() {
        let config = HarnessConfig {
            domain_prefix: "FenceCheck".to_owned(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("domain_prefix"));
    }

    #[test]
    fn validate_rejects_connect_timeout_not_below_probe_timeout() {
        let config = HarnessConfig {
            connect_timeout_secs: 120,
            probe_timeout_secs: 120,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_api_timeout() {
        let config = HarnessConfig {
            api_timeout_secs: 601,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = HarnessConfigBuilder::new()
            .domain_prefix("np")
            .ready_timeout_secs(5)
            .probe_timeout_secs(3)
            .connect_timeout_secs(1)
            .poll_interval_ms(10)
            .deny_timeout(DenyTimeout::InfrastructureFailure)
            .build()
            .unwrap();
        assert_eq!(config.ready_timeout(), Duration::from_secs(5));
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.deny_timeout, DenyTimeout::InfrastructureFailure);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = HarnessConfigBuilder::new().api_timeout_secs(0).build();
        assert!(result.is_err());
    }
}
