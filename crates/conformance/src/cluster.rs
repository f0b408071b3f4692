//! 컨트롤 플레인 추상화 -- 시나리오 엔진이 사용하는 리소스 연산 정의
//!
//! [`ControlPlane`] trait은 엔진이 수행하는 모든 리소스 연산을 담습니다.
//! 실제 실행은 [`KubeControlPlane`](crate::kubernetes::KubeControlPlane)을,
//! 테스트와 드라이런은 [`MemoryControlPlane`](crate::memory::MemoryControlPlane)을 사용합니다.
//!
//! # 구조
//!
//! ```text
//! ┌──────────────────┐
//! │  ScenarioEngine  │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │ ControlPlane │ (trait)
//!   └──────────────┘
//!        │      │
//!        ▼      ▼
//!   ┌──────┐ ┌────────┐
//!   │ Kube │ │ Memory │
//!   └──┬───┘ └────────┘
//!      │
//!      ▼
//!   API 서버 + 검증 대상 정책 엔진
//! ```
//!
//! # 리소스 이름
//!
//! 도메인/유닛/엔드포인트/정책 이름은 백엔드에 전달되기 전에 DNS 레이블로
//! 검증됩니다. 이름은 도메인 범위이므로 두 도메인에 같은 유닛 이름이 있을 수 있습니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fencecheck_core::config::is_dns_label;
use fencecheck_core::types::{Labels, ResourceKind, UnitStatus};
use serde::{Deserialize, Serialize};

use crate::error::ConformanceError;
use crate::policy::PolicyObject;

/// 백엔드에 보내기 전에 리소스 이름을 검증합니다.
pub fn validate_resource_name(kind: ResourceKind, name: &str) -> Result<(), ConformanceError> {
    if is_dns_label(name) {
        Ok(())
    } else {
        Err(ConformanceError::ControlPlane(format!(
            "invalid {kind} name '{name}': must be a lowercase DNS label of at most 63 characters"
        )))
    }
}

/// 생성할 격리 도메인
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainManifest {
    /// 고유한 도메인 이름
    pub name: String,
    /// 도메인 레이블 (네임스페이스 피어 셀렉터가 매칭)
    pub labels: Labels,
}

/// 컴퓨트 유닛이 실행하는 워크로드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// 모든 포트에서 연결을 받는 상주 리스너
    Listen {
        /// 수신 포트 (포트마다 리스너 하나)
        ports: Vec<u16>,
    },
    /// 연결에 성공했을 때만 0으로 종료하는 단발성 연결 시도
    Connect {
        /// 대상 주소 (서버 엔드포인트 주소)
        address: String,
        /// 대상 포트
        port: u16,
    },
}

/// 생성할 컴퓨트 유닛
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitManifest {
    /// 유닛이 속한 도메인
    pub domain: String,
    /// 도메인 안에서 고유한 유닛 이름
    pub name: String,
    /// 유닛 레이블 (대상 셀렉터와 파드 피어 셀렉터가 매칭)
    pub labels: Labels,
    /// 실행할 워크로드
    pub workload: Workload,
}

/// 네트워크 엔드포인트의 포트 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPort {
    /// 포트 이름 (`<server>-<port>`)
    pub name: String,
    /// 엔드포인트가 노출하는 포트
    pub port: u16,
    /// 선택된 유닛의 포트
    pub target_port: u16,
}

/// 유닛 집합 앞에 생성할 고정 네트워크 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointManifest {
    /// 엔드포인트가 속한 도메인
    pub domain: String,
    /// 엔드포인트 이름
    pub name: String,
    /// 트래픽을 전달할 유닛의 레이블
    pub selector: Labels,
    /// 노출 포트
    pub ports: Vec<EndpointPort>,
}

/// 컨트롤 플레인이 보고한 생성된 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// 엔드포인트가 속한 도메인
    pub domain: String,
    /// 엔드포인트 이름
    pub name: String,
    /// 프로브가 연결할 주소
    pub address: String,
}

/// 관측된 도메인 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// 도메인 이름
    pub name: String,
    /// 도메인 레이블
    pub labels: Labels,
    /// 도메인 어노테이션 (격리 모드가 여기에 저장됨)
    pub annotations: Labels,
}

/// 시나리오가 생성한 리소스 (정리 대상 기록용)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 소속 도메인 (도메인 자신이면 자기 이름)
    pub domain: String,
    /// 리소스 이름
    pub name: String,
}

impl ResourceRef {
    /// 도메인 참조를 만듭니다.
    pub fn domain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ResourceKind::Domain,
            domain: name.clone(),
            name,
        }
    }

    /// 도메인 안의 리소스 참조를 만듭니다.
    pub fn scoped(kind: ResourceKind, domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Domain => write!(f, "domain/{}", self.name),
            kind => write!(f, "{kind}/{}/{}", self.domain, self.name),
        }
    }
}

/// 도메인/유닛/엔드포인트/정책 객체를 호스팅하는 컨트롤 플레인
///
/// `Send + Sync + 'static`이므로 엔진이 클라이언트 하나를 여러 시나리오에서 공유합니다.
///
/// # 구현체
///
/// - [`KubeControlPlane`](crate::kubernetes::KubeControlPlane): 네트워크 정책
///   엔진을 검증할 Kubernetes 클러스터
/// - [`MemoryControlPlane`](crate::memory::MemoryControlPlane): 장애 주입을
///   지원하는 인메모리 기준 엔진
///
/// # 에러
///
/// - **리소스 없음**: `ConformanceError::NotFound`
/// - **이름 충돌**: `ConformanceError::AlreadyExists`
/// - **API 연결 불가**: `ConformanceError::Connection`
/// - **그 외**: `ConformanceError::ControlPlane`
///
/// 재시도하지 않습니다. 호출자가 호출마다 타임아웃을 겁니다.
pub trait ControlPlane: Send + Sync + 'static {
    /// 컨트롤 플레인에 연결 가능한지 확인합니다.
    fn ping(&self) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 격리 도메인을 생성합니다.
    fn create_domain(
        &self,
        manifest: &DomainManifest,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 도메인의 레이블과 어노테이션을 읽습니다.
    fn get_domain(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DomainInfo, ConformanceError>> + Send;

    /// 도메인 어노테이션을 `annotations`로 통째로 교체합니다.
    ///
    /// 무조건 전체 교체입니다. 맵에 없는 어노테이션은 제거되며 낙관적 동시성 검사는 없습니다.
    fn replace_domain_annotations(
        &self,
        name: &str,
        annotations: &Labels,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 도메인과 그 안의 모든 리소스를 삭제합니다.
    fn delete_domain(&self, name: &str)
    -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 컴퓨트 유닛을 생성합니다.
    fn create_unit(
        &self,
        manifest: &UnitManifest,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 유닛의 단계와 종료 코드를 읽습니다.
    fn get_unit(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<UnitStatus, ConformanceError>> + Send;

    /// 컴퓨트 유닛을 삭제합니다.
    fn delete_unit(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 네트워크 엔드포인트를 생성하고 주소를 반환합니다.
    fn create_endpoint(
        &self,
        manifest: &EndpointManifest,
    ) -> impl Future<Output = Result<EndpointInfo, ConformanceError>> + Send;

    /// 네트워크 엔드포인트를 삭제합니다.
    fn delete_endpoint(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 도메인에 정책 객체를 생성합니다.
    fn create_policy(
        &self,
        domain: &str,
        policy: &PolicyObject,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 정책 객체를 삭제합니다.
    fn delete_policy(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;
}

impl<T: ControlPlane> ControlPlane for Arc<T> {
    fn ping(&self) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).ping()
    }

    fn create_domain(
        &self,
        manifest: &DomainManifest,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).create_domain(manifest)
    }

    fn get_domain(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DomainInfo, ConformanceError>> + Send {
        (**self).get_domain(name)
    }

    fn replace_domain_annotations(
        &self,
        name: &str,
        annotations: &Labels,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).replace_domain_annotations(name, annotations)
    }

    fn delete_domain(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).delete_domain(name)
    }

    fn create_unit(
        &self,
        manifest: &UnitManifest,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).create_unit(manifest)
    }

    fn get_unit(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<UnitStatus, ConformanceError>> + Send {
        (**self).get_unit(domain, name)
    }

    fn delete_unit(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).delete_unit(domain, name)
    }

    fn create_endpoint(
        &self,
        manifest: &EndpointManifest,
    ) -> impl Future<Output = Result<EndpointInfo, ConformanceError>> + Send {
        (**self).create_endpoint(manifest)
    }

    fn delete_endpoint(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).delete_endpoint(domain, name)
    }

    fn create_policy(
        &self,
        domain: &str,
        policy: &PolicyObject,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).create_policy(domain, policy)
    }

    fn delete_policy(
        &self,
        domain: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send {
        (**self).delete_policy(domain, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_resource_name_accepts_dns_labels() {
        assert!(validate_resource_name(ResourceKind::Unit, "client-a-3").is_ok());
        assert!(validate_resource_name(ResourceKind::Domain, "fencecheck-a-1f2e").is_ok());
    }

    #[test]
    fn validate_resource_name_rejects_invalid() {
        for bad in ["", "Server", "svc_server", "-a", "a-", &"x".repeat(64)] {
            let err = validate_resource_name(ResourceKind::Endpoint, bad).unwrap_err();
            assert!(err.to_string().contains("invalid endpoint name"), "{bad}");
        }
    }

    #[test]
    fn resource_ref_display() {
        assert_eq!(ResourceRef::domain("np-a").to_string(), "domain/np-a");
        assert_eq!(
            ResourceRef::scoped(ResourceKind::Unit, "np-a", "server").to_string(),
            "unit/np-a/server"
        );
        assert_eq!(
            ResourceRef::scoped(ResourceKind::Policy, "np-a", "allow-all").to_string(),
            "policy/np-a/allow-all"
        );
    }

    #[test]
    fn workload_serializes_with_tag() {
        let listen = Workload::Listen { ports: vec![80, 81] };
        let json = serde_json::to_value(&listen).unwrap();
        assert_eq!(json["listen"]["ports"][1], 81);
    }
}
