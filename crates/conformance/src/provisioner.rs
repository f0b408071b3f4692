//! 리소스 프로비저너 -- 도메인, 서버, 엔드포인트, 프로브 유닛, 정책 생성
//!
//! 모든 생성 호출은 API 제한 시간으로 감싸지고, 성공하면 즉시
//! [`ResourceLedger`]에 기록됩니다. 시간 초과된 생성도 서버에서는 완료되었을 수
//! 있으므로 기록됩니다. 그 외의 실패한 생성은 기록되지 않습니다.
//!
//! # 서버 토폴로지
//!
//! - 서버 유닛: 라벨 `pod-name=<server>`, 포트마다 리스너 하나
//! - 엔드포인트: 이름 `svc-<server>`, 셀렉터 `pod-name=<server>`,
//!   포트마다 `(<server>-<port>, port, port)`

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fencecheck_core::metrics as m;
use fencecheck_core::types::{Labels, ResourceKind, pod_name_labels};
use tracing::{info, warn};

use crate::cluster::{
    ControlPlane, DomainManifest, EndpointInfo, EndpointManifest, EndpointPort, ResourceRef,
    UnitManifest, Workload,
};
use crate::error::ConformanceError;
use crate::ledger::ResourceLedger;
use crate::policy::PolicyObject;
use crate::wait::call_with_timeout;

/// 서버 앞 엔드포인트 이름을 반환합니다.
pub fn endpoint_name(server: &str) -> String {
    format!("svc-{server}")
}

/// 서버 포트 목록에 해당하는 엔드포인트 포트 목록을 생성합니다.
pub fn endpoint_ports(server: &str, ports: &[u16]) -> Vec<EndpointPort> {
    ports
        .iter()
        .map(|&port| EndpointPort {
            name: format!("{server}-{port}"),
            port,
            target_port: port,
        })
        .collect()
}

/// 제한 시간 안에서 생성 호출을 실행하고 결과에 따라 장부에 기록합니다.
///
/// 시간 초과는 생성 여부를 알 수 없으므로 기록해 두고, 정리 단계에서
/// `NotFound`는 삭제된 것으로 취급됩니다.
async fn create_recorded<T, Fut>(
    ledger: &mut ResourceLedger,
    resource: ResourceRef,
    api_timeout: Duration,
    call: Fut,
) -> Result<T, ConformanceError>
where
    Fut: Future<Output = Result<T, ConformanceError>>,
{
    let result = call_with_timeout(&format!("create {resource}"), api_timeout, call).await;
    match &result {
        Ok(_) => {
            metrics::counter!(
                m::RESOURCES_CREATED_TOTAL,
                m::LABEL_KIND => resource.kind.to_string()
            )
            .increment(1);
            ledger.record(resource);
        }
        Err(ConformanceError::Timeout { .. }) => {
            warn!(resource = %resource, "create timed out, keeping it for teardown");
            ledger.record(resource);
        }
        Err(_) => {}
    }
    result
}

/// 리소스 프로비저너
pub struct Provisioner<C: ControlPlane> {
    /// 컨트롤 플레인
    control_plane: Arc<C>,
    /// API 호출 제한 시간
    api_timeout: Duration,
}

impl<C: ControlPlane> Provisioner<C> {
    /// 새 프로비저너를 생성합니다.
    pub fn new(control_plane: Arc<C>, api_timeout: Duration) -> Self {
        Self {
            control_plane,
            api_timeout,
        }
    }

    /// 격리 도메인을 생성합니다.
    pub async fn create_domain(
        &self,
        ledger: &mut ResourceLedger,
        name: &str,
        labels: Labels,
    ) -> Result<(), ConformanceError> {
        let manifest = DomainManifest {
            name: name.to_owned(),
            labels,
        };
        create_recorded(
            ledger,
            ResourceRef::domain(name),
            self.api_timeout,
            self.control_plane.create_domain(&manifest),
        )
        .await?;
        info!(domain = name, "created domain");
        Ok(())
    }

    /// 포트마다 리스너를 하나씩 갖는 서버 유닛을 생성합니다.
    pub async fn create_server(
        &self,
        ledger: &mut ResourceLedger,
        domain: &str,
        server: &str,
        ports: &[u16],
    ) -> Result<(), ConformanceError> {
        let manifest = UnitManifest {
            domain: domain.to_owned(),
            name: server.to_owned(),
            labels: pod_name_labels(server),
            workload: Workload::Listen {
                ports: ports.to_vec(),
            },
        };
        create_recorded(
            ledger,
            ResourceRef::scoped(ResourceKind::Unit, domain, server),
            self.api_timeout,
            self.control_plane.create_unit(&manifest),
        )
        .await?;
        info!(domain, unit = server, ports = ?ports, "created server");
        Ok(())
    }

    /// 서버 앞에 엔드포인트를 생성하고 주소를 반환합니다.
    pub async fn create_endpoint(
        &self,
        ledger: &mut ResourceLedger,
        domain: &str,
        server: &str,
        ports: &[u16],
    ) -> Result<EndpointInfo, ConformanceError> {
        let manifest = EndpointManifest {
            domain: domain.to_owned(),
            name: endpoint_name(server),
            selector: pod_name_labels(server),
            ports: endpoint_ports(server, ports),
        };
        let endpoint = create_recorded(
            ledger,
            ResourceRef::scoped(ResourceKind::Endpoint, domain, &manifest.name),
            self.api_timeout,
            self.control_plane.create_endpoint(&manifest),
        )
        .await?;
        info!(
            domain,
            endpoint = %manifest.name,
            address = %endpoint.address,
            "created endpoint"
        );
        Ok(endpoint)
    }

    /// 한 번 연결을 시도하고 종료하는 프로브 유닛을 생성합니다.
    ///
    /// 유닛 이름은 `unit`, 라벨은 `pod-name=<client>`입니다.
    pub async fn create_probe_unit(
        &self,
        ledger: &mut ResourceLedger,
        domain: &str,
        unit: &str,
        client: &str,
        address: &str,
        port: u16,
    ) -> Result<ResourceRef, ConformanceError> {
        let manifest = UnitManifest {
            domain: domain.to_owned(),
            name: unit.to_owned(),
            labels: pod_name_labels(client),
            workload: Workload::Connect {
                address: address.to_owned(),
                port,
            },
        };
        let resource = ResourceRef::scoped(ResourceKind::Unit, domain, unit);
        create_recorded(
            ledger,
            resource.clone(),
            self.api_timeout,
            self.control_plane.create_unit(&manifest),
        )
        .await?;
        Ok(resource)
    }

    /// 정책 객체를 도메인에 적용합니다.
    pub async fn apply_policy(
        &self,
        ledger: &mut ResourceLedger,
        domain: &str,
        policy: &PolicyObject,
    ) -> Result<(), ConformanceError> {
        policy.validate()?;
        create_recorded(
            ledger,
            ResourceRef::scoped(ResourceKind::Policy, domain, &policy.name),
            self.api_timeout,
            self.control_plane.create_policy(domain, policy),
        )
        .await?;
        info!(domain, policy = %policy.name, "applied policy");
        Ok(())
    }
}
