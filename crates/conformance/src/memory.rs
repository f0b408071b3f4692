//! 인메모리 컨트롤 플레인 -- 기준 정책 엔진 및 장애 주입
//!
//! [`MemoryControlPlane`]은 도메인/유닛/엔드포인트/정책을 메모리에 보관하고,
//! 프로브 유닛이 생성될 때 [`policy`](crate::policy) 모델로 연결 허용 여부를
//! 계산합니다. 실제 클러스터 없이 시나리오를 실행하는 드라이런 백엔드이자
//! 엔진 테스트의 협력 객체입니다.
//!
//! # 유닛 생명주기
//!
//! - 리스너 유닛: 첫 조회부터 `Running` (준비 실패 주입 시 계속 `Pending`)
//! - 프로브 유닛: 첫 조회는 `Running`, 이후 연결 결과에 따라
//!   종료 코드 0(`Succeeded`) 또는 1(`Failed`)
//!
//! # 장애 주입
//!
//! - 특정 리소스 종류의 생성/삭제 실패
//! - 생성은 반영되지만 응답이 늦음 (호출자 쪽 시간 초과)
//! - 특정 서버 유닛이 Running에 도달하지 않음
//! - 특정 유닛이 `Unknown` 단계로 보고됨 (노드 유실)
//! - 유닛 상태 조회가 돌아오지 않음
//! - 거부된 프로브가 종료되지 않고 멈춤
//! - 정책을 무시하고 모든 연결을 허용 (고장난 정책 엔진)
//! - `ping` 실패 (연결 불가)

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use fencecheck_core::types::{IsolationMode, Labels, ResourceKind, UnitPhase, UnitStatus};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cluster::{
    ControlPlane, DomainInfo, DomainManifest, EndpointInfo, EndpointManifest, EndpointPort,
    UnitManifest, Workload, validate_resource_name,
};
use crate::error::ConformanceError;
use crate::isolation::{DEFAULT_ISOLATION_ANNOTATION, mode_from_annotations};
use crate::policy::{Connection, PolicyObject, PolicySet};

/// 연결 성공 시 프로브 종료 코드
const EXIT_CONNECTED: i32 = 0;
/// 연결 실패 시 프로브 종료 코드 (`nc`의 실패 코드)
const EXIT_NOT_CONNECTED: i32 = 1;

/// 현재 보관 중인 리소스 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    /// 도메인 수
    pub domains: usize,
    /// 유닛 수
    pub units: usize,
    /// 엔드포인트 수
    pub endpoints: usize,
    /// 정책 수
    pub policies: usize,
}

impl Inventory {
    /// 보관 중인 리소스가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_create: HashSet<ResourceKind>,
    fail_delete: HashSet<ResourceKind>,
    slow_create: HashMap<ResourceKind, Duration>,
    never_ready: HashSet<String>,
    lost_units: HashSet<String>,
    hang_unit_status: bool,
    hang_denied_probes: bool,
    ignore_policies: bool,
    unreachable: bool,
}

#[derive(Debug)]
struct UnitState {
    labels: Labels,
    workload: Workload,
    /// 프로브 유닛의 계산된 결과 (리스너는 `None`)
    outcome: Option<i32>,
    polls: u32,
}

#[derive(Debug)]
struct EndpointState {
    selector: Labels,
    ports: Vec<EndpointPort>,
    address: String,
}

#[derive(Debug)]
struct DomainState {
    labels: Labels,
    annotations: Labels,
    policies: PolicySet,
    units: BTreeMap<String, UnitState>,
    endpoints: BTreeMap<String, EndpointState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    domains: BTreeMap<String, DomainState>,
    next_address: u32,
    annotation_writes: u64,
}

/// 인메모리 컨트롤 플레인
#[derive(Debug)]
pub struct MemoryControlPlane {
    state: Mutex<MemoryState>,
    faults: Faults,
    annotation_key: String,
}

impl Default for MemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryControlPlane {
    /// 정상 동작하는 기준 엔진을 생성합니다.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            faults: Faults::default(),
            annotation_key: DEFAULT_ISOLATION_ANNOTATION.to_owned(),
        }
    }

    /// 격리 모드를 읽을 annotation 키를 설정합니다.
    pub fn with_isolation_annotation(mut self, key: impl Into<String>) -> Self {
        self.annotation_key = key.into();
        self
    }

    /// 해당 종류의 리소스 생성이 실패하도록 설정합니다.
    pub fn with_failing_create(mut self, kind: ResourceKind) -> Self {
        self.faults.fail_create.insert(kind);
        self
    }

    /// 해당 종류의 리소스 삭제가 실패하도록 설정합니다.
    pub fn with_failing_delete(mut self, kind: ResourceKind) -> Self {
        self.faults.fail_delete.insert(kind);
        self
    }

    /// 해당 종류의 리소스 생성을 반영한 뒤 `delay`만큼 늦게 응답하도록 설정합니다.
    pub fn with_slow_create(mut self, kind: ResourceKind, delay: Duration) -> Self {
        self.faults.slow_create.insert(kind, delay);
        self
    }

    /// 이름이 일치하는 유닛의 단계를 항상 `Unknown`으로 보고하도록 설정합니다.
    pub fn with_lost_unit(mut self, unit: impl Into<String>) -> Self {
        self.faults.lost_units.insert(unit.into());
        self
    }

    /// 유닛 상태 조회가 응답하지 않도록 설정합니다.
    pub fn with_hanging_unit_status(mut self) -> Self {
        self.faults.hang_unit_status = true;
        self
    }

    /// 이름이 일치하는 리스너 유닛이 Running에 도달하지 않도록 설정합니다.
    pub fn with_never_ready(mut self, unit: impl Into<String>) -> Self {
        self.faults.never_ready.insert(unit.into());
        self
    }

    /// 거부된 프로브가 종료되지 않도록 설정합니다.
    pub fn with_hanging_denied_probes(mut self) -> Self {
        self.faults.hang_denied_probes = true;
        self
    }

    /// 정책과 격리 모드를 무시하고 모든 연결을 허용하도록 설정합니다.
    pub fn with_policies_ignored(mut self) -> Self {
        self.faults.ignore_policies = true;
        self
    }

    /// `ping`이 실패하도록 설정합니다.
    pub fn with_unreachable(mut self) -> Self {
        self.faults.unreachable = true;
        self
    }

    /// 현재 보관 중인 리소스 수를 반환합니다.
    pub async fn inventory(&self) -> Inventory {
        let state = self.state.lock().await;
        state
            .domains
            .values()
            .fold(
                Inventory {
                    domains: state.domains.len(),
                    ..Inventory::default()
                },
                |mut inv, domain| {
                    inv.units += domain.units.len();
                    inv.endpoints += domain.endpoints.len();
                    inv.policies += domain.policies.len();
                    inv
                },
            )
    }

    /// 현재 존재하는 도메인 이름 목록을 반환합니다.
    pub async fn domain_names(&self) -> Vec<String> {
        self.state.lock().await.domains.keys().cloned().collect()
    }

    /// annotation 교체 호출 횟수를 반환합니다.
    pub async fn annotation_writes(&self) -> u64 {
        self.state.lock().await.annotation_writes
    }

    fn check_create(&self, kind: ResourceKind, name: &str) -> Result<(), ConformanceError> {
        validate_resource_name(kind, name)?;
        if self.faults.fail_create.contains(&kind) {
            return Err(ConformanceError::ControlPlane(format!(
                "injected failure creating {kind} {name}"
            )));
        }
        Ok(())
    }

    /// 생성 응답 지연 주입. 상태 잠금을 놓은 뒤에 호출해야 합니다.
    async fn stall_after_create(&self, kind: ResourceKind) {
        if let Some(delay) = self.faults.slow_create.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn check_delete(&self, kind: ResourceKind, name: &str) -> Result<(), ConformanceError> {
        if self.faults.fail_delete.contains(&kind) {
            return Err(ConformanceError::ControlPlane(format!(
                "injected failure deleting {kind} {name}"
            )));
        }
        Ok(())
    }

    /// 프로브 유닛의 연결 결과(종료 코드)를 계산합니다.
    fn resolve_probe(
        &self,
        state: &MemoryState,
        source: &UnitManifest,
        address: &str,
        port: u16,
    ) -> i32 {
        let Some(source_domain) = state.domains.get(&source.domain) else {
            return EXIT_NOT_CONNECTED;
        };

        let target = state.domains.iter().find_map(|(name, domain)| {
            let endpoint = domain.endpoints.values().find(|ep| ep.address == address)?;
            let exposed = endpoint.ports.iter().find(|p| p.port == port)?;
            Some((name, domain, &endpoint.selector, exposed.target_port))
        });
        let Some((target_domain_name, target_domain, selector, target_port)) = target else {
            debug!(address, port, "probe target has no endpoint port");
            return EXIT_NOT_CONNECTED;
        };

        let mode = if self.faults.ignore_policies {
            IsolationMode::Permissive
        } else {
            mode_from_annotations(&target_domain.annotations, &self.annotation_key)
        };

        let conn = Connection {
            source_domain: &source.domain,
            source_labels: &source.labels,
            source_domain_labels: &source_domain.labels,
            port: target_port,
        };

        let allowed = target_domain
            .units
            .values()
            .filter(|unit| selector.iter().all(|(k, v)| unit.labels.get(k) == Some(v)))
            .filter(|unit| match &unit.workload {
                Workload::Listen { ports } => ports.contains(&target_port),
                Workload::Connect { .. } => false,
            })
            .any(|unit| {
                let decision = target_domain.policies.decide(mode, &unit.labels, &conn);
                debug!(
                    domain = %target_domain_name,
                    source = %source.name,
                    port = target_port,
                    verdict = %decision.verdict,
                    reason = %decision.reason,
                    "memory engine decision"
                );
                decision.verdict.is_allow()
            });

        if allowed {
            EXIT_CONNECTED
        } else {
            EXIT_NOT_CONNECTED
        }
    }
}

fn not_found(kind: ResourceKind, domain: &str, name: &str) -> ConformanceError {
    ConformanceError::NotFound {
        kind,
        name: format!("{domain}/{name}"),
    }
}

fn already_exists(kind: ResourceKind, domain: &str, name: &str) -> ConformanceError {
    ConformanceError::AlreadyExists {
        kind,
        name: format!("{domain}/{name}"),
    }
}

fn domain_not_found(name: &str) -> ConformanceError {
    ConformanceError::NotFound {
        kind: ResourceKind::Domain,
        name: name.to_owned(),
    }
}

impl ControlPlane for MemoryControlPlane {
    async fn ping(&self) -> Result<(), ConformanceError> {
        if self.faults.unreachable {
            return Err(ConformanceError::Connection(
                "memory control plane marked unreachable".to_owned(),
            ));
        }
        Ok(())
    }

    async fn create_domain(&self, manifest: &DomainManifest) -> Result<(), ConformanceError> {
        self.check_create(ResourceKind::Domain, &manifest.name)?;
        let mut state = self.state.lock().await;
        if state.domains.contains_key(&manifest.name) {
            return Err(ConformanceError::AlreadyExists {
                kind: ResourceKind::Domain,
                name: manifest.name.clone(),
            });
        }
        state.domains.insert(
            manifest.name.clone(),
            DomainState {
                labels: manifest.labels.clone(),
                annotations: Labels::new(),
                policies: PolicySet::new(manifest.name.clone()),
                units: BTreeMap::new(),
                endpoints: BTreeMap::new(),
            },
        );
        drop(state);
        self.stall_after_create(ResourceKind::Domain).await;
        Ok(())
    }

    async fn get_domain(&self, name: &str) -> Result<DomainInfo, ConformanceError> {
        let state = self.state.lock().await;
        let domain = state.domains.get(name).ok_or_else(|| domain_not_found(name))?;
        Ok(DomainInfo {
            name: name.to_owned(),
            labels: domain.labels.clone(),
            annotations: domain.annotations.clone(),
        })
    }

    async fn replace_domain_annotations(
        &self,
        name: &str,
        annotations: &Labels,
    ) -> Result<(), ConformanceError> {
        let mut state = self.state.lock().await;
        let domain = state
            .domains
            .get_mut(name)
            .ok_or_else(|| domain_not_found(name))?;
        domain.annotations = annotations.clone();
        state.annotation_writes += 1;
        Ok(())
    }

    async fn delete_domain(&self, name: &str) -> Result<(), ConformanceError> {
        self.check_delete(ResourceKind::Domain, name)?;
        let mut state = self.state.lock().await;
        state
            .domains
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| domain_not_found(name))
    }

    async fn create_unit(&self, manifest: &UnitManifest) -> Result<(), ConformanceError> {
        self.check_create(ResourceKind::Unit, &manifest.name)?;
        let mut state = self.state.lock().await;

        let outcome = match &manifest.workload {
            Workload::Listen { .. } => None,
            Workload::Connect { address, port } => {
                Some(self.resolve_probe(&state, manifest, address, *port))
            }
        };

        let domain = state
            .domains
            .get_mut(&manifest.domain)
            .ok_or_else(|| domain_not_found(&manifest.domain))?;
        if domain.units.contains_key(&manifest.name) {
            return Err(already_exists(
                ResourceKind::Unit,
                &manifest.domain,
                &manifest.name,
            ));
        }
        domain.units.insert(
            manifest.name.clone(),
            UnitState {
                labels: manifest.labels.clone(),
                workload: manifest.workload.clone(),
                outcome,
                polls: 0,
            },
        );
        drop(state);
        self.stall_after_create(ResourceKind::Unit).await;
        Ok(())
    }

    async fn get_unit(&self, domain: &str, name: &str) -> Result<UnitStatus, ConformanceError> {
        if self.faults.hang_unit_status {
            return std::future::pending().await;
        }
        let mut state = self.state.lock().await;
        let unit = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .units
            .get_mut(name)
            .ok_or_else(|| not_found(ResourceKind::Unit, domain, name))?;

        let first_poll = unit.polls == 0;
        unit.polls = unit.polls.saturating_add(1);

        let status = match unit.outcome {
            _ if self.faults.lost_units.contains(name) => UnitStatus::new(UnitPhase::Unknown),
            None if self.faults.never_ready.contains(name) => UnitStatus::new(UnitPhase::Pending),
            None => UnitStatus::new(UnitPhase::Running),
            Some(_) if first_poll => UnitStatus::new(UnitPhase::Running),
            Some(code) if code != EXIT_CONNECTED && self.faults.hang_denied_probes => {
                UnitStatus::new(UnitPhase::Running)
            }
            Some(code) => UnitStatus::terminated(code),
        };
        Ok(status)
    }

    async fn delete_unit(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        self.check_delete(ResourceKind::Unit, name)?;
        let mut state = self.state.lock().await;
        state
            .domains
            .get_mut(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .units
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::Unit, domain, name))
    }

    async fn create_endpoint(
        &self,
        manifest: &EndpointManifest,
    ) -> Result<EndpointInfo, ConformanceError> {
        self.check_create(ResourceKind::Endpoint, &manifest.name)?;
        let mut state = self.state.lock().await;
        state.next_address += 1;
        let n = state.next_address;
        let address = format!("10.96.{}.{}", n / 256, n % 256);

        let domain = state
            .domains
            .get_mut(&manifest.domain)
            .ok_or_else(|| domain_not_found(&manifest.domain))?;
        if domain.endpoints.contains_key(&manifest.name) {
            return Err(already_exists(
                ResourceKind::Endpoint,
                &manifest.domain,
                &manifest.name,
            ));
        }
        domain.endpoints.insert(
            manifest.name.clone(),
            EndpointState {
                selector: manifest.selector.clone(),
                ports: manifest.ports.clone(),
                address: address.clone(),
            },
        );
        drop(state);
        self.stall_after_create(ResourceKind::Endpoint).await;
        Ok(EndpointInfo {
            domain: manifest.domain.clone(),
            name: manifest.name.clone(),
            address,
        })
    }

    async fn delete_endpoint(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        self.check_delete(ResourceKind::Endpoint, name)?;
        let mut state = self.state.lock().await;
        state
            .domains
            .get_mut(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .endpoints
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::Endpoint, domain, name))
    }

    async fn create_policy(
        &self,
        domain: &str,
        policy: &PolicyObject,
    ) -> Result<(), ConformanceError> {
        self.check_create(ResourceKind::Policy, &policy.name)?;
        let mut state = self.state.lock().await;
        let target = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| domain_not_found(domain))?;
        if target.policies.policies().iter().any(|p| p.name == policy.name) {
            return Err(already_exists(ResourceKind::Policy, domain, &policy.name));
        }
        target.policies.apply(policy.clone())?;
        drop(state);
        self.stall_after_create(ResourceKind::Policy).await;
        Ok(())
    }

    async fn delete_policy(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        self.check_delete(ResourceKind::Policy, name)?;
        let mut state = self.state.lock().await;
        let removed = state
            .domains
            .get_mut(domain)
            .ok_or_else(|| domain_not_found(domain))?
            .policies
            .remove(name);
        if removed {
            Ok(())
        } else {
            Err(not_found(ResourceKind::Policy, domain, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use fencecheck_core::types::pod_name_labels;

    use super::*;
    use crate::isolation::annotations_for;
    use crate::policy::{IngressRule, LabelSelector};

    async fn setup(cp: &MemoryControlPlane, domain: &str) -> String {
        cp.create_domain(&DomainManifest {
            name: domain.to_owned(),
            labels: Labels::new(),
        })
        .await
        .unwrap();
        cp.create_unit(&UnitManifest {
            domain: domain.to_owned(),
            name: "server".to_owned(),
            labels: pod_name_labels("server"),
            workload: Workload::Listen {
                ports: vec![80, 81],
            },
        })
        .await
        .unwrap();
        let endpoint = cp
            .create_endpoint(&EndpointManifest {
                domain: domain.to_owned(),
                name: "svc-server".to_owned(),
                selector: pod_name_labels("server"),
                ports: [80, 81]
                    .into_iter()
                    .map(|p| EndpointPort {
                        name: format!("server-{p}"),
                        port: p,
                        target_port: p,
                    })
                    .collect(),
            })
            .await
            .unwrap();
        endpoint.address
    }

    async fn probe(cp: &MemoryControlPlane, domain: &str, name: &str, address: &str, port: u16) {
        cp.create_unit(&UnitManifest {
            domain: domain.to_owned(),
            name: name.to_owned(),
            labels: pod_name_labels("client-a"),
            workload: Workload::Connect {
                address: address.to_owned(),
                port,
            },
        })
        .await
        .unwrap();
    }

    async fn final_status(cp: &MemoryControlPlane, domain: &str, name: &str) -> UnitStatus {
        let first = cp.get_unit(domain, name).await.unwrap();
        assert_eq!(first.phase, UnitPhase::Running);
        cp.get_unit(domain, name).await.unwrap()
    }

    async fn restrict(cp: &MemoryControlPlane, domain: &str) {
        cp.replace_domain_annotations(
            domain,
            &annotations_for(IsolationMode::Restrictive, DEFAULT_ISOLATION_ANNOTATION),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn permissive_domain_connects() {
        let cp = MemoryControlPlane::new();
        let address = setup(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        let status = final_status(&cp, "np-a", "client-a-0").await;
        assert_eq!(status, UnitStatus::terminated(0));
    }

    #[tokio::test]
    async fn restrictive_domain_without_policy_refuses() {
        let cp = MemoryControlPlane::new();
        let address = setup(&cp, "np-a").await;
        restrict(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        let status = final_status(&cp, "np-a", "client-a-0").await;
        assert_eq!(status, UnitStatus::terminated(1));
    }

    #[tokio::test]
    async fn port_policy_is_enforced() {
        let cp = MemoryControlPlane::new();
        let address = setup(&cp, "np-a").await;
        restrict(&cp, "np-a").await;
        cp.create_policy(
            "np-a",
            &PolicyObject::new(
                "allow-81",
                LabelSelector::with_label("pod-name", "server"),
                [IngressRule::ports([81])],
            ),
        )
        .await
        .unwrap();

        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        probe(&cp, "np-a", "client-a-1", &address, 81).await;
        assert_eq!(
            final_status(&cp, "np-a", "client-a-0").await.exit_code,
            Some(1)
        );
        assert_eq!(
            final_status(&cp, "np-a", "client-a-1").await.exit_code,
            Some(0)
        );
    }

    #[tokio::test]
    async fn unknown_address_never_connects() {
        let cp = MemoryControlPlane::new();
        setup(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", "10.1.2.3", 80).await;
        assert_eq!(
            final_status(&cp, "np-a", "client-a-0").await.exit_code,
            Some(1)
        );
    }

    #[tokio::test]
    async fn ignoring_policies_allows_everything() {
        let cp = MemoryControlPlane::new().with_policies_ignored();
        let address = setup(&cp, "np-a").await;
        restrict(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        assert_eq!(
            final_status(&cp, "np-a", "client-a-0").await.exit_code,
            Some(0)
        );
    }

    #[tokio::test]
    async fn hanging_denied_probe_stays_running() {
        let cp = MemoryControlPlane::new().with_hanging_denied_probes();
        let address = setup(&cp, "np-a").await;
        restrict(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        for _ in 0..5 {
            let status = cp.get_unit("np-a", "client-a-0").await.unwrap();
            assert_eq!(status.phase, UnitPhase::Running);
        }
    }

    #[tokio::test]
    async fn never_ready_server_stays_pending() {
        let cp = MemoryControlPlane::new().with_never_ready("server");
        setup(&cp, "np-a").await;
        let status = cp.get_unit("np-a", "server").await.unwrap();
        assert_eq!(status.phase, UnitPhase::Pending);
    }

    #[tokio::test]
    async fn lost_unit_reports_unknown_phase() {
        let cp = MemoryControlPlane::new().with_lost_unit("client-a-0");
        let address = setup(&cp, "np-a").await;
        probe(&cp, "np-a", "client-a-0", &address, 80).await;
        for _ in 0..3 {
            let status = cp.get_unit("np-a", "client-a-0").await.unwrap();
            assert_eq!(status.phase, UnitPhase::Unknown);
        }
        let server = cp.get_unit("np-a", "server").await.unwrap();
        assert_eq!(server.phase, UnitPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_create_is_applied_before_responding() {
        let cp = MemoryControlPlane::new()
            .with_slow_create(ResourceKind::Domain, Duration::from_secs(30));
        let created = tokio::time::timeout(
            Duration::from_secs(1),
            cp.create_domain(&DomainManifest {
                name: "np-a".to_owned(),
                labels: Labels::new(),
            }),
        )
        .await;
        assert!(created.is_err(), "caller gives up before the response");
        assert_eq!(cp.domain_names().await, vec!["np-a".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_unit_status_never_returns() {
        let cp = MemoryControlPlane::new().with_hanging_unit_status();
        setup(&cp, "np-a").await;
        let status =
            tokio::time::timeout(Duration::from_secs(60), cp.get_unit("np-a", "server")).await;
        assert!(status.is_err());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let cp = MemoryControlPlane::new();
        setup(&cp, "np-a").await;
        let err = cp
            .create_domain(&DomainManifest {
                name: "np-a".to_owned(),
                labels: Labels::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConformanceError::AlreadyExists { .. }));

        cp.create_policy("np-a", &PolicyObject::allow_all("allow-all"))
            .await
            .unwrap();
        let err = cp
            .create_policy("np-a", &PolicyObject::allow_all("allow-all"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::AlreadyExists {
                kind: ResourceKind::Policy,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_resources_are_not_found() {
        let cp = MemoryControlPlane::new();
        assert!(matches!(
            cp.get_domain("nope").await,
            Err(ConformanceError::NotFound { .. })
        ));
        setup(&cp, "np-a").await;
        assert!(matches!(
            cp.delete_unit("np-a", "ghost").await,
            Err(ConformanceError::NotFound {
                kind: ResourceKind::Unit,
                ..
            })
        ));
        assert!(matches!(
            cp.delete_policy("np-a", "ghost").await,
            Err(ConformanceError::NotFound {
                kind: ResourceKind::Policy,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn annotations_are_fully_replaced() {
        let cp = MemoryControlPlane::new();
        setup(&cp, "np-a").await;
        let mut custom = Labels::new();
        custom.insert("owner".to_owned(), "someone".to_owned());
        cp.replace_domain_annotations("np-a", &custom).await.unwrap();
        restrict(&cp, "np-a").await;

        let info = cp.get_domain("np-a").await.unwrap();
        assert!(!info.annotations.contains_key("owner"));
        assert_eq!(cp.annotation_writes().await, 2);
    }

    #[tokio::test]
    async fn injected_create_and_delete_failures() {
        let cp = MemoryControlPlane::new()
            .with_failing_create(ResourceKind::Policy)
            .with_failing_delete(ResourceKind::Endpoint);
        setup(&cp, "np-a").await;
        assert!(
            cp.create_policy("np-a", &PolicyObject::allow_all("allow-all"))
                .await
                .is_err()
        );
        assert!(cp.delete_endpoint("np-a", "svc-server").await.is_err());
    }

    #[tokio::test]
    async fn inventory_counts_and_cascade_delete() {
        let cp = MemoryControlPlane::new();
        setup(&cp, "np-a").await;
        cp.create_policy("np-a", &PolicyObject::allow_all("allow-all"))
            .await
            .unwrap();
        let inv = cp.inventory().await;
        assert_eq!(
            inv,
            Inventory {
                domains: 1,
                units: 1,
                endpoints: 1,
                policies: 1
            }
        );
        cp.delete_domain("np-a").await.unwrap();
        assert!(cp.inventory().await.is_empty());
        assert!(cp.domain_names().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_ping_fails() {
        let cp = MemoryControlPlane::new().with_unreachable();
        assert!(matches!(
            cp.ping().await,
            Err(ConformanceError::Connection(_))
        ));
        assert!(MemoryControlPlane::new().ping().await.is_ok());
    }
}
