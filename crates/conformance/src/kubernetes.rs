//! Kubernetes 컨트롤 플레인
//!
//! [`ControlPlane`] 연산을 Kubernetes 객체에 대응시킵니다.
//!
//! | 개념            | Kubernetes 객체                           |
//! |-----------------|-------------------------------------------|
//! | 도메인          | `Namespace`                               |
//! | 컴퓨트 유닛     | `Pod` with `restartPolicy: Never`         |
//! | 엔드포인트      | `Service` (주소 = cluster IP)             |
//! | 정책 객체       | `networking.k8s.io/v1` `NetworkPolicy`    |
//!
//! 리스너 유닛은 포트마다 `nc -kl <port>` 컨테이너 하나를 실행합니다. 프로브
//! 유닛은 `dummy-data`를 `nc -w <connect timeout> <address> <port>`로 보내는
//! 컨테이너 하나를 실행하고 그 종료 코드로 끝납니다.
//!
//! # 예시
//!
//! ```ignore
//! use fencecheck_conformance::{HarnessConfig, KubeControlPlane};
//!
//! let config = HarnessConfig::default();
//! let control_plane = KubeControlPlane::try_default(&config).await?;
//! # Ok::<(), fencecheck_conformance::ConformanceError>(())
//! ```

use fencecheck_core::types::{Labels, ResourceKind, UnitPhase, UnitStatus};
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::cluster::{
    ControlPlane, DomainInfo, DomainManifest, EndpointInfo, EndpointManifest, UnitManifest,
    Workload, validate_resource_name,
};
use crate::config::HarnessConfig;
use crate::error::ConformanceError;
use crate::policy::{IngressRule, LabelSelector, PeerSelector, PolicyObject};

/// 파드 렌더링에 쓰는 이미지와 타임아웃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTemplate {
    /// 리스너 파드 이미지 (`nc` 필요)
    pub server_image: String,
    /// 프로브 파드 이미지 (`nc`, `printf` 필요)
    pub client_image: String,
    /// `nc -w`에 전달하는 연결 시도 타임아웃
    pub connect_timeout_secs: u64,
}

impl PodTemplate {
    /// 하네스 설정으로 템플릿을 만듭니다.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            server_image: config.server_image.clone(),
            client_image: config.client_image.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
        }
    }
}

/// 도메인에 대응하는 네임스페이스를 렌더링합니다.
pub fn namespace_object(manifest: &DomainManifest) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": manifest.name,
            "labels": manifest.labels,
        },
    })
}

/// 컴퓨트 유닛에 대응하는 파드를 렌더링합니다.
pub fn pod_object(manifest: &UnitManifest, template: &PodTemplate) -> Value {
    let containers: Vec<Value> = match &manifest.workload {
        Workload::Listen { ports } => ports
            .iter()
            .map(|port| {
                json!({
                    "name": format!("{}-container-{port}", manifest.name),
                    "image": template.server_image,
                    "args": ["/bin/sh", "-c", format!("/bin/nc -kl {port}")],
                    "ports": [{ "containerPort": port }],
                })
            })
            .collect(),
        Workload::Connect { address, port } => vec![json!({
            "name": format!("{}-container", manifest.name),
            "image": template.client_image,
            "args": [
                "/bin/sh",
                "-c",
                format!(
                    "/usr/bin/printf dummy-data | /bin/nc -w {} {address} {port}",
                    template.connect_timeout_secs
                ),
            ],
        })],
    };

    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": manifest.name,
            "namespace": manifest.domain,
            "labels": manifest.labels,
        },
        "spec": {
            "restartPolicy": "Never",
            "containers": containers,
        },
    })
}

/// 엔드포인트에 대응하는 서비스를 렌더링합니다.
pub fn service_object(manifest: &EndpointManifest) -> Value {
    let ports: Vec<Value> = manifest
        .ports
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "port": p.port,
                "targetPort": p.target_port,
            })
        })
        .collect();

    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": manifest.name,
            "namespace": manifest.domain,
        },
        "spec": {
            "selector": manifest.selector,
            "ports": ports,
        },
    })
}

fn selector_value(selector: &LabelSelector) -> Value {
    let expressions: Vec<Value> = selector
        .match_expressions
        .iter()
        .map(|req| {
            let mut value = json!({
                "key": req.key,
                "operator": req.operator.as_str(),
            });
            if !req.values.is_empty() {
                value["values"] = json!(req.values);
            }
            value
        })
        .collect();

    let mut value = json!({});
    if !selector.match_labels.is_empty() {
        value["matchLabels"] = json!(selector.match_labels);
    }
    if !expressions.is_empty() {
        value["matchExpressions"] = Value::Array(expressions);
    }
    value
}

fn ingress_rule_value(rule: &IngressRule) -> Value {
    let mut value = json!({});
    if !rule.from.is_empty() {
        let peers: Vec<Value> = rule
            .from
            .iter()
            .map(|peer| match peer {
                PeerSelector::Pod(selector) => json!({ "podSelector": selector_value(selector) }),
                PeerSelector::Namespace(selector) => {
                    json!({ "namespaceSelector": selector_value(selector) })
                }
            })
            .collect();
        value["from"] = Value::Array(peers);
    }
    if !rule.ports.is_empty() {
        let ports: Vec<Value> = rule
            .ports
            .iter()
            .map(|port| json!({ "protocol": "TCP", "port": port }))
            .collect();
        value["ports"] = Value::Array(ports);
    }
    value
}

/// 정책 객체를 `networking.k8s.io/v1` 네트워크 정책으로 렌더링합니다.
pub fn network_policy_object(domain: &str, policy: &PolicyObject) -> Value {
    let ingress: Vec<Value> = policy.ingress.iter().map(ingress_rule_value).collect();
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": {
            "name": policy.name,
            "namespace": domain,
        },
        "spec": {
            "podSelector": selector_value(&policy.target),
            "policyTypes": ["Ingress"],
            "ingress": ingress,
        },
    })
}

/// 파드에서 유닛 상태를 추출합니다.
///
/// 종료 코드는 처음 종료된 컨테이너에서 가져옵니다.
pub fn unit_status_from_pod(pod: &Pod) -> UnitStatus {
    let Some(status) = pod.status.as_ref() else {
        return UnitStatus::new(UnitPhase::Pending);
    };
    let phase = status
        .phase
        .as_deref()
        .map_or(UnitPhase::Pending, UnitPhase::from_phase_str);
    let exit_code = status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|c| c.state.as_ref()?.terminated.as_ref())
        .map(|t| t.exit_code)
        .next();
    UnitStatus { phase, exit_code }
}

fn typed<K: DeserializeOwned>(kind: ResourceKind, value: Value) -> Result<K, ConformanceError> {
    serde_json::from_value(value)
        .map_err(|e| ConformanceError::ControlPlane(format!("failed to render {kind}: {e}")))
}

/// Kubernetes 클라이언트 에러를 하네스 에러로 변환합니다.
fn map_kube_error(kind: ResourceKind, name: &str, err: kube::Error) -> ConformanceError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ConformanceError::NotFound {
            kind,
            name: name.to_owned(),
        },
        kube::Error::Api(response) if response.code == 409 => ConformanceError::AlreadyExists {
            kind,
            name: name.to_owned(),
        },
        kube::Error::Service(e) => {
            ConformanceError::Connection(format!("{kind} {name}: {e}"))
        }
        other => ConformanceError::ControlPlane(format!("{kind} {name}: {other}")),
    }
}

/// Kubernetes 클러스터 기반 실제 컨트롤 플레인
///
/// 클러스터의 네트워크 정책 구현이 검증 대상 엔진입니다.
pub struct KubeControlPlane {
    client: Client,
    template: PodTemplate,
}

impl KubeControlPlane {
    /// 기존 클라이언트를 감쌉니다.
    pub fn new(client: Client, template: PodTemplate) -> Self {
        Self { client, template }
    }

    /// 현재 kubeconfig 또는 클러스터 내부 설정으로 연결합니다.
    ///
    /// # Errors
    ///
    /// 사용할 수 있는 설정이 없으면 `ConformanceError::Connection`을 반환합니다.
    pub async fn try_default(config: &HarnessConfig) -> Result<Self, ConformanceError> {
        let client = Client::try_default().await.map_err(|e| {
            ConformanceError::Connection(format!("failed to build kubernetes client: {e}"))
        })?;
        Ok(Self::new(client, PodTemplate::from_config(config)))
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn pods(&self, domain: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), domain)
    }

    fn services(&self, domain: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), domain)
    }

    fn network_policies(&self, domain: &str) -> Api<NetworkPolicy> {
        Api::namespaced(self.client.clone(), domain)
    }
}

impl ControlPlane for KubeControlPlane {
    async fn ping(&self) -> Result<(), ConformanceError> {
        let version = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| ConformanceError::Connection(format!("ping failed: {e}")))?;
        debug!(version = %version.git_version, "kubernetes api server reachable");
        Ok(())
    }

    async fn create_domain(&self, manifest: &DomainManifest) -> Result<(), ConformanceError> {
        validate_resource_name(ResourceKind::Domain, &manifest.name)?;
        let namespace: Namespace = typed(ResourceKind::Domain, namespace_object(manifest))?;
        self.namespaces()
            .create(&PostParams::default(), &namespace)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Domain, &manifest.name, e))?;
        Ok(())
    }

    async fn get_domain(&self, name: &str) -> Result<DomainInfo, ConformanceError> {
        let namespace = self
            .namespaces()
            .get(name)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Domain, name, e))?;
        Ok(DomainInfo {
            name: name.to_owned(),
            labels: namespace.metadata.labels.unwrap_or_default(),
            annotations: namespace.metadata.annotations.unwrap_or_default(),
        })
    }

    async fn replace_domain_annotations(
        &self,
        name: &str,
        annotations: &Labels,
    ) -> Result<(), ConformanceError> {
        let api = self.namespaces();
        let mut namespace = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Domain, name, e))?;
        // resourceVersion 없이 무조건 갱신
        namespace.metadata.resource_version = None;
        namespace.metadata.annotations = Some(annotations.clone());
        api.replace(name, &PostParams::default(), &namespace)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Domain, name, e))?;
        Ok(())
    }

    async fn delete_domain(&self, name: &str) -> Result<(), ConformanceError> {
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(ResourceKind::Domain, name, e))?;
        Ok(())
    }

    async fn create_unit(&self, manifest: &UnitManifest) -> Result<(), ConformanceError> {
        validate_resource_name(ResourceKind::Unit, &manifest.name)?;
        let pod: Pod = typed(ResourceKind::Unit, pod_object(manifest, &self.template))?;
        self.pods(&manifest.domain)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Unit, &manifest.name, e))?;
        Ok(())
    }

    async fn get_unit(&self, domain: &str, name: &str) -> Result<UnitStatus, ConformanceError> {
        let pod = self
            .pods(domain)
            .get(name)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Unit, name, e))?;
        Ok(unit_status_from_pod(&pod))
    }

    async fn delete_unit(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        self.pods(domain)
            .delete(name, &params)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Unit, name, e))?;
        Ok(())
    }

    async fn create_endpoint(
        &self,
        manifest: &EndpointManifest,
    ) -> Result<EndpointInfo, ConformanceError> {
        validate_resource_name(ResourceKind::Endpoint, &manifest.name)?;
        let service: Service = typed(ResourceKind::Endpoint, service_object(manifest))?;
        let created = self
            .services(&manifest.domain)
            .create(&PostParams::default(), &service)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Endpoint, &manifest.name, e))?;
        let address = created
            .spec
            .and_then(|spec| spec.cluster_ip)
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| {
                ConformanceError::ControlPlane(format!(
                    "service {}/{} has no cluster IP",
                    manifest.domain, manifest.name
                ))
            })?;
        Ok(EndpointInfo {
            domain: manifest.domain.clone(),
            name: manifest.name.clone(),
            address,
        })
    }

    async fn delete_endpoint(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        self.services(domain)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(ResourceKind::Endpoint, name, e))?;
        Ok(())
    }

    async fn create_policy(
        &self,
        domain: &str,
        policy: &PolicyObject,
    ) -> Result<(), ConformanceError> {
        validate_resource_name(ResourceKind::Policy, &policy.name)?;
        let object: NetworkPolicy =
            typed(ResourceKind::Policy, network_policy_object(domain, policy))?;
        self.network_policies(domain)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| map_kube_error(ResourceKind::Policy, &policy.name, e))?;
        Ok(())
    }

    async fn delete_policy(&self, domain: &str, name: &str) -> Result<(), ConformanceError> {
        self.network_policies(domain)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(ResourceKind::Policy, name, e))?;
        Ok(())
    }
}
