//! 시나리오 정의 -- 토폴로지, 단계 목록, 유효성 검증, 로컬 모델 예측
//!
//! [`Scenario`]는 도메인 별칭 목록, 서버 하나, 그리고 순서대로 실행되는
//! 단계([`Step`]) 목록으로 구성됩니다. 도메인은 별칭으로 참조되며
//! 실제 이름은 실행할 때마다 새로 만들어집니다.
//!
//! [`ScenarioModel`]은 단계를 로컬 정책 모델에 그대로 재생하여 각 프로브의
//! 예상 판정을 계산합니다. 엔진은 이 값을 선언된 기대와 비교해 시나리오
//! 작성 오류를 경고로 알립니다.

use std::collections::{BTreeMap, HashSet};

use fencecheck_core::config::is_dns_label;
use fencecheck_core::types::{IsolationMode, Labels, Verdict, pod_name_labels};
use serde::{Deserialize, Serialize};

use crate::error::ConformanceError;
use crate::policy::{Connection, PolicyObject, PolicySet};

/// 도메인 별칭 최대 길이
///
/// 실제 도메인 이름은 `{prefix}-{alias}-{run id}`이며 63자를 넘을 수 없습니다.
pub const MAX_ALIAS_LEN: usize = 12;

/// 클라이언트 이름 최대 길이 (프로브 유닛 이름은 `{client}-{step}`)
pub const MAX_CLIENT_LEN: usize = 50;

/// 시나리오에 참여하는 도메인
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// 시나리오 내 별칭
    pub alias: String,
    /// 도메인 라벨
    #[serde(default)]
    pub labels: Labels,
}

impl DomainSpec {
    /// 라벨 없는 도메인을 생성합니다.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            labels: Labels::new(),
        }
    }

    /// 라벨을 추가합니다.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

fn default_server_name() -> String {
    "server".to_owned()
}

/// 서버 유닛 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// 서버가 속한 도메인 별칭
    pub domain: String,
    /// 서버 이름 (`pod-name` 라벨 값)
    #[serde(default = "default_server_name")]
    pub name: String,
    /// 리스닝 포트
    pub ports: Vec<u16>,
}

impl ServerSpec {
    /// `server`라는 이름의 서버를 생성합니다.
    pub fn new(domain: impl Into<String>, ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            domain: domain.into(),
            name: default_server_name(),
            ports: ports.into_iter().collect(),
        }
    }
}

/// 프로브 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// 클라이언트 이름 (`pod-name` 라벨 값)
    pub client: String,
    /// 클라이언트가 실행될 도메인 별칭
    pub domain: String,
    /// 목적지 포트
    pub port: u16,
    /// 기대 판정
    pub expect: Verdict,
}

impl ProbeSpec {
    /// 연결 성공을 기대하는 프로브
    pub fn allow(client: impl Into<String>, domain: impl Into<String>, port: u16) -> Self {
        Self {
            client: client.into(),
            domain: domain.into(),
            port,
            expect: Verdict::Allow,
        }
    }

    /// 연결 실패를 기대하는 프로브
    pub fn deny(client: impl Into<String>, domain: impl Into<String>, port: u16) -> Self {
        Self {
            client: client.into(),
            domain: domain.into(),
            port,
            expect: Verdict::Deny,
        }
    }
}

/// 시나리오 단계
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// 도메인의 격리 모드 변경
    SetIsolation {
        /// 도메인 별칭
        domain: String,
        /// 새 격리 모드
        mode: IsolationMode,
    },
    /// 정책 객체 적용
    ApplyPolicy {
        /// 도메인 별칭
        domain: String,
        /// 정책 객체
        policy: PolicyObject,
    },
    /// 연결 프로브
    Probe(ProbeSpec),
}

/// 적합성 시나리오
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// 시나리오 이름
    pub name: String,
    /// 설명
    #[serde(default)]
    pub description: String,
    /// 참여 도메인
    pub domains: Vec<DomainSpec>,
    /// 서버
    pub server: ServerSpec,
    /// 단계 목록 (순서대로 실행)
    pub steps: Vec<Step>,
}

impl Scenario {
    /// 격리 모드 설정, 정책 적용, 프로브 순서의 단순 시나리오를 생성합니다.
    ///
    /// 정책은 모두 서버 도메인에 적용되며, 격리 모드도 서버 도메인에 설정됩니다.
    pub fn simple(
        name: impl Into<String>,
        domains: Vec<DomainSpec>,
        server: ServerSpec,
        policies: Vec<PolicyObject>,
        mode: IsolationMode,
        probes: Vec<ProbeSpec>,
    ) -> Self {
        let mut steps = Vec::with_capacity(policies.len() + probes.len() + 1);
        steps.push(Step::SetIsolation {
            domain: server.domain.clone(),
            mode,
        });
        steps.extend(policies.into_iter().map(|policy| Step::ApplyPolicy {
            domain: server.domain.clone(),
            policy,
        }));
        steps.extend(probes.into_iter().map(Step::Probe));
        Self {
            name: name.into(),
            description: String::new(),
            domains,
            server,
            steps,
        }
    }

    /// 설명을 설정합니다.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 프로브 단계를 (단계 인덱스, 프로브) 쌍으로 반환합니다.
    pub fn probes(&self) -> impl Iterator<Item = (usize, &ProbeSpec)> {
        self.steps.iter().enumerate().filter_map(|(i, step)| match step {
            Step::Probe(probe) => Some((i, probe)),
            _ => None,
        })
    }

    /// 별칭으로 도메인 정의를 찾습니다.
    pub fn domain(&self, alias: &str) -> Option<&DomainSpec> {
        self.domains.iter().find(|d| d.alias == alias)
    }

    /// 프로브 유닛 이름을 반환합니다.
    pub fn probe_unit_name(client: &str, step: usize) -> String {
        format!("{client}-{step}")
    }

    /// 시나리오 정의의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConformanceError> {
        let invalid = |reason: String| ConformanceError::ScenarioValidation {
            scenario: if self.name.is_empty() {
                "(unnamed)".to_owned()
            } else {
                self.name.clone()
            },
            reason,
        };

        if !is_dns_label(&self.name) {
            return Err(invalid(
                "scenario name must be a lowercase DNS label".to_owned(),
            ));
        }

        if self.domains.is_empty() {
            return Err(invalid("at least one domain is required".to_owned()));
        }

        let mut aliases = HashSet::new();
        for domain in &self.domains {
            if !is_dns_label(&domain.alias) || domain.alias.len() > MAX_ALIAS_LEN {
                return Err(invalid(format!(
                    "domain alias '{}' must be a lowercase DNS label of at most {MAX_ALIAS_LEN} characters",
                    domain.alias
                )));
            }
            if !aliases.insert(domain.alias.as_str()) {
                return Err(invalid(format!("duplicate domain alias '{}'", domain.alias)));
            }
        }

        let known = |alias: &str, what: &str| {
            if aliases.contains(alias) {
                Ok(())
            } else {
                Err(invalid(format!("{what} refers to unknown domain '{alias}'")))
            }
        };

        known(&self.server.domain, "server")?;
        if !is_dns_label(&self.server.name) {
            return Err(invalid(format!(
                "server name '{}' must be a lowercase DNS label",
                self.server.name
            )));
        }
        if self.server.ports.is_empty() {
            return Err(invalid("server must listen on at least one port".to_owned()));
        }
        if self.server.ports.contains(&0) {
            return Err(invalid("server port 0 is not a valid port".to_owned()));
        }
        let unique_ports: HashSet<u16> = self.server.ports.iter().copied().collect();
        if unique_ports.len() != self.server.ports.len() {
            return Err(invalid("server ports must be unique".to_owned()));
        }

        let mut probe_count = 0usize;
        let mut policy_names: HashSet<(&str, &str)> = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::SetIsolation { domain, .. } => {
                    known(domain, &format!("step {index}"))?;
                }
                Step::ApplyPolicy { domain, policy } => {
                    known(domain, &format!("step {index}"))?;
                    policy
                        .validate()
                        .map_err(|e| invalid(format!("step {index}: {e}")))?;
                    // 같은 도메인에 같은 이름으로 두 번 생성할 수 없음
                    if !policy_names.insert((domain.as_str(), policy.name.as_str())) {
                        return Err(invalid(format!(
                            "step {index}: policy '{}' is already applied in domain '{domain}'",
                            policy.name
                        )));
                    }
                }
                Step::Probe(probe) => {
                    probe_count += 1;
                    known(&probe.domain, &format!("step {index}"))?;
                    if !is_dns_label(&probe.client) || probe.client.len() > MAX_CLIENT_LEN {
                        return Err(invalid(format!(
                            "step {index}: client '{}' must be a lowercase DNS label of at most {MAX_CLIENT_LEN} characters",
                            probe.client
                        )));
                    }
                    if probe.client == self.server.name {
                        return Err(invalid(format!(
                            "step {index}: client must not reuse the server name '{}'",
                            self.server.name
                        )));
                    }
                    if !self.server.ports.contains(&probe.port) {
                        return Err(invalid(format!(
                            "step {index}: server does not listen on port {}",
                            probe.port
                        )));
                    }
                }
            }
        }

        if probe_count == 0 {
            return Err(invalid("scenario has no probes".to_owned()));
        }

        Ok(())
    }
}

/// 시나리오 단계를 재생하는 로컬 정책 모델
///
/// 도메인 이름 대신 별칭을 사용합니다.
#[derive(Debug, Clone)]
pub struct ScenarioModel {
    modes: BTreeMap<String, IsolationMode>,
    policies: BTreeMap<String, PolicySet>,
    domain_labels: BTreeMap<String, Labels>,
    server_domain: String,
    server_labels: Labels,
}

impl ScenarioModel {
    /// 모든 도메인이 허용 모드이고 정책이 없는 초기 상태를 생성합니다.
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            modes: scenario
                .domains
                .iter()
                .map(|d| (d.alias.clone(), IsolationMode::Permissive))
                .collect(),
            policies: scenario
                .domains
                .iter()
                .map(|d| (d.alias.clone(), PolicySet::new(d.alias.clone())))
                .collect(),
            domain_labels: scenario
                .domains
                .iter()
                .map(|d| (d.alias.clone(), d.labels.clone()))
                .collect(),
            server_domain: scenario.server.domain.clone(),
            server_labels: pod_name_labels(&scenario.server.name),
        }
    }

    /// 격리 모드 변경을 반영합니다.
    pub fn set_mode(&mut self, domain: &str, mode: IsolationMode) {
        self.modes.insert(domain.to_owned(), mode);
    }

    /// 정책 적용을 반영합니다.
    pub fn apply_policy(
        &mut self,
        domain: &str,
        policy: &PolicyObject,
    ) -> Result<(), ConformanceError> {
        self.policies
            .entry(domain.to_owned())
            .or_insert_with(|| PolicySet::new(domain))
            .apply(policy.clone())
    }

    /// 현재 상태에서 프로브의 판정을 예측합니다.
    pub fn predict(&self, probe: &ProbeSpec) -> Verdict {
        let mode = self
            .modes
            .get(&self.server_domain)
            .copied()
            .unwrap_or_default();
        let empty = Labels::new();
        let source_labels = pod_name_labels(&probe.client);
        let conn = Connection {
            source_domain: &probe.domain,
            source_labels: &source_labels,
            source_domain_labels: self.domain_labels.get(&probe.domain).unwrap_or(&empty),
            port: probe.port,
        };
        match self.policies.get(&self.server_domain) {
            Some(set) => set.decide(mode, &self.server_labels, &conn).verdict,
            None => crate::policy::decide(
                mode,
                std::iter::empty(),
                &self.server_domain,
                &self.server_labels,
                &conn,
            )
            .verdict,
        }
    }
}
