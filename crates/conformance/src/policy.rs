//! 정책 모델 -- 정책 객체 정의 및 연결 허용 판정
//!
//! [`PolicyObject`]는 대상 셀렉터와 ingress 허용 규칙 목록으로 구성됩니다.
//! [`decide`]는 도메인의 격리 모드와 정책 객체들로부터 후보 연결의
//! 허용/거부를 결정하며, [`PolicySet`]은 한 도메인의 정책 객체를 관리합니다.
//!
//! # 판정 규칙
//!
//! 1. `Permissive` 모드에서는 정책과 무관하게 허용합니다.
//! 2. 대상 유닛을 선택하는 정책이 하나도 없으면 거부합니다.
//! 3. 선택된 정책의 규칙 중 하나라도 연결에 매칭되면 허용합니다.
//!    규칙은 (peer 목록이 비었거나 peer 하나가 소스와 매칭) AND
//!    (포트 목록이 비었거나 목적지 포트가 포함됨)일 때 매칭됩니다.
//! 4. 그 외에는 거부합니다.
//!
//! 허용 규칙만 존재하며 명시적 거부 규칙은 없습니다. 정책 객체를 추가해도
//! 기존 허용이 거부로 바뀌지 않습니다(합집합 의미론). 이 규칙은 실제
//! 정책 엔진이 무엇이든 하네스가 기대값을 계산하는 기준입니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use fencecheck_core::config::is_dns_label;
use fencecheck_core::types::{IsolationMode, Labels, Verdict};

use crate::error::ConformanceError;

/// 한 도메인에 등록할 수 있는 최대 정책 수
pub const MAX_POLICIES: usize = 1000;

/// 셀렉터 표현식 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    /// 키의 값이 목록 중 하나
    In,
    /// 키가 없거나 값이 목록에 없음
    NotIn,
    /// 키가 존재함
    Exists,
    /// 키가 존재하지 않음
    DoesNotExist,
}

impl SelectorOperator {
    /// 컨트롤 플레인 표기 그대로의 연산자 이름을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::NotIn => "NotIn",
            Self::Exists => "Exists",
            Self::DoesNotExist => "DoesNotExist",
        }
    }
}

/// 셀렉터 표현식 (key, operator, values)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRequirement {
    /// 라벨 키
    pub key: String,
    /// 연산자
    pub operator: SelectorOperator,
    /// 비교 값 (In/NotIn에서만 사용)
    #[serde(default)]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.key.is_empty() {
            return Err("selector expression key cannot be empty".to_owned());
        }
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn if self.values.is_empty() => Err(
                format!(
                    "operator {} on key '{}' requires at least one value",
                    self.operator.as_str(),
                    self.key
                ),
            ),
            SelectorOperator::Exists | SelectorOperator::DoesNotExist
                if !self.values.is_empty() =>
            {
                Err(format!(
                    "operator {} on key '{}' must not carry values",
                    self.operator.as_str(),
                    self.key
                ))
            }
            _ => Ok(()),
        }
    }
}

/// 라벨 셀렉터
///
/// `match_labels`의 모든 항목과 `match_expressions`의 모든 표현식을
/// 만족해야 매칭됩니다(AND 조건). 비어있는 셀렉터는 모든 라벨 집합에 매칭됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    /// 정확히 일치해야 하는 라벨
    #[serde(default)]
    pub match_labels: Labels,
    /// 추가 표현식
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// 모든 라벨 집합에 매칭되는 빈 셀렉터를 생성합니다.
    pub fn everything() -> Self {
        Self::default()
    }

    /// 단일 라벨 셀렉터를 생성합니다.
    pub fn with_label(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut match_labels = Labels::new();
        match_labels.insert(key.into(), value.into());
        Self {
            match_labels,
            match_expressions: Vec::new(),
        }
    }

    /// 표현식을 추가합니다.
    pub fn and_expression(mut self, requirement: SelectorRequirement) -> Self {
        self.match_expressions.push(requirement);
        self
    }

    /// 빈 셀렉터인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// 라벨 집합이 이 셀렉터에 매칭되는지 확인합니다.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
            && self.match_expressions.iter().all(|req| req.matches(labels))
    }

    fn validate(&self) -> Result<(), String> {
        if self.match_labels.keys().any(String::is_empty) {
            return Err("selector label key cannot be empty".to_owned());
        }
        self.match_expressions
            .iter()
            .try_for_each(SelectorRequirement::validate)
    }
}

/// ingress 규칙의 peer 셀렉터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSelector {
    /// 정책과 같은 도메인의 유닛 라벨로 선택
    Pod(LabelSelector),
    /// 소스 유닛이 속한 도메인의 라벨로 선택
    Namespace(LabelSelector),
}

impl PeerSelector {
    fn selector(&self) -> &LabelSelector {
        match self {
            Self::Pod(selector) | Self::Namespace(selector) => selector,
        }
    }

    fn matches(&self, policy_domain: &str, conn: &Connection<'_>) -> bool {
        match self {
            Self::Pod(selector) => {
                conn.source_domain == policy_domain && selector.matches(conn.source_labels)
            }
            Self::Namespace(selector) => selector.matches(conn.source_domain_labels),
        }
    }
}

/// ingress 허용 규칙
///
/// 빈 `from`은 모든 소스, 빈 `ports`는 모든 포트를 의미합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// 허용할 소스 셀렉터 목록
    #[serde(default)]
    pub from: Vec<PeerSelector>,
    /// 허용할 목적지 포트 목록 (리스닝 포트 번호)
    #[serde(default)]
    pub ports: Vec<u16>,
}

impl IngressRule {
    /// 모든 소스/모든 포트를 허용하는 규칙을 생성합니다.
    pub fn open() -> Self {
        Self::default()
    }

    /// 특정 포트만 허용하는 규칙을 생성합니다.
    pub fn ports(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            from: Vec::new(),
            ports: ports.into_iter().collect(),
        }
    }

    /// 특정 소스만 허용하는 규칙을 생성합니다.
    pub fn from_peers(peers: impl IntoIterator<Item = PeerSelector>) -> Self {
        Self {
            from: peers.into_iter().collect(),
            ports: Vec::new(),
        }
    }

    /// 모든 트래픽을 허용하는 규칙인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.from.is_empty() && self.ports.is_empty()
    }

    /// 연결이 이 규칙에 매칭되는지 확인합니다.
    pub fn matches(&self, policy_domain: &str, conn: &Connection<'_>) -> bool {
        let peer_matches =
            self.from.is_empty() || self.from.iter().any(|p| p.matches(policy_domain, conn));
        let port_matches = self.ports.is_empty() || self.ports.contains(&conn.port);
        peer_matches && port_matches
    }
}

/// 정책 객체
///
/// `target`이 선택하는 유닛으로 들어오는 트래픽 중 `ingress` 규칙에
/// 매칭되는 것을 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyObject {
    /// 정책 이름 (도메인 내에서 고유)
    pub name: String,
    /// 대상 유닛 셀렉터
    #[serde(default)]
    pub target: LabelSelector,
    /// ingress 허용 규칙
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

impl PolicyObject {
    /// 대상 셀렉터와 규칙으로 정책 객체를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        target: LabelSelector,
        ingress: impl IntoIterator<Item = IngressRule>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            ingress: ingress.into_iter().collect(),
        }
    }

    /// 도메인의 모든 유닛에 모든 트래픽을 허용하는 정책을 생성합니다.
    pub fn allow_all(name: impl Into<String>) -> Self {
        Self::new(name, LabelSelector::everything(), [IngressRule::open()])
    }

    /// 정책의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConformanceError> {
        if !is_dns_label(&self.name) {
            return Err(ConformanceError::PolicyValidation {
                policy: if self.name.is_empty() {
                    "(empty)".to_owned()
                } else {
                    self.name.clone()
                },
                reason: "policy name must be a lowercase DNS label".to_owned(),
            });
        }

        let invalid = |reason: String| ConformanceError::PolicyValidation {
            policy: self.name.clone(),
            reason,
        };

        self.target
            .validate()
            .map_err(|e| invalid(format!("target selector: {e}")))?;

        for (index, rule) in self.ingress.iter().enumerate() {
            if rule.ports.contains(&0) {
                return Err(invalid(format!("rule {index}: port 0 is not a valid port")));
            }
            for peer in &rule.from {
                peer.selector()
                    .validate()
                    .map_err(|e| invalid(format!("rule {index}: peer selector: {e}")))?;
            }
        }

        Ok(())
    }

    /// 이 정책이 주어진 라벨의 유닛을 대상으로 하는지 확인합니다.
    pub fn targets(&self, labels: &Labels) -> bool {
        self.target.matches(labels)
    }
}

/// 판정 대상 연결 (소스 -> 목적지 포트)
#[derive(Debug, Clone, Copy)]
pub struct Connection<'a> {
    /// 소스 유닛이 속한 도메인 이름
    pub source_domain: &'a str,
    /// 소스 유닛 라벨
    pub source_labels: &'a Labels,
    /// 소스 도메인 라벨
    pub source_domain_labels: &'a Labels,
    /// 목적지 리스닝 포트
    pub port: u16,
}

/// 판정 근거
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// 허용 모드라 정책이 무시됨
    PermissiveMode,
    /// 대상 유닛을 선택하는 정책이 없음
    NoPolicySelectsTarget,
    /// 정책은 있으나 매칭되는 규칙이 없음
    NoRuleMatched,
    /// 규칙이 매칭됨
    RuleMatched {
        /// 매칭된 정책 이름
        policy: String,
        /// 정책 내 규칙 인덱스
        rule_index: usize,
    },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissiveMode => f.write_str("domain is permissive"),
            Self::NoPolicySelectsTarget => f.write_str("no policy selects the target"),
            Self::NoRuleMatched => f.write_str("no ingress rule matches"),
            Self::RuleMatched { policy, rule_index } => {
                write!(f, "allowed by {policy} rule {rule_index}")
            }
        }
    }
}

/// 판정 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// 허용/거부
    pub verdict: Verdict,
    /// 판정 근거
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            verdict: Verdict::Deny,
            reason,
        }
    }
}

/// 후보 연결의 허용 여부를 판정합니다.
///
/// `policies`는 목적지 유닛이 속한 도메인(`policy_domain`)의 정책 객체입니다.
/// 대상 셀렉터 매칭은 이 함수가 수행하므로 도메인의 모든 정책을 넘기면 됩니다.
pub fn decide<'p>(
    mode: IsolationMode,
    policies: impl IntoIterator<Item = &'p PolicyObject>,
    policy_domain: &str,
    dest_labels: &Labels,
    conn: &Connection<'_>,
) -> Decision {
    if mode == IsolationMode::Permissive {
        return Decision::allow(DecisionReason::PermissiveMode);
    }

    let mut any_selected = false;
    for policy in policies.into_iter().filter(|p| p.targets(dest_labels)) {
        any_selected = true;
        if let Some(rule_index) = policy
            .ingress
            .iter()
            .position(|rule| rule.matches(policy_domain, conn))
        {
            return Decision::allow(DecisionReason::RuleMatched {
                policy: policy.name.clone(),
                rule_index,
            });
        }
    }

    if any_selected {
        Decision::deny(DecisionReason::NoRuleMatched)
    } else {
        Decision::deny(DecisionReason::NoPolicySelectsTarget)
    }
}

/// 한 도메인의 정책 객체 집합
///
/// 같은 이름의 정책을 다시 적용하면 기존 정책을 대체합니다.
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// 정책이 속한 도메인
    domain: String,
    /// 적용 순서대로 보관된 정책 목록
    policies: Vec<PolicyObject>,
}

impl PolicySet {
    /// 빈 정책 집합을 생성합니다.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            policies: Vec::new(),
        }
    }

    /// 정책이 속한 도메인 이름을 반환합니다.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// 정책을 적용합니다.
    ///
    /// 같은 이름의 정책이 있으면 대체합니다.
    pub fn apply(&mut self, policy: PolicyObject) -> Result<(), ConformanceError> {
        policy.validate()?;

        if let Some(existing) = self.policies.iter_mut().find(|p| p.name == policy.name) {
            *existing = policy;
            return Ok(());
        }

        if self.policies.len() >= MAX_POLICIES {
            return Err(ConformanceError::PolicyValidation {
                policy: policy.name,
                reason: format!("maximum policy count ({MAX_POLICIES}) reached"),
            });
        }

        self.policies.push(policy);
        Ok(())
    }

    /// 정책을 이름으로 제거합니다. 제거되었으면 `true`를 반환합니다.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.policies.len();
        self.policies.retain(|p| p.name != name);
        self.policies.len() != before
    }

    /// 등록된 정책 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// 등록된 정책이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// 등록된 정책 목록을 반환합니다 (읽기 전용).
    pub fn policies(&self) -> &[PolicyObject] {
        &self.policies
    }

    /// 이 도메인의 유닛으로 향하는 연결을 판정합니다.
    pub fn decide(
        &self,
        mode: IsolationMode,
        dest_labels: &Labels,
        conn: &Connection<'_>,
    ) -> Decision {
        decide(mode, &self.policies, &self.domain, dest_labels, conn)
    }
}
