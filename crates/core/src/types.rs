//! 도메인 타입 -- 하네스 전역에서 사용되는 공통 타입
//!
//! 컴퓨트 유닛의 라벨, 생명주기 단계, 격리 도메인의 격리 모드,
//! 그리고 연결 판정 결과를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 라벨 집합 (key -> value)
///
/// 셀렉터 매칭에 사용됩니다. 순서는 의미가 없지만 출력 안정성을 위해
/// `BTreeMap`을 사용합니다.
pub type Labels = BTreeMap<String, String>;

/// 서버/클라이언트 유닛을 식별하는 라벨 키
///
/// 정책의 pod selector가 이 라벨로 유닛을 선택합니다.
pub const POD_NAME_LABEL: &str = "pod-name";

/// 단일 `pod-name` 라벨로 구성된 라벨 집합을 생성합니다.
pub fn pod_name_labels(name: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(POD_NAME_LABEL.to_owned(), name.to_owned());
    labels
}

/// 컴퓨트 유닛의 생명주기 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    /// 생성되었으나 아직 실행되지 않음
    Pending,
    /// 실행 중
    Running,
    /// 종료 코드 0으로 종료됨
    Succeeded,
    /// 0이 아닌 종료 코드로 종료됨
    Failed,
    /// 컨트롤 플레인이 상태를 보고하지 못함
    Unknown,
}

impl UnitPhase {
    /// 더 이상 상태가 바뀌지 않는 단계인지 확인합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// 컨트롤 플레인이 보고하는 단계 문자열을 변환합니다.
    ///
    /// 알 수 없는 값은 `Unknown`으로 취급합니다.
    pub fn from_phase_str(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// 고정된 단계명을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 컴퓨트 유닛의 관측 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// 현재 단계
    pub phase: UnitPhase,
    /// 종료 코드 (종료된 경우에만)
    pub exit_code: Option<i32>,
}

impl UnitStatus {
    /// 아직 종료되지 않은 유닛의 상태를 생성합니다.
    pub fn new(phase: UnitPhase) -> Self {
        Self {
            phase,
            exit_code: None,
        }
    }

    /// 종료 코드로부터 종료 상태를 생성합니다.
    pub fn terminated(exit_code: i32) -> Self {
        let phase = if exit_code == 0 {
            UnitPhase::Succeeded
        } else {
            UnitPhase::Failed
        };
        Self {
            phase,
            exit_code: Some(exit_code),
        }
    }

    /// 유닛이 성공적으로 종료되었는지 확인합니다.
    ///
    /// 단계가 `Succeeded`이고 종료 코드가 보고되었다면 0이어야 합니다.
    pub fn exited_successfully(&self) -> bool {
        self.phase == UnitPhase::Succeeded && self.exit_code.is_none_or(|code| code == 0)
    }
}

/// 격리 도메인의 기본 연결 정책
///
/// `Permissive`에서는 정책 객체가 무시되고 모든 연결이 허용됩니다.
/// `Restrictive`에서는 매칭되는 허용 규칙이 없으면 연결이 거부됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// 기본 허용
    #[default]
    Permissive,
    /// 기본 거부 (DefaultDeny)
    Restrictive,
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permissive => f.write_str("permissive"),
            Self::Restrictive => f.write_str("restrictive"),
        }
    }
}

/// 연결 허용 여부 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 연결 허용
    Allow,
    /// 연결 거부
    Deny,
}

impl Verdict {
    /// 허용 판정인지 확인합니다.
    pub fn is_allow(self) -> bool {
        self == Self::Allow
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// 프로브가 관측한 연결 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    /// 연결 성공 (종료 코드 0)
    Connected,
    /// 연결 실패 (0이 아닌 종료 코드)
    NotConnected,
}

impl ProbeResult {
    /// 종료된 프로브 유닛의 상태로부터 결과를 결정합니다.
    pub fn from_status(status: &UnitStatus) -> Self {
        if status.exited_successfully() {
            Self::Connected
        } else {
            Self::NotConnected
        }
    }

    /// 관측 결과를 판정 값으로 변환합니다.
    pub fn verdict(self) -> Verdict {
        match self {
            Self::Connected => Verdict::Allow,
            Self::NotConnected => Verdict::Deny,
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::NotConnected => f.write_str("not-connected"),
        }
    }
}

/// 시나리오가 생성하는 컨트롤 플레인 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// 격리 도메인 (namespace)
    Domain,
    /// 컴퓨트 유닛 (pod)
    Unit,
    /// 네트워크 엔드포인트 (service)
    Endpoint,
    /// 정책 객체 (network policy)
    Policy,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => f.write_str("domain"),
            Self::Unit => f.write_str("unit"),
            Self::Endpoint => f.write_str("endpoint"),
            Self::Policy => f.write_str("policy"),
        }
    }
}
