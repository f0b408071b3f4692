#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use fencecheck_conformance::policy::{
    Connection, IngressRule, LabelSelector, PeerSelector, PolicyObject, PolicySet,
};
use fencecheck_core::types::{IsolationMode, Labels, Verdict};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    restrictive: bool,
    /// 정책 목록 (최대 16개로 제한)
    policies: Vec<FuzzPolicy>,
    source_same_domain: bool,
    source_labels: Vec<(u8, u8)>,
    source_domain_labels: Vec<(u8, u8)>,
    dest_labels: Vec<(u8, u8)>,
    port: u16,
}

#[derive(Arbitrary, Debug)]
struct FuzzPolicy {
    target: Vec<(u8, u8)>,
    rules: Vec<FuzzRule>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    pod_peers: Vec<Vec<(u8, u8)>>,
    namespace_peers: Vec<Vec<(u8, u8)>>,
    ports: Vec<u16>,
}

/// 작은 키/값 공간을 써서 셀렉터가 실제로 매칭되도록 한다
fn labels(pairs: &[(u8, u8)]) -> Labels {
    pairs
        .iter()
        .take(4)
        .map(|(k, v)| (format!("k{}", k % 4), format!("v{}", v % 4)))
        .collect()
}

fn selector(pairs: &[(u8, u8)]) -> LabelSelector {
    LabelSelector {
        match_labels: labels(pairs),
        match_expressions: Vec::new(),
    }
}

fuzz_target!(|input: FuzzInput| {
    let mut set = PolicySet::new("fuzz-a");
    for (index, policy) in input.policies.iter().take(16).enumerate() {
        let ingress = policy.rules.iter().take(4).map(|rule| IngressRule {
            from: rule
                .pod_peers
                .iter()
                .take(4)
                .map(|p| PeerSelector::Pod(selector(p)))
                .chain(
                    rule.namespace_peers
                        .iter()
                        .take(4)
                        .map(|p| PeerSelector::Namespace(selector(p))),
                )
                .collect(),
            ports: rule.ports.iter().take(4).map(|p| p.max(&1)).copied().collect(),
        });
        let object = PolicyObject::new(format!("p-{index}"), selector(&policy.target), ingress);
        let _ = set.apply(object);
    }

    let source_labels = labels(&input.source_labels);
    let source_domain_labels = labels(&input.source_domain_labels);
    let dest_labels = labels(&input.dest_labels);
    let conn = Connection {
        source_domain: if input.source_same_domain { "fuzz-a" } else { "fuzz-b" },
        source_labels: &source_labels,
        source_domain_labels: &source_domain_labels,
        port: input.port,
    };

    let mode = if input.restrictive {
        IsolationMode::Restrictive
    } else {
        IsolationMode::Permissive
    };
    let decision = set.decide(mode, &dest_labels, &conn);

    // 허용 모드는 항상 허용
    if mode == IsolationMode::Permissive {
        assert_eq!(decision.verdict, Verdict::Allow);
    }
    // 정책이 없으면 격리 모드에서는 항상 거부
    if mode == IsolationMode::Restrictive && set.is_empty() {
        assert_eq!(decision.verdict, Verdict::Deny);
    }
});
