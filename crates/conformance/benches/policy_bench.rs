//! 정책 판정 벤치마크
//!
//! 정책 수 증가에 따른 판정 비용과 셀렉터 매칭 비용을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fencecheck_conformance::policy::{
    Connection, IngressRule, LabelSelector, PeerSelector, PolicyObject, PolicySet,
    SelectorOperator, SelectorRequirement,
};
use fencecheck_core::types::{IsolationMode, Labels, pod_name_labels};

const DOMAIN: &str = "bench-a";

fn domain_labels(name: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert("ns-name".to_owned(), name.to_owned());
    labels
}

/// 서버를 대상으로 하지만 클라이언트와는 매칭되지 않는 정책
fn unrelated_policy(index: usize) -> PolicyObject {
    PolicyObject::new(
        format!("p-{index}"),
        LabelSelector::with_label("pod-name", "server"),
        [IngressRule {
            from: vec![PeerSelector::Pod(LabelSelector::with_label(
                "pod-name",
                format!("client-{index}"),
            ))],
            ports: vec![81],
        }],
    )
}

fn bench_single_policy_decision(c: &mut Criterion) {
    let mut set = PolicySet::new(DOMAIN);
    set.apply(PolicyObject::new(
        "allow-client-a",
        LabelSelector::with_label("pod-name", "server"),
        [IngressRule::from_peers([PeerSelector::Pod(
            LabelSelector::with_label("pod-name", "client-a"),
        )])],
    ))
    .unwrap();

    let server = pod_name_labels("server");
    let client = pod_name_labels("client-a");
    let ns = domain_labels("a");
    let conn = Connection {
        source_domain: DOMAIN,
        source_labels: &client,
        source_domain_labels: &ns,
        port: 80,
    };

    let mut group = c.benchmark_group("single_policy");
    group.throughput(Throughput::Elements(1));

    group.bench_function("decide", |b| {
        b.iter(|| set.decide(IsolationMode::Restrictive, black_box(&server), black_box(&conn)))
    });

    group.finish();
}

fn bench_policy_scaling(c: &mut Criterion) {
    let server = pod_name_labels("server");
    let client = pod_name_labels("client-x");
    let ns = domain_labels("a");
    let conn = Connection {
        source_domain: DOMAIN,
        source_labels: &client,
        source_domain_labels: &ns,
        port: 80,
    };

    let mut group = c.benchmark_group("policy_scaling");

    // 매칭되는 규칙이 없어 모든 정책을 훑는 최악의 경우
    for policy_count in [1usize, 10, 100].iter() {
        let mut set = PolicySet::new(DOMAIN);
        for i in 0..*policy_count {
            set.apply(unrelated_policy(i)).unwrap();
        }

        group.throughput(Throughput::Elements(*policy_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(policy_count),
            policy_count,
            |b, _| {
                b.iter(|| {
                    set.decide(IsolationMode::Restrictive, black_box(&server), black_box(&conn))
                })
            },
        );
    }

    group.finish();
}

fn bench_selector_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_matching");
    group.throughput(Throughput::Elements(1));

    let mut labels = pod_name_labels("server");
    labels.insert("tier".to_owned(), "backend".to_owned());
    labels.insert("env".to_owned(), "prod".to_owned());

    let simple = LabelSelector::with_label("pod-name", "server");
    group.bench_function("match_labels", |b| {
        b.iter(|| simple.matches(black_box(&labels)))
    });

    let expressions = LabelSelector::with_label("pod-name", "server")
        .and_expression(SelectorRequirement {
            key: "tier".to_owned(),
            operator: SelectorOperator::In,
            values: vec!["frontend".to_owned(), "backend".to_owned()],
        })
        .and_expression(SelectorRequirement {
            key: "canary".to_owned(),
            operator: SelectorOperator::DoesNotExist,
            values: Vec::new(),
        });
    group.bench_function("match_expressions", |b| {
        b.iter(|| expressions.matches(black_box(&labels)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_policy_decision,
    bench_policy_scaling,
    bench_selector_matching,
);
criterion_main!(benches);
