//! 시나리오 엔진 -- 프로비저닝, 단계 실행, 판정, 정리 전체 흐름 관리
//!
//! [`ScenarioEngine`]은 시나리오 하나를 다음 순서로 실행합니다.
//!
//! ```text
//! Provisioning ──> Ready ──> PolicyApplied <──> Probing ──> Asserting ──> TearingDown ──> Done
//!      │             │             │               │                          ▲
//!      └─────────────┴─────────────┴───────────────┴──> Failed ───────────────┘
//! ```
//!
//! - 도메인 이름은 실행마다 `{prefix}-{alias}-{run id}`로 새로 만들어집니다.
//! - 기대와 다른 프로브가 있어도 나머지 프로브는 계속 실행됩니다.
//! - 프로브 인프라 에러는 셋업 에러이며 나머지 단계를 중단합니다.
//!   그 전에 관측된 불일치는 셋업 에러 판정에 함께 남습니다.
//! - 정리는 성공/실패/에러와 무관하게 정확히 한 번, 생성 역순으로 실행됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fencecheck_core::metrics as m;
use fencecheck_core::types::UnitPhase;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cluster::ControlPlane;
use crate::config::HarnessConfig;
use crate::error::ConformanceError;
use crate::isolation::IsolationController;
use crate::ledger::ResourceLedger;
use crate::probe::{ProbeTarget, Prober};
use crate::provisioner::Provisioner;
use crate::report::{PhaseTransition, ProbeRecord, ScenarioReport, ScenarioVerdict, SuiteReport};
use crate::scenario::{Scenario, ScenarioModel, Step};
use crate::wait::{BoundedWait, WaitOutcome, call_with_timeout, duration_ms, wait_for_unit};

/// 시나리오 실행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    /// 도메인, 서버, 엔드포인트 생성 및 서버 준비 대기
    Provisioning,
    /// 서버가 Running
    Ready,
    /// 격리 모드/정책 적용 중
    PolicyApplied,
    /// 프로브 실행 중
    Probing,
    /// 프로브 결과 판정
    Asserting,
    /// 리소스 정리
    TearingDown,
    /// 완료
    Done,
    /// 셋업 에러
    Failed,
}

impl ScenarioPhase {
    /// 고정된 단계명을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::PolicyApplied => "policy_applied",
            Self::Probing => "probing",
            Self::Asserting => "asserting",
            Self::TearingDown => "tearing_down",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// 허용된 전이인지 확인합니다.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ScenarioPhase::*;
        matches!(
            (self, next),
            (Provisioning, Ready | Failed)
                | (Ready, PolicyApplied | Probing | Asserting | Failed)
                | (PolicyApplied, Probing | Asserting | Failed)
                | (Probing, PolicyApplied | Asserting | Failed)
                | (Asserting | Failed, TearingDown)
                | (TearingDown, Done)
        )
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단계 전이 기록기
struct PhaseTracker<'a> {
    scenario: &'a str,
    phase: ScenarioPhase,
    trail: Vec<PhaseTransition>,
    started: Instant,
}

impl<'a> PhaseTracker<'a> {
    fn new(scenario: &'a str, started: Instant) -> Self {
        Self {
            scenario,
            phase: ScenarioPhase::Provisioning,
            trail: Vec::new(),
            started,
        }
    }

    fn advance(&mut self, next: ScenarioPhase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        debug!(
            scenario = self.scenario,
            from = %self.phase,
            to = %next,
            "scenario phase transition"
        );
        self.trail.push(PhaseTransition {
            from: self.phase,
            to: next,
            elapsed_ms: duration_ms(self.started.elapsed()),
        });
        self.phase = next;
    }
}

/// 시나리오 엔진
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use fencecheck_conformance::{HarnessConfig, MemoryControlPlane, ScenarioEngine, standard_scenarios};
///
/// let engine = ScenarioEngine::new(Arc::new(MemoryControlPlane::new()), HarnessConfig::default())?;
/// let suite = engine.run_all(&standard_scenarios()).await;
/// println!("{suite}");
/// ```
pub struct ScenarioEngine<C: ControlPlane> {
    /// 엔진 설정
    config: HarnessConfig,
    /// 컨트롤 플레인 (공유)
    control_plane: Arc<C>,
    /// 리소스 프로비저너
    provisioner: Provisioner<C>,
    /// 격리 모드 컨트롤러
    isolation: IsolationController<C>,
    /// 프로브 실행기
    prober: Prober<C>,
}

impl<C: ControlPlane> ScenarioEngine<C> {
    /// 새 엔진을 생성합니다.
    pub fn new(control_plane: Arc<C>, config: HarnessConfig) -> Result<Self, ConformanceError> {
        config.validate()?;
        let api_timeout = config.api_timeout();
        Ok(Self {
            provisioner: Provisioner::new(Arc::clone(&control_plane), api_timeout),
            isolation: IsolationController::new(
                Arc::clone(&control_plane),
                config.isolation_annotation.clone(),
                api_timeout,
            ),
            prober: Prober::new(
                Arc::clone(&control_plane),
                api_timeout,
                BoundedWait::new(config.probe_timeout(), config.poll_interval()),
                config.deny_timeout,
            ),
            control_plane,
            config,
        })
    }

    /// 엔진 설정을 반환합니다.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// 컨트롤 플레인에 접근 가능한지 확인합니다.
    pub async fn check_connectivity(&self) -> Result<(), ConformanceError> {
        call_with_timeout(
            "ping control plane",
            self.config.api_timeout(),
            self.control_plane.ping(),
        )
        .await
    }

    /// 시나리오를 순서대로 실행합니다.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> SuiteReport {
        let mut suite = SuiteReport::default();
        for scenario in scenarios {
            suite.reports.push(self.run(scenario).await);
        }
        info!(
            total = suite.reports.len(),
            passed = suite.passed(),
            failed = suite.failed(),
            errored = suite.errored(),
            "suite finished"
        );
        suite
    }

    /// 시나리오 하나를 실행하고 결과를 반환합니다.
    ///
    /// 이 함수는 실패하지 않습니다. 모든 에러는 보고서의 판정에 담깁니다.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let run_id = new_run_id();
        let mut tracker = PhaseTracker::new(&scenario.name, started);
        let mut ledger = ResourceLedger::new();
        let mut probes = Vec::new();

        info!(scenario = %scenario.name, run_id = %run_id, "scenario started");

        let outcome = match scenario.validate() {
            Ok(()) => {
                self.execute(scenario, &run_id, &mut ledger, &mut tracker, &mut probes)
                    .await
            }
            Err(e) => Err(e),
        };

        let mismatches: Vec<ProbeRecord> = probes
            .iter()
            .filter(|p| !p.matches_expectation())
            .cloned()
            .collect();
        let verdict = match outcome {
            Ok(()) if mismatches.is_empty() => ScenarioVerdict::Pass,
            Ok(()) => ScenarioVerdict::Fail { mismatches },
            Err(e) => {
                let stage = tracker.phase;
                error!(
                    scenario = %scenario.name,
                    run_id = %run_id,
                    phase = %stage,
                    error = %e,
                    mismatches = mismatches.len(),
                    "scenario setup error"
                );
                tracker.advance(ScenarioPhase::Failed);
                ScenarioVerdict::SetupError {
                    stage,
                    reason: e.to_string(),
                    mismatches,
                }
            }
        };

        tracker.advance(ScenarioPhase::TearingDown);
        let teardown_failures = ledger
            .teardown(self.control_plane.as_ref(), self.config.api_timeout())
            .await;
        tracker.advance(ScenarioPhase::Done);

        let elapsed = started.elapsed();
        metrics::counter!(m::SCENARIOS_TOTAL, m::LABEL_RESULT => verdict.result_name())
            .increment(1);
        metrics::histogram!(m::SCENARIO_DURATION_SECONDS).record(elapsed.as_secs_f64());

        info!(
            scenario = %scenario.name,
            run_id = %run_id,
            result = verdict.result_name(),
            probes = probes.len(),
            teardown_failures = teardown_failures.len(),
            duration_ms = duration_ms(elapsed),
            "scenario finished"
        );

        ScenarioReport {
            scenario: scenario.name.clone(),
            run_id,
            verdict,
            probes,
            teardown_failures,
            trail: tracker.trail,
            duration_ms: duration_ms(elapsed),
        }
    }

    /// 시나리오 본문을 실행합니다. 에러가 나면 그 시점의 단계가 실패 단계입니다.
    async fn execute(
        &self,
        scenario: &Scenario,
        run_id: &str,
        ledger: &mut ResourceLedger,
        tracker: &mut PhaseTracker<'_>,
        probes: &mut Vec<ProbeRecord>,
    ) -> Result<(), ConformanceError> {
        let names = DomainNames::new(scenario, &self.config.domain_prefix, run_id);

        for domain in &scenario.domains {
            self.provisioner
                .create_domain(ledger, names.resolve(&domain.alias)?, domain.labels.clone())
                .await?;
        }

        let server_domain = names.resolve(&scenario.server.domain)?;
        self.provisioner
            .create_server(
                ledger,
                server_domain,
                &scenario.server.name,
                &scenario.server.ports,
            )
            .await?;
        let endpoint = self
            .provisioner
            .create_endpoint(
                ledger,
                server_domain,
                &scenario.server.name,
                &scenario.server.ports,
            )
            .await?;

        self.wait_for_server(server_domain, &scenario.server.name)
            .await?;
        tracker.advance(ScenarioPhase::Ready);

        let mut model = ScenarioModel::new(scenario);
        for (index, step) in scenario.steps.iter().enumerate() {
            match step {
                Step::SetIsolation { domain, mode } => {
                    tracker.advance(ScenarioPhase::PolicyApplied);
                    self.isolation.set_mode(names.resolve(domain)?, *mode).await?;
                    model.set_mode(domain, *mode);
                }
                Step::ApplyPolicy { domain, policy } => {
                    tracker.advance(ScenarioPhase::PolicyApplied);
                    self.provisioner
                        .apply_policy(ledger, names.resolve(domain)?, policy)
                        .await?;
                    model.apply_policy(domain, policy)?;
                }
                Step::Probe(probe) => {
                    tracker.advance(ScenarioPhase::Probing);
                    let unit = Scenario::probe_unit_name(&probe.client, index);
                    let observed = self
                        .prober
                        .probe(
                            ledger,
                            ProbeTarget {
                                domain: names.resolve(&probe.domain)?,
                                unit: &unit,
                                client: &probe.client,
                                address: &endpoint.address,
                                port: probe.port,
                            },
                            probe.expect,
                        )
                        .await?;

                    let record = ProbeRecord {
                        step: index,
                        client: probe.client.clone(),
                        domain: probe.domain.clone(),
                        port: probe.port,
                        expected: probe.expect,
                        observed,
                        model: model.predict(probe),
                    };
                    self.observe(&scenario.name, &record);
                    probes.push(record);
                }
            }
        }

        tracker.advance(ScenarioPhase::Asserting);
        Ok(())
    }

    async fn wait_for_server(&self, domain: &str, server: &str) -> Result<(), ConformanceError> {
        let wait = BoundedWait::new(self.config.ready_timeout(), self.config.poll_interval());
        let outcome = wait_for_unit(
            self.control_plane.as_ref(),
            domain,
            server,
            |status| status.phase == UnitPhase::Running || status.phase.is_terminal(),
            wait,
            self.config.api_timeout(),
        )
        .await?;

        match outcome {
            WaitOutcome::Ready(status) if status.phase == UnitPhase::Running => {
                info!(domain, unit = server, "server is running");
                Ok(())
            }
            WaitOutcome::Ready(status) => Err(ConformanceError::ControlPlane(format!(
                "server {domain}/{server} exited before becoming ready (phase {})",
                status.phase
            ))),
            WaitOutcome::TimedOut => Err(ConformanceError::Timeout {
                operation: format!("wait for server {domain}/{server} to run"),
                waited_ms: duration_ms(wait.timeout),
            }),
        }
    }

    fn observe(&self, scenario: &str, record: &ProbeRecord) {
        let matched = record.matches_expectation();
        metrics::counter!(
            m::PROBES_TOTAL,
            m::LABEL_EXPECTED => record.expected.to_string(),
            m::LABEL_RESULT => if matched { "match" } else { "mismatch" }
        )
        .increment(1);

        if !matched {
            warn!(
                scenario,
                step = record.step,
                client = %record.client,
                port = record.port,
                expected = %record.expected,
                observed = %record.observed,
                "probe did not match expectation"
            );
        }
        if !record.model_agrees() {
            warn!(
                scenario,
                step = record.step,
                expected = %record.expected,
                model = %record.model,
                "declared expectation disagrees with the policy model"
            );
        }
    }
}

/// 별칭 -> 실행별 도메인 이름
struct DomainNames<'s> {
    scenario: &'s str,
    names: BTreeMap<&'s str, String>,
}

impl<'s> DomainNames<'s> {
    fn new(scenario: &'s Scenario, prefix: &str, run_id: &str) -> Self {
        Self {
            scenario: &scenario.name,
            names: scenario
                .domains
                .iter()
                .map(|d| (d.alias.as_str(), format!("{prefix}-{}-{run_id}", d.alias)))
                .collect(),
        }
    }

    fn resolve(&self, alias: &str) -> Result<&str, ConformanceError> {
        self.names
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| ConformanceError::ScenarioValidation {
                scenario: self.scenario.to_owned(),
                reason: format!("unknown domain '{alias}'"),
            })
    }
}

/// 8자리 실행 식별자를 생성합니다.
fn new_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use fencecheck_core::types::{IsolationMode, ResourceKind};

    use super::*;
    use crate::config::{DenyTimeout, HarnessConfigBuilder};
    use crate::memory::MemoryControlPlane;
    use crate::policy::{IngressRule, LabelSelector, PolicyObject};
    use crate::scenario::{DomainSpec, ProbeSpec, ServerSpec};

    fn config() -> HarnessConfig {
        HarnessConfigBuilder::new()
            .domain_prefix("np")
            .ready_timeout_secs(5)
            .probe_timeout_secs(3)
            .connect_timeout_secs(1)
            .poll_interval_ms(100)
            .build()
            .unwrap()
    }

    fn engine(cp: MemoryControlPlane) -> (Arc<MemoryControlPlane>, ScenarioEngine<MemoryControlPlane>) {
        let cp = Arc::new(cp);
        let engine = ScenarioEngine::new(Arc::clone(&cp), config()).unwrap();
        (cp, engine)
    }

    fn ports_scenario() -> Scenario {
        Scenario::simple(
            "ports",
            vec![DomainSpec::new("a")],
            ServerSpec::new("a", [80, 81]),
            vec![PolicyObject::new(
                "allow-ingress-on-port-81",
                LabelSelector::with_label("pod-name", "server"),
                [IngressRule::ports([81])],
            )],
            IsolationMode::Restrictive,
            vec![
                ProbeSpec::deny("client-a", "a", 80),
                ProbeSpec::allow("client-b", "a", 81),
            ],
        )
    }

    #[test]
    fn phase_transitions() {
        use ScenarioPhase::*;
        assert!(Provisioning.can_transition_to(Ready));
        assert!(Provisioning.can_transition_to(Failed));
        assert!(Probing.can_transition_to(PolicyApplied));
        assert!(Failed.can_transition_to(TearingDown));
        assert!(TearingDown.can_transition_to(Done));
        assert!(!Provisioning.can_transition_to(Probing));
        assert!(!Failed.can_transition_to(Done));
        assert!(!Done.can_transition_to(Provisioning));
        assert!(!Asserting.can_transition_to(Done));
    }

    #[test]
    fn run_id_is_short_and_unique() {
        let a = new_run_id();
        let b = new_run_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn engine_rejects_invalid_config() {
        let config = HarnessConfig {
            poll_interval_ms: 0,
            ..HarnessConfig::default()
        };
        assert!(ScenarioEngine::new(Arc::new(MemoryControlPlane::new()), config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn passing_scenario_leaves_nothing_behind() {
        let (cp, engine) = engine(MemoryControlPlane::new());
        let report = engine.run(&ports_scenario()).await;
        assert_eq!(report.verdict, ScenarioVerdict::Pass, "{report}");
        assert_eq!(report.probes.len(), 2);
        assert!(report.teardown_failures.is_empty());
        assert!(cp.inventory().await.is_empty());

        let phases: Vec<ScenarioPhase> = report.trail.iter().map(|t| t.to).collect();
        assert_eq!(
            phases,
            vec![
                ScenarioPhase::Ready,
                ScenarioPhase::PolicyApplied,
                ScenarioPhase::Probing,
                ScenarioPhase::Asserting,
                ScenarioPhase::TearingDown,
                ScenarioPhase::Done,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broken_engine_fails_with_named_mismatch() {
        let (cp, engine) = engine(MemoryControlPlane::new().with_policies_ignored());
        let report = engine.run(&ports_scenario()).await;
        match &report.verdict {
            ScenarioVerdict::Fail { mismatches } => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].client, "client-a");
                assert_eq!(mismatches[0].port, 80);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // 불일치 이후의 프로브도 실행됨
        assert_eq!(report.probes.len(), 2);
        assert!(cp.inventory().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn server_never_ready_is_setup_error() {
        let (cp, engine) = engine(MemoryControlPlane::new().with_never_ready("server"));
        let report = engine.run(&ports_scenario()).await;
        match &report.verdict {
            ScenarioVerdict::SetupError { stage, reason, .. } => {
                assert_eq!(*stage, ScenarioPhase::Provisioning);
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("expected setup error, got {other:?}"),
        }
        assert!(report.probes.is_empty());
        assert!(cp.inventory().await.is_empty());
        let phases: Vec<ScenarioPhase> = report.trail.iter().map(|t| t.to).collect();
        assert_eq!(
            phases,
            vec![
                ScenarioPhase::Failed,
                ScenarioPhase::TearingDown,
                ScenarioPhase::Done
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_failure_still_tears_down_created_resources() {
        let (cp, engine) =
            engine(MemoryControlPlane::new().with_failing_create(ResourceKind::Endpoint));
        let report = engine.run(&ports_scenario()).await;
        assert!(matches!(
            report.verdict,
            ScenarioVerdict::SetupError {
                stage: ScenarioPhase::Provisioning,
                ..
            }
        ));
        assert!(cp.inventory().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_is_setup_error_when_configured() {
        let cp = Arc::new(MemoryControlPlane::new().with_hanging_denied_probes());
        let config = HarnessConfig {
            deny_timeout: DenyTimeout::InfrastructureFailure,
            ..config()
        };
        let engine = ScenarioEngine::new(Arc::clone(&cp), config).unwrap();
        let report = engine.run(&ports_scenario()).await;
        match &report.verdict {
            ScenarioVerdict::SetupError { stage, reason, .. } => {
                assert_eq!(*stage, ScenarioPhase::Probing);
                assert!(reason.contains("client-a-2"), "{reason}");
            }
            other => panic!("expected setup error, got {other:?}"),
        }
        // 에러 이후의 프로브는 실행되지 않음
        assert!(report.probes.is_empty());
        assert!(cp.inventory().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn setup_error_keeps_mismatches_seen_before_it() {
        let cp = Arc::new(MemoryControlPlane::new().with_hanging_denied_probes());
        let config = HarnessConfig {
            deny_timeout: DenyTimeout::InfrastructureFailure,
            ..config()
        };
        let engine = ScenarioEngine::new(Arc::clone(&cp), config).unwrap();
        let scenario = Scenario {
            name: "mismatch-then-hang".to_owned(),
            description: String::new(),
            domains: vec![DomainSpec::new("a")],
            server: ServerSpec::new("a", [80]),
            steps: vec![
                // 격리 전이므로 연결됨 -> 불일치
                Step::Probe(ProbeSpec::deny("client-x", "a", 80)),
                Step::SetIsolation {
                    domain: "a".to_owned(),
                    mode: IsolationMode::Restrictive,
                },
                Step::Probe(ProbeSpec::deny("client-y", "a", 80)),
            ],
        };

        let report = engine.run(&scenario).await;
        match &report.verdict {
            ScenarioVerdict::SetupError {
                stage,
                reason,
                mismatches,
            } => {
                assert_eq!(*stage, ScenarioPhase::Probing);
                assert!(reason.contains("client-y-2"), "{reason}");
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].step, 0);
                assert_eq!(mismatches[0].client, "client-x");
            }
            other => panic!("expected setup error, got {other:?}"),
        }
        assert!(report.to_string().contains("mismatch step 0: client-x"));
        assert!(cp.inventory().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_failure_does_not_change_verdict() {
        let (cp, engine) = engine(MemoryControlPlane::new().with_failing_delete(ResourceKind::Policy));
        let report = engine.run(&ports_scenario()).await;
        assert_eq!(report.verdict, ScenarioVerdict::Pass);
        assert_eq!(report.teardown_failures.len(), 1);
        assert_eq!(report.teardown_failures[0].resource.kind, ResourceKind::Policy);
        // 도메인 삭제는 시도되어 정책도 함께 사라짐
        assert!(cp.domain_names().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_scenario_is_setup_error_without_resources() {
        let (cp, engine) = engine(MemoryControlPlane::new());
        let mut scenario = ports_scenario();
        scenario.server.ports.clear();
        let report = engine.run(&scenario).await;
        assert!(matches!(
            report.verdict,
            ScenarioVerdict::SetupError { .. }
        ));
        assert_eq!(cp.annotation_writes().await, 0);
        assert!(cp.inventory().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn domain_names_are_unique_per_run() {
        let (cp, engine) = engine(MemoryControlPlane::new().with_failing_delete(ResourceKind::Domain));
        let first = engine.run(&ports_scenario()).await;
        let second = engine.run(&ports_scenario()).await;
        assert_ne!(first.run_id, second.run_id);
        let names = cp.domain_names().await;
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("np-a-")));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_expectation_is_flagged_by_model() {
        let (_cp, engine) = engine(MemoryControlPlane::new());
        let mut scenario = ports_scenario();
        // 실제로는 허용되는 연결을 거부로 선언
        if let Step::Probe(probe) = &mut scenario.steps[3] {
            probe.expect = fencecheck_core::types::Verdict::Deny;
        }
        let report = engine.run(&scenario).await;
        assert!(matches!(report.verdict, ScenarioVerdict::Fail { .. }));
        assert_eq!(report.model_disagreements().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_all_is_sequential_and_aggregates() {
        let (_cp, engine) = engine(MemoryControlPlane::new());
        let suite = engine
            .run_all(&[ports_scenario(), ports_scenario()])
            .await;
        assert_eq!(suite.reports.len(), 2);
        assert!(suite.all_passed());
    }

    #[tokio::test]
    async fn connectivity_check() {
        let (_cp, engine) = engine(MemoryControlPlane::new().with_unreachable());
        assert!(matches!(
            engine.check_connectivity().await,
            Err(ConformanceError::Connection(_))
        ));
    }
}
