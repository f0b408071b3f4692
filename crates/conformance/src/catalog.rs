//! 시나리오 카탈로그 -- 기본 적합성 시나리오 및 TOML 시나리오 파일 로드
//!
//! [`standard_scenarios`]는 격리 모드와 정책 객체의 기본 동작을 검증하는
//! 일곱 개의 시나리오를 반환합니다. 추가 시나리오는 TOML 파일로 작성해
//! [`load_scenarios_from_dir`]로 불러올 수 있습니다.
//!
//! # TOML 형식
//!
//! ```toml
//! name = "ports"
//! domains = [{ alias = "a" }]
//! server = { domain = "a", ports = [80, 81] }
//!
//! [[steps]]
//! action = "set_isolation"
//! domain = "a"
//! mode = "restrictive"
//!
//! [[steps]]
//! action = "probe"
//! client = "client-a"
//! domain = "a"
//! port = 80
//! expect = "deny"
//! ```

use std::path::Path;

use fencecheck_core::types::IsolationMode;

use crate::error::ConformanceError;
use crate::policy::{IngressRule, LabelSelector, PeerSelector, PolicyObject};
use crate::scenario::{DomainSpec, ProbeSpec, Scenario, ServerSpec, Step};

/// 시나리오 파일 최대 크기 (1 MB)
const MAX_SCENARIO_FILE_SIZE: u64 = 1024 * 1024;

fn isolate(domain: &str, mode: IsolationMode) -> Step {
    Step::SetIsolation {
        domain: domain.to_owned(),
        mode,
    }
}

fn apply(domain: &str, policy: PolicyObject) -> Step {
    Step::ApplyPolicy {
        domain: domain.to_owned(),
        policy,
    }
}

fn allow(client: &str, domain: &str, port: u16) -> Step {
    Step::Probe(ProbeSpec::allow(client, domain, port))
}

fn deny(client: &str, domain: &str, port: u16) -> Step {
    Step::Probe(ProbeSpec::deny(client, domain, port))
}

fn server_only() -> LabelSelector {
    LabelSelector::with_label("pod-name", "server")
}

fn port_policy(name: &str, port: u16) -> PolicyObject {
    PolicyObject::new(name, server_only(), [IngressRule::ports([port])])
}

fn scenario(
    name: &str,
    description: &str,
    domains: Vec<DomainSpec>,
    ports: &[u16],
    steps: Vec<Step>,
) -> Scenario {
    Scenario {
        name: name.to_owned(),
        description: description.to_owned(),
        domains,
        server: ServerSpec::new("a", ports.iter().copied()),
        steps,
    }
}

/// 기본 적합성 시나리오 목록을 반환합니다.
pub fn standard_scenarios() -> Vec<Scenario> {
    use IsolationMode::Restrictive;

    vec![
        scenario(
            "default-deny",
            "isolation alone denies traffic that was allowed before",
            vec![DomainSpec::new("a")],
            &[80],
            vec![
                allow("client-can-connect", "a", 80),
                isolate("a", Restrictive),
                deny("client-cannot-connect", "a", 80),
            ],
        ),
        scenario(
            "pod-selector",
            "a pod selector admits only the selected client",
            vec![DomainSpec::new("a")],
            &[80],
            vec![
                isolate("a", Restrictive),
                apply(
                    "a",
                    PolicyObject::new(
                        "allow-client-a-via-pod-selector",
                        server_only(),
                        [IngressRule::from_peers([PeerSelector::Pod(
                            LabelSelector::with_label("pod-name", "client-a"),
                        )])],
                    ),
                ),
                allow("client-a", "a", 80),
                deny("client-b", "a", 80),
            ],
        ),
        scenario(
            "ports",
            "a port-scoped policy opens only that port",
            vec![DomainSpec::new("a")],
            &[80, 81],
            vec![
                allow("basecase-reachable-80", "a", 80),
                allow("basecase-reachable-81", "a", 81),
                isolate("a", Restrictive),
                deny("basecase-unreachable-80", "a", 80),
                deny("basecase-unreachable-81", "a", 81),
                apply("a", port_policy("allow-ingress-on-port-81", 81)),
                deny("client-a", "a", 80),
                allow("client-b", "a", 81),
            ],
        ),
        scenario(
            "isolation-off",
            "policies have no effect while isolation is off",
            vec![DomainSpec::new("a")],
            &[80, 81],
            vec![
                allow("basecase-reachable-a", "a", 80),
                allow("basecase-reachable-b", "a", 81),
                apply("a", port_policy("allow-ingress-on-port-81", 81)),
                allow("client-a", "a", 80),
                allow("client-b", "a", 81),
            ],
        ),
        scenario(
            "stacked-policies",
            "overlapping policies allow the union of their rules",
            vec![DomainSpec::new("a")],
            &[80, 81],
            vec![
                allow("test-a", "a", 80),
                allow("test-b", "a", 81),
                isolate("a", Restrictive),
                deny("test-a-2", "a", 80),
                deny("test-b-2", "a", 81),
                apply("a", port_policy("allow-ingress-on-port-80", 80)),
                apply("a", port_policy("allow-ingress-on-port-81", 81)),
                allow("client-a", "a", 80),
                allow("client-b", "a", 81),
            ],
        ),
        scenario(
            "allow-all",
            "an empty target with an open rule admits everything",
            vec![DomainSpec::new("a")],
            &[80, 81],
            vec![
                allow("test-a", "a", 80),
                allow("test-b", "a", 81),
                isolate("a", Restrictive),
                deny("test-a", "a", 80),
                deny("test-b", "a", 81),
                apply("a", PolicyObject::allow_all("allow-all")),
                allow("client-a", "a", 80),
                allow("client-b", "a", 81),
            ],
        ),
        scenario(
            "namespace-selector",
            "a namespace selector admits clients from the labelled domain only",
            vec![
                DomainSpec::new("a"),
                DomainSpec::new("b").with_label("ns-name", "b"),
            ],
            &[80],
            vec![
                isolate("a", Restrictive),
                apply(
                    "a",
                    PolicyObject::new(
                        "allow-ns-b-via-namespace-selector",
                        server_only(),
                        [IngressRule::from_peers([PeerSelector::Namespace(
                            LabelSelector::with_label("ns-name", "b"),
                        )])],
                    ),
                ),
                deny("client-a", "a", 80),
                allow("client-b", "b", 80),
            ],
        ),
    ]
}

/// TOML 파일에서 시나리오를 로드합니다.
///
/// # Errors
/// - 파일 읽기 실패 또는 크기 초과
/// - TOML 파싱 실패
/// - 시나리오 유효성 검증 실패
pub fn load_scenario_from_file(path: &Path) -> Result<Scenario, ConformanceError> {
    let load_error = |reason: String| ConformanceError::ScenarioLoad {
        path: path.display().to_string(),
        reason,
    };

    let metadata =
        std::fs::metadata(path).map_err(|e| load_error(format!("failed to read metadata: {e}")))?;
    if metadata.len() > MAX_SCENARIO_FILE_SIZE {
        return Err(load_error(format!(
            "file too large: {} bytes (max: {MAX_SCENARIO_FILE_SIZE})",
            metadata.len()
        )));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| load_error(format!("failed to read file: {e}")))?;
    let scenario: Scenario = toml::from_str(&content)
        .map_err(|e| load_error(format!("failed to parse TOML: {e}")))?;

    scenario.validate()?;
    Ok(scenario)
}

/// 디렉토리의 모든 TOML 파일에서 시나리오를 로드합니다.
///
/// 로드에 실패한 파일, 하위 디렉토리, 디렉토리 밖을 가리키는 심볼릭 링크는
/// 경고를 남기고 건너뜁니다. 결과는 시나리오 이름순으로 정렬됩니다.
pub fn load_scenarios_from_dir(dir_path: &Path) -> Result<Vec<Scenario>, ConformanceError> {
    let dir_error = |reason: String| ConformanceError::ScenarioLoad {
        path: dir_path.display().to_string(),
        reason,
    };

    let entries =
        std::fs::read_dir(dir_path).map_err(|e| dir_error(format!("failed to read directory: {e}")))?;
    let canonical_dir = dir_path
        .canonicalize()
        .map_err(|e| dir_error(format!("failed to canonicalize directory: {e}")))?;

    let mut scenarios: Vec<Scenario> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read directory entry");
                continue;
            }
        };

        let path = entry.path();
        let canonical_path = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to canonicalize path, skipping");
                continue;
            }
        };

        if !canonical_path.starts_with(&canonical_dir) {
            tracing::warn!(
                path = %path.display(),
                canonical = %canonical_path.display(),
                "path escapes scenario directory, skipping"
            );
            continue;
        }

        if !canonical_path.is_file()
            || canonical_path.extension().is_none_or(|ext| ext != "toml")
        {
            continue;
        }

        match load_scenario_from_file(&canonical_path) {
            Ok(scenario) => {
                if scenarios.iter().any(|s| s.name == scenario.name) {
                    tracing::warn!(
                        scenario = %scenario.name,
                        path = %canonical_path.display(),
                        "duplicate scenario name, skipping"
                    );
                    continue;
                }
                tracing::debug!(scenario = %scenario.name, path = %canonical_path.display(), "loaded scenario");
                scenarios.push(scenario);
            }
            Err(e) => {
                tracing::warn!(path = %canonical_path.display(), error = %e, "failed to load scenario file");
            }
        }
    }

    scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use fencecheck_core::types::Verdict;

    use super::*;
    use crate::scenario::ScenarioModel;

    const PORTS_TOML: &str = r#"
name = "file-ports"
description = "loaded from disk"
domains = [{ alias = "a" }]
server = { domain = "a", ports = [80, 81] }

[[steps]]
action = "set_isolation"
domain = "a"
mode = "restrictive"

[[steps]]
action = "apply_policy"
domain = "a"

[steps.policy]
name = "allow-81"
target = { match_labels = { pod-name = "server" } }
ingress = [{ ports = [81] }]

[[steps]]
action = "probe"
client = "client-a"
domain = "a"
port = 80
expect = "deny"
"#;

    #[test]
    fn standard_scenarios_are_valid_and_unique() {
        let scenarios = standard_scenarios();
        assert_eq!(scenarios.len(), 7);
        let mut names = HashSet::new();
        for scenario in &scenarios {
            scenario.validate().unwrap();
            assert!(names.insert(scenario.name.as_str()), "{}", scenario.name);
            assert!(!scenario.description.is_empty());
        }
    }

    #[test]
    fn standard_expectations_agree_with_policy_model() {
        for scenario in standard_scenarios() {
            let mut model = ScenarioModel::new(&scenario);
            for step in &scenario.steps {
                match step {
                    Step::SetIsolation { domain, mode } => model.set_mode(domain, *mode),
                    Step::ApplyPolicy { domain, policy } => {
                        model.apply_policy(domain, policy).unwrap()
                    }
                    Step::Probe(probe) => assert_eq!(
                        model.predict(probe),
                        probe.expect,
                        "{}: {} -> {}",
                        scenario.name,
                        probe.client,
                        probe.port
                    ),
                }
            }
        }
    }

    #[test]
    fn namespace_selector_scenario_probes_from_second_domain() {
        let scenarios = standard_scenarios();
        let ns = scenarios
            .iter()
            .find(|s| s.name == "namespace-selector")
            .unwrap();
        assert_eq!(ns.domains.len(), 2);
        let (_, last) = ns.probes().last().unwrap();
        assert_eq!(last.domain, "b");
        assert_eq!(last.expect, Verdict::Allow);
    }

    #[test]
    fn load_scenario_from_file_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ports.toml");
        std::fs::write(&path, PORTS_TOML).unwrap();

        let scenario = load_scenario_from_file(&path).unwrap();
        assert_eq!(scenario.name, "file-ports");
        assert_eq!(scenario.steps.len(), 3);
    }

    #[test]
    fn load_scenario_from_file_not_found() {
        let err = load_scenario_from_file(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(matches!(err, ConformanceError::ScenarioLoad { .. }));
    }

    #[test]
    fn load_scenario_from_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = {{{").unwrap();
        let err = load_scenario_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse TOML"));
    }

    #[test]
    fn load_scenario_from_file_rejects_invalid_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-probes.toml");
        std::fs::write(
            &path,
            r#"
name = "no-probes"
domains = [{ alias = "a" }]
server = { domain = "a", ports = [80] }
steps = []
"#,
        )
        .unwrap();
        let err = load_scenario_from_file(&path).unwrap_err();
        assert!(matches!(err, ConformanceError::ScenarioValidation { .. }));
    }

    #[test]
    fn load_scenario_from_file_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.toml");
        let padding = "#".repeat(usize::try_from(MAX_SCENARIO_FILE_SIZE).unwrap() + 1);
        std::fs::write(&path, padding).unwrap();
        let err = load_scenario_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("file too large"));
    }

    #[test]
    fn load_scenarios_from_dir_skips_invalid_and_non_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ports.toml"), PORTS_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "invalid toml {{{").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a scenario").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/inner.toml"), PORTS_TOML).unwrap();

        let scenarios = load_scenarios_from_dir(dir.path()).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "file-ports");
    }

    #[test]
    fn load_scenarios_from_dir_skips_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.toml"), PORTS_TOML).unwrap();
        std::fs::write(dir.path().join("two.toml"), PORTS_TOML).unwrap();
        let scenarios = load_scenarios_from_dir(dir.path()).unwrap();
        assert_eq!(scenarios.len(), 1);
    }

    #[test]
    fn load_scenarios_from_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_scenarios_from_dir(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn load_scenarios_from_dir_not_exists() {
        assert!(load_scenarios_from_dir(Path::new("/nonexistent_scenario_dir")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn load_scenarios_from_dir_skips_symlink_outside() {
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("ports.toml");
        std::fs::write(&target, PORTS_TOML).unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("linked.toml")).unwrap();

        assert!(load_scenarios_from_dir(dir.path()).unwrap().is_empty());
    }
}
