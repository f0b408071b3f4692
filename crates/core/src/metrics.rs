//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 하네스 자체는 레코더를 설치하지 않으므로
//! 레코더가 없으면 모든 호출은 no-op 입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `fencecheck_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (pass, fail, setup_error / match, mismatch)
pub const LABEL_RESULT: &str = "result";

/// 리소스 종류 레이블 키 (domain, unit, endpoint, policy)
pub const LABEL_KIND: &str = "kind";

/// 기대 판정 레이블 키 (allow, deny)
pub const LABEL_EXPECTED: &str = "expected";

// ─── Scenario Engine 메트릭 ─────────────────────────────────────────

/// 실행된 시나리오 수 (counter, label: result)
pub const SCENARIOS_TOTAL: &str = "fencecheck_scenarios_total";

/// 시나리오 소요 시간 (histogram, 초)
pub const SCENARIO_DURATION_SECONDS: &str = "fencecheck_scenario_duration_seconds";

/// 실행된 프로브 수 (counter, labels: expected, result)
pub const PROBES_TOTAL: &str = "fencecheck_probes_total";

/// 프로브 소요 시간 (histogram, 초)
pub const PROBE_DURATION_SECONDS: &str = "fencecheck_probe_duration_seconds";

/// 정리 단계에서 삭제에 실패한 리소스 수 (counter, label: kind)
pub const TEARDOWN_FAILURES_TOTAL: &str = "fencecheck_teardown_failures_total";

/// 생성된 리소스 수 (counter, label: kind)
pub const RESOURCES_CREATED_TOTAL: &str = "fencecheck_resources_created_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        SCENARIOS_TOTAL,
        "Total number of conformance scenarios executed, by verdict"
    );
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Wall-clock duration of a scenario including teardown"
    );
    describe_counter!(
        PROBES_TOTAL,
        "Total number of connectivity probes issued, by expectation and outcome"
    );
    describe_histogram!(
        PROBE_DURATION_SECONDS,
        "Time from probe unit creation to observed result"
    );
    describe_counter!(
        TEARDOWN_FAILURES_TOTAL,
        "Total number of resources that could not be deleted during teardown"
    );
    describe_counter!(
        RESOURCES_CREATED_TOTAL,
        "Total number of control-plane resources created by scenarios"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_use_common_prefix() {
        for name in [
            SCENARIOS_TOTAL,
            SCENARIO_DURATION_SECONDS,
            PROBES_TOTAL,
            PROBE_DURATION_SECONDS,
            TEARDOWN_FAILURES_TOTAL,
            RESOURCES_CREATED_TOTAL,
        ] {
            assert!(name.starts_with("fencecheck_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
