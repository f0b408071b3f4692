#![no_main]

use fencecheck_conformance::scenario::{Scenario, ScenarioModel, Step};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(scenario) = toml::from_str::<Scenario>(content) else {
        return;
    };
    if scenario.validate().is_err() {
        return;
    }

    // 검증을 통과한 시나리오는 모델이 끝까지 실행할 수 있어야 한다
    let mut model = ScenarioModel::new(&scenario);
    for step in &scenario.steps {
        match step {
            Step::SetIsolation { domain, mode } => model.set_mode(domain, *mode),
            Step::ApplyPolicy { domain, policy } => {
                let _ = model.apply_policy(domain, policy);
            }
            Step::Probe(probe) => {
                let _ = model.predict(probe);
            }
        }
    }
});
