#![no_main]

use fencecheck_conformance::HarnessConfig;
use fencecheck_core::config::FencecheckConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = FencecheckConfig::parse(content) {
        if config.validate().is_ok() {
            let _ = HarnessConfig::from_core(&config).validate();
        }
    }
});
