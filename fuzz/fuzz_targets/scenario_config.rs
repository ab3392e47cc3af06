#![no_main]

use libfuzzer_sys::fuzz_target;
use zsim_model::ScenarioConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = ScenarioConfig::from_json_str(text) else {
        return;
    };
    // keep runs short; only the validation path matters here
    if config.horizon.steps <= 64 {
        let _ = config.run();
    }
    let _ = config.build_runner();
});
