#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to parse as a persisted state document
    // We don't care about the result, just that it doesn't panic
    let _: Result<stagegate::state::EngineState, _> = serde_json::from_slice(data);
});
