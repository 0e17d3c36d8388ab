#![no_main]
use libfuzzer_sys::fuzz_target;
use tilecraft_core::serialize::SaveData;
use tilecraft_core::test_utils::sample_engine;

fuzz_target!(|data: &str| {
    let Ok(save) = SaveData::from_json(data) else {
        return;
    };
    let mut engine = sample_engine();
    let before = engine.state_hash();
    match engine.restore(save) {
        Ok(()) => assert!(engine.check_invariants().is_empty()),
        Err(_) => assert_eq!(engine.state_hash(), before),
    }
});
