#![no_main]
use libfuzzer_sys::fuzz_target;
use tilecraft_core::serialize::SaveData;
use tilecraft_core::test_utils::sample_engine;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode to an error or a save that restore either
    // accepts with intact invariants or rejects without touching the engine.
    let Ok(save) = SaveData::from_bytes(data) else {
        return;
    };
    let mut engine = sample_engine();
    let before = engine.state_hash();
    match engine.restore(save) {
        Ok(()) => assert!(engine.check_invariants().is_empty()),
        Err(_) => assert_eq!(engine.state_hash(), before),
    }
});
