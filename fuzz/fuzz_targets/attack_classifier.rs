#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wafscope_log_pipeline::classifier::{AttackCategory, AttackClassifier};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    rule_id: String,
    target: String,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(classifier) = AttackClassifier::new() else {
        return;
    };

    // 분류는 실패하지 않으며 항상 라벨을 가진다
    let category = classifier.classify(&input.rule_id, &input.target);
    assert!(!category.label().is_empty());

    if input.rule_id.is_empty() && input.target.is_empty() {
        assert_eq!(category, AttackCategory::Unknown);
    }
});
