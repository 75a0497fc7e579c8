#![no_main]

use libfuzzer_sys::fuzz_target;
use wafscope_core::pipeline::EventParser;
use wafscope_log_pipeline::parser::ModSecurityParser;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(parser) = ModSecurityParser::new() else {
        return;
    };

    // 패닉 없이 Some 또는 None을 반환해야 한다
    if let Some(event) = parser.parse(line) {
        // 게이트를 통과한 라인만 이벤트가 된다
        assert!(line.contains("ModSecurity"));
        assert_eq!(event.raw_log, line);
    }
});
