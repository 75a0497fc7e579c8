#![no_main]

use libfuzzer_sys::fuzz_target;
use wafscope_live_feed::ClientRequest;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // 잘못된 입력은 에러로 끝나야 하며 패닉은 없어야 한다
        let _ = ClientRequest::parse(text);
    }
});
