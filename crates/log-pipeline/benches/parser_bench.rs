//! 로그 파서 벤치마크
//!
//! ModSecurity 차단 라인, 게이트에서 걸러지는 일반 라인, 최소 필드 라인의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wafscope_core::pipeline::EventParser;
use wafscope_log_pipeline::parser::ModSecurityParser;

/// 모든 필드가 있는 차단 라인
const BLOCKED_FULL: &str = r#"2024/01/15 10:30:45 [error] 24#24: *101 [client 203.0.113.7] ModSecurity: Access denied with code 403 (phase 2). detected SQLi using libinjection. [file "/etc/nginx/owasp-modsecurity-crs/rules/REQUEST-942-APPLICATION-ATTACK-SQLI.conf"] [line "45"] [id "942100"] [msg "SQL Injection Attack Detected via libinjection"] [data "Matched Data: s&1c found within ARGS:id: 1' OR 1=1--"] [severity "2"] [ver "OWASP_CRS/3.3.2"] [maturity "0"] [accuracy "0"] [tag "application-multi"] [tag "language-multi"] [tag "platform-multi"] [tag "attack-sqli"] [hostname "10.0.0.5"] [uri "/products"] [unique_id "170531044512.345678"] [ref "v542,14"], client: 203.0.113.7, server: shop.example.com, request: "GET /products?id=1%27%20OR%201=1-- HTTP/1.1", host: "shop.example.com", "User-Agent: sqlmap/1.7.2#stable (https://sqlmap.org)""#;

/// 최소 필드 차단 라인
const BLOCKED_MINIMAL: &str = "ModSecurity: Access denied with code 403 (phase 1).";

/// 게이트를 통과하지 못하는 일반 라인 (대부분의 트래픽)
const NOISE: &str = r#"2024/01/15 10:30:45 [notice] 24#24: *99 "GET /healthz HTTP/1.1" 200 2 "-" "kube-probe/1.28""#;

fn bench_single_line(c: &mut Criterion) {
    let parser = ModSecurityParser::new().unwrap();

    let mut group = c.benchmark_group("modsecurity_parse");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("blocked_full", BLOCKED_FULL),
        ("blocked_minimal", BLOCKED_MINIMAL),
        ("noise", NOISE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &line, |b, line| {
            b.iter(|| parser.parse(black_box(line)))
        });
    }

    group.finish();
}

fn bench_mixed_batch(c: &mut Criterion) {
    let parser = ModSecurityParser::new().unwrap();

    // 차단 1건당 일반 9건
    let batch: Vec<&str> = (0..1000)
        .map(|i| if i % 10 == 0 { BLOCKED_FULL } else { NOISE })
        .collect();

    let mut group = c.benchmark_group("modsecurity_batch");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("mixed_1000", |b| {
        b.iter(|| {
            batch
                .iter()
                .filter_map(|line| parser.parse(black_box(line)))
                .count()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_single_line, bench_mixed_batch);
criterion_main!(benches);
