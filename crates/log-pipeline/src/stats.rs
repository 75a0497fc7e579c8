//! 통계 집계 -- 저장소 내용으로 [`StatsSnapshot`]을 계산
//!
//! 스냅샷은 호출할 때마다 저장소를 한 번 순회하여 새로 계산합니다 (O(n), 캐시 없음).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;

use wafscope_core::types::{IpStat, StatsSnapshot};

use crate::store::{EventStore, recent_of};

/// 상위 클라이언트 목록 최대 길이
pub const TOP_IPS_LIMIT: usize = 10;

/// 스냅샷에 포함되는 최근 이벤트 수
pub const RECENT_LOGS_LIMIT: i64 = 10;

/// 통계 집계기
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<EventStore>,
}

impl StatsAggregator {
    /// 저장소를 공유하는 집계기를 생성합니다.
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// 현재 저장소 내용으로 스냅샷을 계산합니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (total, blocked, attacks_by_type, mut top_ips, recent_logs) =
            self.store.with_events(|events| {
                let mut blocked = 0u64;
                let mut attacks: BTreeMap<String, u64> = BTreeMap::new();
                let mut per_ip: HashMap<&str, IpStat> = HashMap::new();

                for event in events {
                    let stat = per_ip
                        .entry(event.client_ip.as_str())
                        .or_insert_with(|| IpStat {
                            ip: event.client_ip.clone(),
                            requests: 0,
                            blocked: 0,
                        });
                    stat.requests += 1;

                    if event.blocked {
                        blocked += 1;
                        stat.blocked += 1;
                        if !event.attack_type.is_empty() {
                            *attacks.entry(event.attack_type.clone()).or_insert(0) += 1;
                        }
                    }
                }

                let total = u64::try_from(events.len()).unwrap_or(u64::MAX);
                (
                    total,
                    blocked,
                    attacks,
                    per_ip.into_values().collect::<Vec<_>>(),
                    recent_of(events, RECENT_LOGS_LIMIT),
                )
            });

        top_ips.sort_by(|a, b| b.requests.cmp(&a.requests).then_with(|| a.ip.cmp(&b.ip)));
        top_ips.truncate(TOP_IPS_LIMIT);

        StatsSnapshot {
            total_requests: total,
            blocked_requests: blocked,
            attacks_by_type,
            top_ips,
            recent_logs,
            timestamp: Utc::now(),
        }
    }
}
