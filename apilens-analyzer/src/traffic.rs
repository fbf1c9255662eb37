//! Hourly request distribution and per-user activity.

use crate::aggregator::Aggregation;
use apilens_core::config::TrafficConfig;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: String,
    pub request_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantUser {
    pub user_id: String,
    pub request_count: u64,
    /// Share of requests that carried a user id.
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    /// `"HH:00"` (UTC) → requests, merged across days.
    pub hourly_distribution: BTreeMap<String, u64>,
    pub top_users: Vec<UserActivity>,
    pub dominant_user: Option<DominantUser>,
}

pub fn profile(agg: &Aggregation, config: &TrafficConfig) -> TrafficProfile {
    let mut hourly: BTreeMap<String, u64> = BTreeMap::new();
    for ts in agg.endpoints.values().flat_map(|s| s.timestamps.iter()) {
        *hourly.entry(format!("{:02}:00", ts.hour())).or_insert(0) += 1;
    }

    let mut ranked: Vec<UserActivity> = agg
        .user_requests
        .iter()
        .map(|(user_id, count)| UserActivity {
            user_id: user_id.clone(),
            request_count: *count,
        })
        .collect();
    // BTreeMap order already has ids ascending; a stable sort keeps it on ties.
    ranked.sort_by(|a, b| b.request_count.cmp(&a.request_count));

    let attributed: u64 = agg.user_requests.values().sum();
    let dominant_user = ranked.first().and_then(|top| {
        let share = top.request_count as f64 / attributed as f64;
        (share > config.dominant_user_share).then(|| DominantUser {
            user_id: top.user_id.clone(),
            request_count: top.request_count,
            share,
        })
    });

    ranked.truncate(config.top_users);
    TrafficProfile {
        hourly_distribution: hourly,
        top_users: ranked,
        dominant_user,
    }
}
