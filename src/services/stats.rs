//! Statistics aggregator
//!
//! Folds the user, message and activity-log stores into the dashboard
//! counters, the 30-day signup growth series and the saved-city ranking.
//! The growth bucketing and city ranking are pure functions over fetched
//! rows so they can be tested without a database.
//!
//! Tabulating saved-city frequency reads every saved-city name, so a call
//! costs O(total saved cities). Acceptable at this scale; everything else
//! is a COUNT query.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repositories::{ActivityLogRepository, MessageRepository, UserRepository};

/// Number of daily points in the growth series
pub const GROWTH_DAYS: i64 = 30;

/// Maximum entries in the saved-city ranking
pub const TOP_CITIES_LIMIT: usize = 10;

/// One day of the signup growth series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthPoint {
    /// UTC calendar day
    pub date: NaiveDate,
    /// Signups on that day
    pub count: i64,
}

/// One entry of the saved-city ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityCount {
    pub name: String,
    pub count: i64,
}

/// Aggregated dashboard statistics, computed as of call time
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub admin_users: i64,
    pub banned_users: i64,
    /// Users with a last login within 7 days
    pub active_users_7d: i64,
    /// Users with a last login within 30 days
    pub active_users_30d: i64,
    pub new_users_7d: i64,
    pub new_users_30d: i64,
    pub total_saved_cities: i64,
    /// Saved cities per user, rounded to 2 decimals; 0 with no users
    pub avg_saved_cities: f64,
    pub total_messages: i64,
    pub unresolved_messages: i64,
    pub total_logs: i64,
    pub logs_7d: i64,
    /// Exactly 30 daily points, oldest first, zero-filled
    pub user_growth: Vec<GrowthPoint>,
    /// Up to 10 saved-city names by occurrence
    pub top_cities: Vec<CityCount>,
}

/// Statistics service over the user, message and activity-log repositories
pub struct StatsService {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    logs: Arc<dyn ActivityLogRepository>,
}

impl StatsService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
        logs: Arc<dyn ActivityLogRepository>,
    ) -> Self {
        Self {
            users,
            messages,
            logs,
        }
    }

    /// Compute the full dashboard snapshot
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let now = Utc::now();
        let seven_days_ago = now - Duration::days(7);
        let thirty_days_ago = now - Duration::days(30);

        let total_users = self.users.count().await?;
        let admin_users = self
            .users
            .count_by_role(crate::models::UserRole::Admin)
            .await?;
        let banned_users = self.users.count_banned().await?;
        let active_users_7d = self.users.count_last_login_since(seven_days_ago).await?;
        let active_users_30d = self.users.count_last_login_since(thirty_days_ago).await?;
        let new_users_7d = self.users.count_created_since(seven_days_ago).await?;
        let new_users_30d = self.users.count_created_since(thirty_days_ago).await?;

        let total_saved_cities = self.users.count_saved_cities().await?;
        let avg_saved_cities = if total_users > 0 {
            round2(total_saved_cities as f64 / total_users as f64)
        } else {
            0.0
        };

        let total_messages = self.messages.count().await?;
        let unresolved_messages = self.messages.count_unresolved().await?;

        let total_logs = self.logs.count().await?;
        let logs_7d = self.logs.count_since(seven_days_ago).await?;

        let today = now.date_naive();
        let window_start = now - Duration::days(GROWTH_DAYS);
        let creations = self.users.created_since(window_start).await?;
        let user_growth = growth_series(&creations, today);

        let names = self.users.all_saved_city_names().await?;
        let top_cities = rank_cities(&names, TOP_CITIES_LIMIT);

        Ok(DashboardStats {
            total_users,
            admin_users,
            banned_users,
            active_users_7d,
            active_users_30d,
            new_users_7d,
            new_users_30d,
            total_saved_cities,
            avg_saved_cities,
            total_messages,
            unresolved_messages,
            total_logs,
            logs_7d,
            user_growth,
            top_cities,
        })
    }

    /// Activity-log entries since UTC midnight (monitoring counter)
    pub async fn api_calls_today(&self) -> Result<i64> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        self.logs.count_since(midnight).await
    }
}

/// Bucket creation timestamps into exactly 30 daily points ending at
/// `today`, oldest first. Days with no signups appear with count 0.
pub fn growth_series(creations: &[DateTime<Utc>], today: NaiveDate) -> Vec<GrowthPoint> {
    let start = today - Duration::days(GROWTH_DAYS - 1);
    let mut counts = vec![0i64; GROWTH_DAYS as usize];

    for created in creations {
        let day = created.date_naive();
        if day < start || day > today {
            continue;
        }
        let offset = (day - start).num_days() as usize;
        counts[offset] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| GrowthPoint {
            date: start + Duration::days(i as i64),
            count,
        })
        .collect()
}

/// Rank saved-city names by occurrence, most frequent first.
///
/// Ties keep the order in which a name was first encountered; a stable
/// sort keyed only on the count preserves it.
pub fn rank_cities(names: &[String], limit: usize) -> Vec<CityCount> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for name in names {
        let entry = counts.entry(name.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(name.as_str());
        }
        *entry += 1;
    }

    let mut ranking: Vec<CityCount> = order
        .into_iter()
        .map(|name| CityCount {
            name: name.to_string(),
            count: counts[name],
        })
        .collect();
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking.truncate(limit);
    ranking
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        // Up to ~60 days either side of the window edge
        (-60i64..60, 0u32..24).prop_map(|(days, hour)| {
            NaiveDate::from_ymd_opt(2026, 8, 4)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap()
                .and_utc()
                + Duration::days(days)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn growth_series_length_is_invariant(
            creations in prop::collection::vec(timestamp_strategy(), 0..100)
        ) {
            let today = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
            let series = growth_series(&creations, today);
            prop_assert_eq!(series.len(), 30);
            // Total never exceeds the number of inputs
            let total: i64 = series.iter().map(|p| p.count).sum();
            prop_assert!(total <= creations.len() as i64);
        }

        #[test]
        fn growth_series_counts_in_window_exactly(
            creations in prop::collection::vec(timestamp_strategy(), 0..100)
        ) {
            let today = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
            let start = today - Duration::days(29);
            let series = growth_series(&creations, today);

            let in_window = creations
                .iter()
                .filter(|c| {
                    let d = c.date_naive();
                    d >= start && d <= today
                })
                .count() as i64;
            let total: i64 = series.iter().map(|p| p.count).sum();
            prop_assert_eq!(total, in_window);
        }

        #[test]
        fn rank_cities_counts_sum_to_input(
            names in prop::collection::vec("[A-C]", 0..50)
        ) {
            // Small alphabet keeps the ranking under the limit
            let ranking = rank_cities(&names, 10);
            let total: i64 = ranking.iter().map(|c| c.count).sum();
            prop_assert_eq!(total, names.len() as i64);
            // Counts never increase down the ranking
            for pair in ranking.windows(2) {
                prop_assert!(pair[0].count >= pair[1].count);
            }
        }
    }
}
