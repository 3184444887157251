use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use super::records::UsageData;

/// Length of the topic-suggestion sub-window. Fixed seven days, not a
/// calendar concept like the monthly window.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

/// Calendar-month counting window containing `now`: first instant of `now`'s
/// month up to the first instant of the following month. December rolls into
/// January of the next year.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    let end = if now.month() == 12 {
        Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0).unwrap()
    } else {
        Utc.with_ymd_and_hms(now.year(), now.month() + 1, 1, 0, 0, 0)
            .unwrap()
    };
    (start, end)
}

/// A missing period end counts as expired so a malformed record heals on the
/// next read.
pub fn monthly_expired(period_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match period_end {
        Some(end) => now >= end,
        None => true,
    }
}

pub fn weekly_expired(week_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match week_start {
        Some(start) => now - start >= Duration::days(WEEKLY_WINDOW_DAYS),
        None => true,
    }
}

/// Whole days until the monthly window rolls over. Zero when already expired.
pub fn days_until_reset(period_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match period_end {
        Some(end) if end > now => (end - now).num_days(),
        _ => 0,
    }
}

/// Zero the monthly counters and move the window to `now`'s calendar month.
/// Lifetime counters and the weekly sub-window are left untouched; they roll
/// on their own schedules.
pub fn reset_monthly(usage: &mut UsageData, now: DateTime<Utc>) {
    let (start, end) = month_window(now);
    usage.period_start = Some(start);
    usage.period_end = Some(end);
    usage.posts_created = 0;
    usage.ai_generations = 0;
    usage.ai_hook_improvements = 0;
    usage.url_imports = 0;
    usage.gem_extractions = 0;
    usage.voice_analyses = 0;
    usage.comment_drafts = 0;
    usage.last_reset = Some(now);
}

pub fn reset_weekly(usage: &mut UsageData, now: DateTime<Utc>) {
    usage.topic_suggestions_week_start = Some(now);
    usage.topic_suggestions_count = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_month_window_mid_year() {
        let (start, end) = month_window(at(2025, 8, 6, 12, 0, 0));
        assert_eq!(start, at(2025, 8, 1, 0, 0, 0));
        assert_eq!(end, at(2025, 9, 1, 0, 0, 0));
    }

    #[test]
    fn test_month_window_december_rolls_into_next_year() {
        let (start, end) = month_window(at(2025, 12, 15, 0, 0, 0));
        assert_eq!(start, at(2025, 12, 1, 0, 0, 0));
        assert_eq!(end, at(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_month_window_leap_february() {
        let (start, end) = month_window(at(2024, 2, 10, 0, 0, 0));
        assert_eq!(start, at(2024, 2, 1, 0, 0, 0));
        assert_eq!(end, at(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_monthly_expired_boundaries() {
        let end = at(2025, 9, 1, 0, 0, 0);
        assert!(!monthly_expired(Some(end), end - Duration::seconds(1)));
        assert!(monthly_expired(Some(end), end));
        assert!(monthly_expired(Some(end), end + Duration::seconds(1)));
        assert!(monthly_expired(None, at(2025, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_weekly_expired_boundaries() {
        let start = at(2025, 8, 1, 0, 0, 0);
        assert!(!weekly_expired(Some(start), start + Duration::days(6)));
        assert!(weekly_expired(Some(start), start + Duration::days(7)));
        assert!(weekly_expired(None, start));
    }

    #[test]
    fn test_reset_monthly_preserves_lifetime_and_weekly_fields() {
        let now = at(2025, 8, 6, 9, 0, 0);
        let week_start = at(2025, 8, 3, 0, 0, 0);
        let mut usage = UsageData {
            posts_created: 12,
            ai_generations: 7,
            comment_drafts: 2,
            lifetime_posts: 40,
            lifetime_ai_generations: 19,
            topic_suggestions_week_start: Some(week_start),
            topic_suggestions_count: 2,
            ..Default::default()
        };
        reset_monthly(&mut usage, now);
        assert_eq!(usage.posts_created, 0);
        assert_eq!(usage.ai_generations, 0);
        assert_eq!(usage.comment_drafts, 0);
        assert_eq!(usage.lifetime_posts, 40);
        assert_eq!(usage.lifetime_ai_generations, 19);
        assert_eq!(usage.topic_suggestions_week_start, Some(week_start));
        assert_eq!(usage.topic_suggestions_count, 2);
        assert_eq!(usage.period_start, Some(at(2025, 8, 1, 0, 0, 0)));
        assert_eq!(usage.period_end, Some(at(2025, 9, 1, 0, 0, 0)));
    }

    #[test]
    fn test_reset_weekly_leaves_monthly_counters_alone() {
        let now = at(2025, 8, 6, 9, 0, 0);
        let mut usage = UsageData {
            posts_created: 3,
            topic_suggestions_count: 5,
            ..Default::default()
        };
        reset_weekly(&mut usage, now);
        assert_eq!(usage.topic_suggestions_count, 0);
        assert_eq!(usage.topic_suggestions_week_start, Some(now));
        assert_eq!(usage.posts_created, 3);
    }

    #[test]
    fn test_days_until_reset() {
        let end = at(2025, 9, 1, 0, 0, 0);
        assert_eq!(days_until_reset(Some(end), at(2025, 8, 29, 0, 0, 0)), 3);
        assert_eq!(days_until_reset(Some(end), at(2025, 9, 2, 0, 0, 0)), 0);
        assert_eq!(days_until_reset(None, end), 0);
    }
}
