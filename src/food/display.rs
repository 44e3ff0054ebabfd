use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};

const NO_DATE: &str = "No date set";

fn stamp(dt: OffsetDateTime) -> String {
    dt.format(format_description!(
        "[month repr:short] [day], [year] [hour]:[minute]"
    ))
    .unwrap_or_else(|_| "Invalid date".to_string())
}

fn clock(dt: OffsetDateTime) -> String {
    format!("{:02}:{:02}", dt.hour(), dt.minute())
}

/// "Today at 08:15", "Yesterday at 19:30", else "May 02, 2024 12:00". Times are shown in UTC.
pub fn format_consumed(consumed: Option<OffsetDateTime>, now: OffsetDateTime) -> String {
    let Some(dt) = consumed else {
        return NO_DATE.to_string();
    };
    let dt = dt.to_offset(UtcOffset::UTC);
    let today = now.to_offset(UtcOffset::UTC).date();
    if dt.date() == today {
        format!("Today at {}", clock(dt))
    } else if today.previous_day() == Some(dt.date()) {
        format!("Yesterday at {}", clock(dt))
    } else {
        stamp(dt)
    }
}

pub fn format_added(created_at: OffsetDateTime) -> String {
    stamp(created_at.to_offset(UtcOffset::UTC))
}

fn distance(elapsed: Duration) -> String {
    let minutes = (elapsed.whole_seconds() as f64 / 60.0).round() as i64;
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    match minutes {
        0 => "less than a minute".to_string(),
        1..=44 => plural(minutes, "minute"),
        45..=89 => "about 1 hour".to_string(),
        90..=1439 => format!("about {}", plural((minutes as f64 / 60.0).round() as i64, "hour")),
        1440..=2519 => "1 day".to_string(),
        2520..=43199 => plural((minutes as f64 / 1440.0).round() as i64, "day"),
        43200..=86399 => format!(
            "about {}",
            plural((minutes as f64 / 43200.0).round() as i64, "month")
        ),
        86400..=525599 => plural((minutes as f64 / 43200.0).round() as i64, "month"),
        _ => format!(
            "about {}",
            plural((minutes as f64 / 525600.0).round() as i64, "year")
        ),
    }
}

/// Relative age such as "3 days ago" or "about 2 hours ago".
pub fn time_ago(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let elapsed = now - created_at;
    if elapsed.is_negative() {
        format!("in {}", distance(-elapsed))
    } else {
        format!("{} ago", distance(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-10 12:00:00 UTC);

    #[test]
    fn consumed_dates_are_relative_to_today() {
        assert_eq!(
            format_consumed(Some(datetime!(2024-05-10 08:15:00 UTC)), NOW),
            "Today at 08:15"
        );
        assert_eq!(
            format_consumed(Some(datetime!(2024-05-09 19:30:00 UTC)), NOW),
            "Yesterday at 19:30"
        );
        assert_eq!(
            format_consumed(Some(datetime!(2024-05-02 12:00:00 UTC)), NOW),
            "May 02, 2024 12:00"
        );
        assert_eq!(format_consumed(None, NOW), "No date set");
    }

    #[test]
    fn added_is_absolute() {
        assert_eq!(format_added(datetime!(2024-01-31 23:05:00 UTC)), "Jan 31, 2024 23:05");
    }

    #[test]
    fn ages() {
        assert_eq!(time_ago(NOW - Duration::seconds(20), NOW), "less than a minute ago");
        assert_eq!(time_ago(NOW - Duration::minutes(1), NOW), "1 minute ago");
        assert_eq!(time_ago(NOW - Duration::minutes(30), NOW), "30 minutes ago");
        assert_eq!(time_ago(NOW - Duration::minutes(60), NOW), "about 1 hour ago");
        assert_eq!(time_ago(NOW - Duration::hours(5), NOW), "about 5 hours ago");
        assert_eq!(time_ago(NOW - Duration::hours(30), NOW), "1 day ago");
        assert_eq!(time_ago(NOW - Duration::days(3), NOW), "3 days ago");
        assert_eq!(time_ago(NOW - Duration::days(45), NOW), "about 2 months ago");
        assert_eq!(time_ago(NOW - Duration::days(400), NOW), "about 1 year ago");
        assert_eq!(time_ago(NOW + Duration::days(2), NOW), "in 2 days");
    }
}
