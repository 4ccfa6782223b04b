use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;

/// Counts one more hit for `key` in the current hour. The counter lives in the
/// store, so every service instance sees the same total.
pub fn check_and_increment(
    conn: &Connection,
    key: &str,
    max_per_hour: i64,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let window = hour_window(now);
    let count = queries::increment_counter(conn, key, &window)?;
    if count > max_per_hour {
        return Err(AppError::RateLimited(format!(
            "at most {max_per_hour} requests per hour"
        )));
    }
    Ok(())
}

pub fn cleanup_old_windows(conn: &Connection, now: DateTime<Utc>) -> Result<usize, AppError> {
    let cutoff = hour_window(now - chrono::Duration::hours(2));
    Ok(queries::cleanup_counters_before(conn, &cutoff)?)
}

fn hour_window(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:00:00").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_limit_applies_per_key() {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now();

        for _ in 0..3 {
            check_and_increment(&conn, "reschedule:cust-1", 3, now).unwrap();
        }
        assert!(matches!(
            check_and_increment(&conn, "reschedule:cust-1", 3, now),
            Err(AppError::RateLimited(_))
        ));
        check_and_increment(&conn, "reschedule:cust-2", 3, now).unwrap();
    }

    #[test]
    fn test_new_window_resets_count() {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now();
        check_and_increment(&conn, "k", 1, now).unwrap();
        assert!(check_and_increment(&conn, "k", 1, now).is_err());
        check_and_increment(&conn, "k", 1, now + chrono::Duration::hours(1)).unwrap();
    }

    #[test]
    fn test_cleanup_drops_old_windows() {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now();
        check_and_increment(&conn, "k", 5, now - chrono::Duration::hours(5)).unwrap();
        check_and_increment(&conn, "k", 5, now).unwrap();
        assert_eq!(cleanup_old_windows(&conn, now).unwrap(), 1);
    }
}
