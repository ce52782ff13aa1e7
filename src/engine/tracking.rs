use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const TRACKING_PREFIX: &str = "PKG";

/// `PKG-YYYYMMDD-XXXXXXXX`, the suffix taken from a fresh random UUID.
pub fn generate_tracking_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();

    format!(
        "{TRACKING_PREFIX}-{}-{}",
        now.format("%Y%m%d"),
        suffix.to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::generate_tracking_number;

    #[test]
    fn format_carries_date_and_hex_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let tracking = generate_tracking_number(now);

        let parts: Vec<&str> = tracking.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PKG");
        assert_eq!(parts[1], "20260314");
        assert_eq!(parts[2].len(), 8);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn numbers_differ_between_calls() {
        let now = Utc::now();
        assert_ne!(generate_tracking_number(now), generate_tracking_number(now));
    }
}
