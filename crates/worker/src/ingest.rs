//! Line protocol for incoming samples: `<name> <stamp> <value>`.
//!
//! Fields are separated by ASCII whitespace, `stamp` is unix seconds
//! (fractional seconds allowed), and `value` must be a finite number.

use chrono::{DateTime, TimeZone, Utc};

use vigil_core::rule::SEPARATOR;
use vigil_core::Metric;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("malformed line, expected '<name> <stamp> <value>': {0:?}")]
    Malformed(String),

    #[error("invalid stamp {0:?}")]
    InvalidStamp(String),

    #[error("invalid value {0:?}")]
    InvalidValue(String),

    #[error("invalid metric name {0:?}")]
    InvalidName(String),
}

/// Parse one protocol line into an un-scored [`Metric`].
pub fn parse_line(line: &str) -> Result<Metric, IngestError> {
    let mut fields = line.split_ascii_whitespace();
    let (Some(name), Some(stamp), Some(value), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(IngestError::Malformed(line.trim().to_string()));
    };

    if name.split(SEPARATOR).any(str::is_empty) {
        return Err(IngestError::InvalidName(name.to_string()));
    }
    let stamp = parse_stamp(stamp)?;
    let value = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| IngestError::InvalidValue(value.to_string()))?;

    Ok(Metric::at(name, stamp, value))
}

fn parse_stamp(raw: &str) -> Result<DateTime<Utc>, IngestError> {
    let invalid = || IngestError::InvalidStamp(raw.to_string());

    if let Ok(secs) = raw.parse::<i64>() {
        if secs < 0 {
            return Err(invalid());
        }
        return Utc.timestamp_opt(secs, 0).single().ok_or_else(invalid);
    }

    let secs = raw.parse::<f64>().map_err(|_| invalid())?;
    if !secs.is_finite() || secs < 0.0 || secs > i64::MAX as f64 {
        return Err(invalid());
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let m = parse_line("timer.mean_90.api.login 1452674178 12.5").unwrap();
        assert_eq!(m.name, "timer.mean_90.api.login");
        assert_eq!(m.stamp.timestamp(), 1452674178);
        assert_eq!(m.value, 12.5);
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn tolerates_extra_whitespace_and_newline() {
        let m = parse_line("  counter.orders\t1452674178   -3\r\n").unwrap();
        assert_eq!(m.name, "counter.orders");
        assert_eq!(m.value, -3.0);
    }

    #[test]
    fn fractional_stamp_keeps_millis() {
        let m = parse_line("a.b 1452674178.25 1").unwrap();
        assert_eq!(m.stamp.timestamp(), 1452674178);
        assert_eq!(m.stamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        assert!(matches!(parse_line(""), Err(IngestError::Malformed(_))));
        assert!(matches!(parse_line("a.b 1"), Err(IngestError::Malformed(_))));
        assert!(matches!(
            parse_line("a.b 1 2 3"),
            Err(IngestError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_name_segments() {
        for name in [".a", "a.", "a..b", "."] {
            let line = format!("{} 1452674178 1", name);
            assert_eq!(
                parse_line(&line),
                Err(IngestError::InvalidName(name.to_string()))
            );
        }
    }

    #[test]
    fn rejects_bad_stamps() {
        for stamp in ["yesterday", "NaN", "-5", "-1.5", "1e300"] {
            let line = format!("a.b {} 1", stamp);
            assert!(
                matches!(parse_line(&line), Err(IngestError::InvalidStamp(_))),
                "stamp {} should be rejected",
                stamp
            );
        }
    }

    #[test]
    fn rejects_non_finite_values() {
        for value in ["abc", "NaN", "inf", "-inf"] {
            let line = format!("a.b 1452674178 {}", value);
            assert!(matches!(parse_line(&line), Err(IngestError::InvalidValue(_))));
        }
    }
}
