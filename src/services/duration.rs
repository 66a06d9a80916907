use crate::services::error::{EngineError, EngineResult};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static FULL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+[wdhms])+$").unwrap());
static PART: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)([wdhms])").unwrap());

/// Parses compact durations such as `1d12h`, `30m` or `90s`.
pub fn parse_duration(s: &str) -> EngineResult<Duration> {
    let compact: String = s.split_whitespace().collect::<String>().to_lowercase();
    if !FULL.is_match(&compact) {
        return Err(EngineError::validation(format!(
            "`{}` is not a valid duration (use e.g. 1d2h30m)",
            s
        )));
    }

    let mut total_seconds = 0u64;
    for cap in PART.captures_iter(&compact) {
        let value: u64 = cap[1]
            .parse()
            .map_err(|_| EngineError::validation(format!("`{}` is too large", &cap[1])))?;
        let unit = match &cap[2] {
            "w" => 7 * 24 * 3600,
            "d" => 24 * 3600,
            "h" => 3600,
            "m" => 60,
            _ => 1,
        };
        total_seconds = value
            .checked_mul(unit)
            .and_then(|v| total_seconds.checked_add(v))
            .ok_or_else(|| EngineError::validation("duration is too large"))?;
    }

    if total_seconds == 0 {
        return Err(EngineError::validation("duration must be greater than zero"));
    }

    Ok(Duration::from_secs(total_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10m30s").unwrap(), Duration::from_secs(630));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(14 * 86400));
        assert_eq!(parse_duration("1H 5M").unwrap(), Duration::from_secs(3900));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_duration("invalid"), Err(EngineError::Validation(_))));
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1h abc").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
    }
}
