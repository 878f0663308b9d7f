#![deny(clippy::unwrap_used)]

pub mod browser;
pub mod category;
pub mod price;
pub mod product;

pub fn parse_duration(duration: &str) -> Result<std::time::Duration, anyhow::Error> {
    let duration = duration
        .trim()
        .to_lowercase()
        .replace("min", "m")
        .replace("sec", "s");
    duration_str::parse(&duration)
        .map_err(|err| anyhow::anyhow!("Unable to parse duration {duration}: {err}"))
}

pub fn format_raw_html<S: AsRef<str>>(s: S) -> String {
    s.as_ref()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_config_durations() {
        assert_eq!(Duration::from_secs(300), parse_duration("5m").unwrap());
        assert_eq!(Duration::from_secs(300), parse_duration("5min").unwrap());
        assert_eq!(Duration::from_secs(24 * 60 * 60), parse_duration("24h").unwrap());
        assert_eq!(Duration::from_millis(250), parse_duration("250ms").unwrap());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!("Gastro Küche", format_raw_html("\n  Gastro \t Küche \n"));
        assert_eq!("", format_raw_html("   "));
    }
}
