use anyhow::Context;
use crawler_types::parse_duration;
use mega_gastro::SettleOptions;
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub base_url: Url,
    pub products_ttl: Duration,
    pub categories_ttl: Duration,
    pub navigation_timeout: Duration,
    pub connect_timeout: Duration,
    pub settle: SettleOptions,
    pub warm_up: bool,
}

/// Loads `.env` into the process environment when the file exists.
pub fn load_dotenv() -> Result<(), anyhow::Error> {
    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env").context("Unable to load .env file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(anyhow::anyhow!("Unable to open .env file: {err}")),
    }
}

fn flag(raw: Option<String>, default_value: bool) -> bool {
    match raw {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default_value,
        },
        None => default_value,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| envmnt::exists(key).then(|| envmnt::get_or(key, "")))
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let duration = |key: &str, default: &str| {
            let raw = var(key, default);
            parse_duration(&raw).context(format!("Invalid {key}"))
        };
        let settle = SettleOptions {
            poll_interval: duration("SETTLE_POLL_INTERVAL", "250ms")?,
            timeout: duration("SETTLE_TIMEOUT", "5s")?,
            ..SettleOptions::default()
        };
        let base_url: Url = var("SITE_BASE_URL", mega_gastro::BASE_URL)
            .parse()
            .context("Invalid SITE_BASE_URL")?;
        // category paths are absolute, a path prefix would be dropped on join
        if base_url.path() != "/" {
            return Err(anyhow::anyhow!(
                "SITE_BASE_URL must be an origin without path, got {base_url}"
            ));
        }
        Ok(Self {
            bind_addr: var("BIND_ADDR", "0.0.0.0"),
            port: var("PORT", "4000")
                .parse()
                .context("Invalid PORT")?,
            base_url,
            products_ttl: duration("PRODUCTS_TTL", "5m")?,
            categories_ttl: duration("CATEGORIES_TTL", "24h")?,
            navigation_timeout: duration("NAVIGATION_TIMEOUT", "30s")?,
            connect_timeout: duration("CONNECT_TIMEOUT", "10s")?,
            settle,
            warm_up: flag(get("WARM_UP_CATEGORIES"), false),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn uses_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!("0.0.0.0", config.bind_addr);
        assert_eq!(4000, config.port);
        assert_eq!("https://www.mega-gastro.at/", config.base_url.as_str());
        assert_eq!(Duration::from_secs(5 * 60), config.products_ttl);
        assert_eq!(Duration::from_secs(24 * 60 * 60), config.categories_ttl);
        assert_eq!(Duration::from_secs(30), config.navigation_timeout);
        assert_eq!(SettleOptions::default(), config.settle);
        assert!(!config.warm_up);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("PRODUCTS_TTL", "30s"),
            ("SETTLE_TIMEOUT", "2s"),
            ("WARM_UP_CATEGORIES", "yes"),
            ("SITE_BASE_URL", "http://localhost:9000"),
            ("BIND_ADDR", " "),
        ]))
        .unwrap();
        assert_eq!(8080, config.port);
        assert_eq!(Duration::from_secs(30), config.products_ttl);
        assert_eq!(Duration::from_secs(2), config.settle.timeout);
        assert_eq!("http://localhost:9000/", config.base_url.as_str());
        assert_eq!("0.0.0.0", config.bind_addr);
        assert!(config.warm_up);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PRODUCTS_TTL", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SITE_BASE_URL", "not a url")])).is_err());
    }

    #[test]
    fn base_url_must_be_an_origin() {
        assert!(Config::from_lookup(lookup(&[("SITE_BASE_URL", "https://shop.test/de/")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SITE_BASE_URL", "https://shop.test/de")])).is_err());
        let config =
            Config::from_lookup(lookup(&[("SITE_BASE_URL", "https://shop.test/")])).unwrap();
        assert_eq!("https://shop.test/", config.base_url.as_str());
    }
}
