/// Server configuration from environment variables (and `.env`).
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use ninjax_shared::errors::NinjaError;

#[derive(Clone)]
pub struct Config {
    /// Set when `SECRET_KEY` is absent. Nothing signs with it; only the absence is reported.
    pub secret_key_generated: bool,
    pub environment: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub download_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub cookies_dir: PathBuf,
    pub ytdlp_bin: String,
    pub extractor_timeout_secs: u64,
    pub max_concurrent_downloads: usize,
    pub file_retention_secs: u64,
    pub cleanup_interval_secs: u64,
    pub max_content_length: u64,
    pub rate_limit_per_minute: NonZeroU32,
    pub rate_limit_per_hour: NonZeroU32,
    pub info_rate_limit_per_minute: NonZeroU32,
    pub download_rate_limit_per_minute: NonZeroU32,
    pub enable_jiosaavn: bool,
    pub enable_spotify: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, NinjaError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, NinjaError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let num = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };
        let rate = |key: &str, default: u32| {
            let value = lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default);
            NonZeroU32::new(value).ok_or_else(|| NinjaError::Config(format!("{} must be greater than zero", key)))
        };

        let secret_key_generated = lookup("SECRET_KEY").filter(|s| !s.is_empty()).is_none();

        let max_concurrent_downloads = num("MAX_CONCURRENT_DOWNLOADS", 10) as usize;
        if max_concurrent_downloads == 0 {
            return Err(NinjaError::Config(
                "MAX_CONCURRENT_DOWNLOADS must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            secret_key_generated,
            environment: lookup("APP_ENV")
                .or_else(|| lookup("FLASK_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            debug: flag("DEBUG"),
            host: var("HOST", "0.0.0.0"),
            port: lookup("PORT").and_then(|p| p.trim().parse().ok()).unwrap_or(5000),
            download_dir: PathBuf::from(var("DOWNLOAD_DIR", "downloads")),
            temp_dir: PathBuf::from(var("TEMP_DIR", "temp")),
            cookies_dir: PathBuf::from(var("COOKIES_DIR", ".")),
            ytdlp_bin: var("YTDLP_BIN", "yt-dlp"),
            extractor_timeout_secs: num("EXTRACTOR_TIMEOUT_SECS", 120),
            max_concurrent_downloads,
            file_retention_secs: num("FILE_RETENTION_SECS", 3600),
            cleanup_interval_secs: num("CLEANUP_INTERVAL_SECS", 600).max(1),
            max_content_length: num("MAX_CONTENT_LENGTH", 100 * 1024 * 1024),
            rate_limit_per_minute: rate("RATE_LIMIT_PER_MINUTE", 50)?,
            rate_limit_per_hour: rate("RATE_LIMIT_PER_HOUR", 1000)?,
            info_rate_limit_per_minute: rate("INFO_RATE_LIMIT_PER_MINUTE", 10)?,
            download_rate_limit_per_minute: rate("DOWNLOAD_RATE_LIMIT_PER_MINUTE", 5)?,
            enable_jiosaavn: flag("ENABLE_JIOSAAVN"),
            enable_spotify: flag("ENABLE_SPOTIFY"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        let level = if self.debug { "debug" } else { "info" };
        let http = if self.is_production() && !self.debug { "warn" } else { level };
        format!(
            "ninjax_api={level},ninjax_downloader={level},ninjax_shared={level},tower_http={http}",
            level = level,
            http = http
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_key_generated", &self.secret_key_generated)
            .field("environment", &self.environment)
            .field("debug", &self.debug)
            .field("bind", &self.bind_addr())
            .field("download_dir", &self.download_dir)
            .field("temp_dir", &self.temp_dir)
            .field("cookies_dir", &self.cookies_dir)
            .field("ytdlp_bin", &self.ytdlp_bin)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("enable_jiosaavn", &self.enable_jiosaavn)
            .field("enable_spotify", &self.enable_spotify)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, NinjaError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.rate_limit_per_minute.get(), 50);
        assert_eq!(config.rate_limit_per_hour.get(), 1000);
        assert_eq!(config.info_rate_limit_per_minute.get(), 10);
        assert_eq!(config.download_rate_limit_per_minute.get(), 5);
        assert_eq!(config.max_content_length, 104_857_600);
        assert!(config.secret_key_generated);
        assert!(!config.enable_spotify);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("DEBUG", "True"),
            ("FLASK_ENV", "production"),
            ("EXTRACTOR_TIMEOUT_SECS", "not-a-number"),
            ("SECRET_KEY", "s3cret"),
            ("ENABLE_JIOSAAVN", "1"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.debug);
        assert!(config.is_production());
        assert_eq!(config.extractor_timeout_secs, 120);
        assert!(!config.secret_key_generated);
        assert!(config.enable_jiosaavn);
        assert!(config.log_filter().contains("ninjax_api=debug"));
    }

    #[test]
    fn test_app_env_wins_over_flask_env() {
        let config = from_pairs(&[("APP_ENV", "staging"), ("FLASK_ENV", "production")]).unwrap();
        assert_eq!(config.environment, "staging");
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let err = from_pairs(&[("RATE_LIMIT_PER_MINUTE", "0")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_PER_MINUTE"));
    }

    #[test]
    fn test_secret_is_never_kept() {
        let config = from_pairs(&[("SECRET_KEY", "hunter2")]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("secret_key_generated: false"));
    }
}
