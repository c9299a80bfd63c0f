use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "SymptomTriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest image accepted alongside a symptom description (4 MiB).
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Default Ollama-compatible inference endpoint.
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434";

/// Default model used for triage and trend summaries.
pub const DEFAULT_ORACLE_MODEL: &str = "medgemma:4b";

/// Default per-call oracle timeout.
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

const MIN_ORACLE_TIMEOUT_SECS: u64 = 5;
const MAX_ORACLE_TIMEOUT_SECS: u64 = 120;

/// Get the application data directory
/// ~/SymptomTriage/ on all platforms; falls back to the working directory
/// when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the SQLite database holding profiles and consultation history.
pub fn database_path() -> PathBuf {
    app_data_dir().join("triage.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "symptom_triage=info,triage=info,warn"
}

/// Where and how the inference oracle is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OracleConfig {
    /// Read `TRIAGE_ORACLE_URL`, `TRIAGE_ORACLE_MODEL` and
    /// `TRIAGE_ORACLE_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("TRIAGE_ORACLE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string());
        let model = lookup("TRIAGE_ORACLE_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string());
        let timeout_secs = lookup("TRIAGE_ORACLE_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_ORACLE_TIMEOUT_SECS)
            .clamp(MIN_ORACLE_TIMEOUT_SECS, MAX_ORACLE_TIMEOUT_SECS);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn database_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("triage.db"));
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with(APP_NAME));
    }

    #[test]
    fn oracle_defaults() {
        let config = OracleConfig::default();
        assert_eq!(config.base_url, DEFAULT_ORACLE_URL);
        assert_eq!(config.model, DEFAULT_ORACLE_MODEL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn oracle_reads_overrides_and_trims_slash() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("TRIAGE_ORACLE_URL", "http://10.0.0.2:11434/"),
            ("TRIAGE_ORACLE_MODEL", "medgemma:27b"),
            ("TRIAGE_ORACLE_TIMEOUT_SECS", "20"),
        ]));
        assert_eq!(config.base_url, "http://10.0.0.2:11434");
        assert_eq!(config.model, "medgemma:27b");
        assert_eq!(config.timeout_secs, 20);
    }

    #[test]
    fn oracle_timeout_is_clamped() {
        let low = OracleConfig::from_lookup(lookup_from(&[("TRIAGE_ORACLE_TIMEOUT_SECS", "0")]));
        assert_eq!(low.timeout_secs, 5);

        let high = OracleConfig::from_lookup(lookup_from(&[("TRIAGE_ORACLE_TIMEOUT_SECS", "9000")]));
        assert_eq!(high.timeout_secs, 120);

        let junk = OracleConfig::from_lookup(lookup_from(&[("TRIAGE_ORACLE_TIMEOUT_SECS", "soon")]));
        assert_eq!(junk.timeout_secs, DEFAULT_ORACLE_TIMEOUT_SECS);
    }

    #[test]
    fn blank_values_fall_back() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("TRIAGE_ORACLE_URL", "  "),
            ("TRIAGE_ORACLE_MODEL", ""),
        ]));
        assert_eq!(config.base_url, DEFAULT_ORACLE_URL);
        assert_eq!(config.model, DEFAULT_ORACLE_MODEL);
    }
}
