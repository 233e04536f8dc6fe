use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Parse a profiled env var via `FromStr`, warning and falling back on bad input.
fn profiled_env_parse<T>(profile: &str, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match profiled_env_opt(profile, key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "invalid config value, using default");
                default
            }
        },
        None => default,
    }
}

// ── Claim policies ────────────────────────────────────────────

/// What happens to a committed claim when the payout step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// The claim stands even if the payout fails (slot is a ticket).
    #[default]
    CommitBeforePayout,
    /// The claim is reverted when the payout fails.
    RollbackOnPayoutFailure,
}

impl fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitPolicy::CommitBeforePayout => write!(f, "commit-before-payout"),
            CommitPolicy::RollbackOnPayoutFailure => write!(f, "rollback-on-failure"),
        }
    }
}

impl FromStr for CommitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commit-before-payout" | "commit" => Ok(CommitPolicy::CommitBeforePayout),
            "rollback-on-failure" | "rollback" => Ok(CommitPolicy::RollbackOnPayoutFailure),
            other => Err(format!("unknown commit policy: '{}'", other)),
        }
    }
}

/// Which duration bounds the expiration window in the reset-on-expire check.
///
/// `Cooldown` reproduces the historical save/load path, which measured the
/// window with the cooldown duration instead of the expiration duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirationBasis {
    #[default]
    Expiration,
    Cooldown,
}

impl fmt::Display for ExpirationBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationBasis::Expiration => write!(f, "expiration"),
            ExpirationBasis::Cooldown => write!(f, "cooldown"),
        }
    }
}

impl FromStr for ExpirationBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expiration" => Ok(ExpirationBasis::Expiration),
            "cooldown" => Ok(ExpirationBasis::Cooldown),
            other => Err(format!("unknown expiration basis: '{}'", other)),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub claims: ClaimConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CADENCE_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CADENCE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            catalog: CatalogConfig::from_env_profiled(p),
            claims: ClaimConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  storage:     data_dir={}, history_dir={}", self.storage.data_dir.display(), self.storage.history_dir.display());
        tracing::info!("  catalog:     schedules_dir={}, watch={}", self.catalog.schedules_dir.display(), self.catalog.watch);
        tracing::info!("  claims:      commit_policy={}, expiration_basis={}", self.claims.commit_policy, self.claims.expiration_basis);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile("")
    }
}

// ── Sub-configs ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Directory holding one persisted claim history file per schedule.
    pub history_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "CADENCE_DATA_DIR", "data"));
        let history_dir = profiled_env_opt(p, "CADENCE_HISTORY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("history"));
        Self {
            data_dir,
            history_dir,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory scanned (recursively) for schedule YAML documents.
    pub schedules_dir: PathBuf,
    /// Hot-reload schedule documents on filesystem changes.
    pub watch: bool,
}

impl CatalogConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            schedules_dir: PathBuf::from(profiled_env_or(p, "CADENCE_SCHEDULES_DIR", "data/schedules")),
            watch: profiled_env_bool(p, "CADENCE_WATCH_SCHEDULES", false),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClaimConfig {
    pub commit_policy: CommitPolicy,
    pub expiration_basis: ExpirationBasis,
}

impl ClaimConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            commit_policy: profiled_env_parse(p, "CADENCE_COMMIT_POLICY", CommitPolicy::default()),
            expiration_basis: profiled_env_parse(p, "CADENCE_EXPIRATION_BASIS", ExpirationBasis::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_policy_parses_aliases() {
        assert_eq!("commit".parse::<CommitPolicy>().unwrap(), CommitPolicy::CommitBeforePayout);
        assert_eq!(
            "Rollback-On-Failure".parse::<CommitPolicy>().unwrap(),
            CommitPolicy::RollbackOnPayoutFailure
        );
        assert!("sometimes".parse::<CommitPolicy>().is_err());
    }

    #[test]
    fn expiration_basis_display_round_trips() {
        for basis in [ExpirationBasis::Expiration, ExpirationBasis::Cooldown] {
            assert_eq!(basis.to_string().parse::<ExpirationBasis>().unwrap(), basis);
        }
    }

    #[test]
    fn defaults_preserve_observed_behaviour() {
        let claims = ClaimConfig::default();
        assert_eq!(claims.commit_policy, CommitPolicy::CommitBeforePayout);
        assert_eq!(claims.expiration_basis, ExpirationBasis::Expiration);
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        let cfg = Config::for_profile("staging");
        assert_eq!(cfg.profile_label(), "STAGING");
    }
}
