use std::path::PathBuf;

use tracing::debug;

use cadence_core::{ClaimConfig, Config};

use crate::cli::CliArgs;

/// Effective settings for one invocation: environment config with CLI flags on top.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub schedules_dir: PathBuf,
    pub history_dir: PathBuf,
    /// JSON file backing the reference wallet between runs.
    pub inventory_path: PathBuf,
    pub watch_catalog: bool,
    pub claims: ClaimConfig,
}

impl CliConfig {
    pub fn resolve(args: &CliArgs) -> Self {
        let env = match args.profile.as_deref() {
            Some(profile) => Config::for_profile(profile),
            None => Config::from_env(),
        };
        env.log_summary();

        let mut claims = env.claims;
        if let Some(policy) = args.commit_policy {
            claims.commit_policy = policy;
        }
        if let Some(basis) = args.expiration_basis {
            claims.expiration_basis = basis;
        }

        let config = Self {
            schedules_dir: args
                .schedules_dir
                .clone()
                .unwrap_or(env.catalog.schedules_dir),
            history_dir: args.history_dir.clone().unwrap_or(env.storage.history_dir),
            inventory_path: env.storage.data_dir.join("inventory.json"),
            watch_catalog: env.catalog.watch,
            claims,
        };
        debug!(?config, "resolved cli configuration");
        config
    }
}
