use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cadence_core::{CommitPolicy, ExpirationBasis};

/// Reward cadence scheduler.
///
/// Loads schedule definitions from YAML, keeps one claim history per schedule
/// on disk and lets you inspect and claim reward slots.
#[derive(Parser, Debug)]
#[command(name = "cadence", about = "Inspect and claim scheduled rewards")]
pub struct CliArgs {
    /// Config profile (looks up `{PROFILE}_{KEY}` before `{KEY}`)
    #[arg(long, env = "CADENCE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Directory with schedule YAML documents
    #[arg(long, global = true)]
    pub schedules_dir: Option<PathBuf>,

    /// Directory with persisted claim histories
    #[arg(long, global = true)]
    pub history_dir: Option<PathBuf>,

    /// What happens to a claim whose payout fails: commit-before-payout or rollback-on-failure
    #[arg(long, global = true)]
    pub commit_policy: Option<CommitPolicy>,

    /// Window used by reset-on-expire schedules: expiration or cooldown
    #[arg(long, global = true)]
    pub expiration_basis: Option<ExpirationBasis>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every enabled schedule with its slot states
    List,

    /// Show one schedule in detail
    Status {
        schedule: String,
    },

    /// Claim a slot (defaults to the latest claimable slot)
    Claim {
        schedule: String,
        slot: Option<String>,
    },

    /// Evaluate the persisted history at a future instant without touching it
    ResetPreview {
        schedule: String,

        /// How far ahead to look, e.g. `90m`, `1d12h` or bare seconds
        #[arg(long, default_value = "0")]
        after: String,
    },

    /// Show the wallet and inventory granted so far
    Wallet,

    /// Keep schedules refreshed and print every change until Ctrl+C
    Watch {
        /// Reload schedule documents when they change on disk
        #[arg(long, env = "CADENCE_WATCH_SCHEDULES")]
        catalog: bool,

        /// Upper bound on the sleep between refreshes, e.g. `30s`
        #[arg(long, default_value = "30s")]
        max_sleep: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_claim_with_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "cadence",
            "claim",
            "daily-login",
            "--commit-policy",
            "rollback",
            "--json",
        ])
        .unwrap();

        assert!(args.json);
        assert_eq!(args.commit_policy, Some(CommitPolicy::RollbackOnPayoutFailure));
        assert!(matches!(
            args.command,
            Command::Claim { ref schedule, slot: None } if schedule == "daily-login"
        ));
    }

    #[test]
    fn reset_preview_defaults_to_now() {
        let args = CliArgs::try_parse_from(["cadence", "reset-preview", "streak-bonus"]).unwrap();
        assert!(matches!(args.command, Command::ResetPreview { ref after, .. } if after == "0"));
        assert!(CliArgs::try_parse_from(["cadence", "--commit-policy", "sometimes", "list"]).is_err());
    }
}
