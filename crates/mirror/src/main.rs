//! Bulk mirror and keep-fresh sync tool for a code hosting platform's
//! repositories.

use clap::{Parser, Subcommand};
use mirror_diagnostics::MirrorError;
use mirror_platform::GitHostClient;
use mirror_types::{ProgressSink, SyncOptions, SyncResult, TracingProgressSink};
use mirror_vcs::VcsDriver;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod progress;

#[derive(Parser)]
#[command(name = "mirror")]
#[command(version, about = "Mirrors a user's or organization's repositories and keeps them fresh", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalOptions {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except the final summary
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored/animated output
    #[arg(long, global = true)]
    no_color: bool,

    /// Directory clones are mirrored under
    #[arg(long, global = true, default_value = ".")]
    target: PathBuf,

    /// Worker pool size, clamped to [1, 8]
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Only sync repositories whose name matches one of these glob patterns
    #[arg(long = "include", global = true)]
    include_patterns: Vec<String>,

    /// Never sync repositories whose name matches one of these glob patterns
    #[arg(long = "exclude", global = true)]
    exclude_patterns: Vec<String>,

    /// Include private repositories
    #[arg(long, global = true)]
    include_private: bool,

    /// Report what would happen without cloning or fetching anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Skip the post-run scan for locally archived clones
    #[arg(long, global = true)]
    skip_archive_detection: bool,

    /// Emit the final summary as JSON instead of a human-readable report
    #[arg(long, global = true)]
    json: bool,

    /// OAuth2 token for HTTPS authentication, also read from MIRROR_TOKEN
    #[arg(long, env = "MIRROR_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every repository owned by a user
    User { username: String },
    /// Mirror every repository owned by an organization
    Org { orgname: String },
    /// Mirror a single repository
    Repo { owner: String, name: String },
}

#[tokio::main]
async fn main() {
    mirror_diagnostics::setup();

    let cli = Cli::parse();
    init_logging(&cli.global);
    let json = cli.global.json;

    let exit_code = match run(cli).await {
        Ok(result) => report(&result, json),
        Err(error) => {
            let exit_code = exit_code_for_error(&error);
            // A cancelled run still classified some repositories; report
            // that partial summary before the error itself.
            if let MirrorError::Cancelled { partial } = &error {
                report(partial, json);
            }
            eprintln!("{:?}", miette::Report::new(error));
            exit_code
        }
    };

    std::process::exit(exit_code);
}

fn exit_code_for_error(error: &MirrorError) -> i32 {
    match error {
        MirrorError::Configuration { .. } | MirrorError::NoTarget => 2,
        MirrorError::Cancelled { .. } => 130,
        MirrorError::Enumeration { .. } | MirrorError::ToolMissing => 1,
    }
}

fn init_logging(global: &GlobalOptions) {
    if global.quiet {
        return;
    }
    let level = match global.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

async fn run(cli: Cli) -> Result<SyncResult, MirrorError> {
    let target_root = expand_target(&cli.global.target);
    if target_root.as_os_str().is_empty() {
        return Err(MirrorError::configuration("target directory must not be empty"));
    }

    let vcs = VcsDriver::locate().map_err(|_| MirrorError::ToolMissing)?;
    let vcs = match &cli.global.token {
        Some(token) => vcs.with_token(token.clone()),
        None => vcs,
    };

    let platform = GitHostClient::new().map_err(|e| MirrorError::configuration(e.to_string()))?;
    let platform = match &cli.global.token {
        Some(token) => platform.with_token(token.clone()),
        None => platform,
    };
    let platform: Arc<dyn mirror_platform::PlatformClient> = Arc::new(platform);

    let progress_sink: Arc<dyn ProgressSink> = if cli.global.quiet || cli.global.json || cli.global.no_color {
        Arc::new(TracingProgressSink)
    } else {
        Arc::new(progress::IndicatifProgressSink::new())
    };

    let options = SyncOptions {
        target_root,
        include_patterns: cli.global.include_patterns,
        exclude_patterns: cli.global.exclude_patterns,
        include_private: cli.global.include_private,
        dry_run: cli.global.dry_run,
        verbose: cli.global.verbose > 0,
        concurrency: cli.global.concurrency.unwrap_or(4),
        skip_archive_detection: cli.global.skip_archive_detection,
        progress_sink: Some(progress_sink),
    };

    let engine = mirror_core::SyncEngine::new(vcs, platform, options);
    let cancel = CancellationToken::new();
    let watcher_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher_cancel.cancel();
        }
    });

    match cli.command {
        Commands::User { username } => engine.sync_user(&username, &cancel).await,
        Commands::Org { orgname } => engine.sync_org(&orgname, &cancel).await,
        Commands::Repo { owner, name } => engine.sync_repo(&owner, &name, &cancel).await,
    }
}

fn expand_target(path: &std::path::Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|s| s.strip_prefix('~')) else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest.trim_start_matches('/')),
        None => path.to_path_buf(),
    }
}

fn report(result: &SyncResult, json: bool) -> i32 {
    if json {
        match serde_json::to_string(result) {
            Ok(body) => println!("{body}"),
            Err(error) => eprintln!("failed to serialize summary: {error}"),
        }
    } else {
        println!(
            "cloned {} updated {} up-to-date {} skipped {} archived {} failed {}",
            result.cloned.len(),
            result.updated.len(),
            result.up_to_date.len(),
            result.skipped.len(),
            result.archived.len(),
            result.failed.len()
        );
        for (full_name, error) in &result.failed {
            eprintln!("  {full_name}: {error}");
        }
    }

    if result.failed.is_empty() {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_target_leaves_absolute_paths_alone() {
        assert_eq!(expand_target(std::path::Path::new("/tmp/mirrors")), PathBuf::from("/tmp/mirrors"));
    }

    #[test]
    fn expand_target_rewrites_tilde_prefix() {
        std::env::set_var("HOME", "/home/alice");
        assert_eq!(expand_target(std::path::Path::new("~/mirrors")), PathBuf::from("/home/alice/mirrors"));
    }

    #[test]
    fn exit_code_maps_configuration_to_two() {
        assert_eq!(exit_code_for_error(&MirrorError::configuration("bad")), 2);
        assert_eq!(exit_code_for_error(&MirrorError::NoTarget), 2);
    }

    #[test]
    fn exit_code_maps_cancelled_to_one_thirty() {
        let error = MirrorError::Cancelled {
            partial: SyncResult::default(),
        };
        assert_eq!(exit_code_for_error(&error), 130);
    }

    #[test]
    fn exit_code_maps_tool_missing_and_enumeration_to_one() {
        assert_eq!(exit_code_for_error(&MirrorError::ToolMissing), 1);
        assert_eq!(exit_code_for_error(&MirrorError::enumeration("boom")), 1);
    }

    #[test]
    fn report_counts_failures_and_returns_nonzero_exit() {
        let mut result = SyncResult::default();
        result.record_failed("alice/tool".to_string(), "boom".to_string());
        assert_eq!(report(&result, false), 1);
    }

    #[test]
    fn report_returns_zero_exit_when_nothing_failed() {
        let result = SyncResult::default();
        assert_eq!(report(&result, false), 0);
    }
}

