//! keygate
//!
//! Public-key access control for SSH services hosting multiple repositories.

use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use keygate::access_control::{
    AccessEvaluator, Policy, PolicyStore, fingerprint, parse_authorized_key, read_public_key_file,
};
use keygate::config::{keys_dir_path, load_config, resolve_config_path};
use keygate::logging::{self, LogFormat};
use keygate::transport::{DEFAULT_RELOAD_DEBOUNCE, WatchTargets, run_stdio};
use ssh_key::PublicKey;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// keygate - decide what an SSH public key may do on a repository
#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "KEYGATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "KEYGATE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "KEYGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the access level of a key on a repository
    Check {
        /// Repository name
        #[arg(short, long)]
        repo: String,

        #[command(flatten)]
        key: KeyArgs,

        /// Evaluate a session without a public key
        #[arg(long, conflicts_with_all = ["key", "key_file"])]
        keyless: bool,

        /// Also print the rule that decided
        #[arg(long)]
        explain: bool,
    },
    /// Print the user owning a key
    Whoami {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Report malformed authorized keys
    Validate {
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer access queries on stdin, reloading the policy on file changes
    Serve {
        /// Milliseconds to wait after a file change before reloading
        #[arg(long, default_value_t = DEFAULT_RELOAD_DEBOUNCE.as_millis() as u64)]
        debounce_ms: u64,
    },
}

#[derive(ClapArgs, Debug)]
struct KeyArgs {
    /// Public key in authorized_keys format
    #[arg(short, long, conflicts_with = "key_file")]
    key: Option<String>,

    /// File holding the public key
    #[arg(long)]
    key_file: Option<PathBuf>,
}

impl KeyArgs {
    fn load(&self) -> anyhow::Result<Option<PublicKey>> {
        match (&self.key, &self.key_file) {
            (Some(text), _) => Ok(Some(parse_authorized_key(text)?)),
            (None, Some(path)) => Ok(Some(read_public_key_file(path)?)),
            (None, None) => Ok(None),
        }
    }

    fn require(&self) -> anyhow::Result<PublicKey> {
        match self.load()? {
            Some(key) => Ok(key),
            None => bail!("a key is required (--key or --key-file)"),
        }
    }
}

fn check(
    evaluator: AccessEvaluator<'_>,
    repo: &str,
    key: &KeyArgs,
    keyless: bool,
    explain: bool,
) -> anyhow::Result<ExitCode> {
    let decision = if keyless {
        evaluator.explain_keyless(repo)
    } else {
        evaluator.explain(repo, &key.require()?)
    };

    if explain {
        println!("{} ({})", decision.level, decision.rule);
    } else {
        println!("{}", decision.level);
    }
    Ok(ExitCode::SUCCESS)
}

fn whoami(evaluator: AccessEvaluator<'_>, key: &KeyArgs) -> anyhow::Result<ExitCode> {
    let key = key.require()?;
    match evaluator.identify(&key) {
        Some(user) => {
            let role = if user.admin { "admin" } else { "user" };
            println!("{} ({}, {})", user.name, role, fingerprint(&key));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("anonymous ({})", fingerprint(&key));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn validate(policy: &Policy, json: bool) -> anyhow::Result<ExitCode> {
    let diagnostics = policy.diagnostics();

    if json {
        println!("{}", serde_json::to_string_pretty(diagnostics)?);
    } else if diagnostics.is_empty() {
        println!(
            "ok: {} users, {} repositories",
            policy.users().len(),
            policy.repos().len()
        );
    } else {
        for diag in diagnostics {
            println!("{} key #{}: {}", diag.user, diag.index, diag.reason);
        }
    }

    Ok(if diagnostics.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())
        .inspect_err(|e| error!(error = %e, "Failed to load configuration"))?;
    let policy = Policy::from_config(&config);

    match &args.command {
        Command::Check {
            repo,
            key,
            keyless,
            explain,
        } => check(policy.evaluator(), repo, key, *keyless, *explain),
        Command::Whoami { key } => whoami(policy.evaluator(), key),
        Command::Validate { json } => validate(&policy, *json),
        Command::Serve { debounce_ms } => {
            let targets = WatchTargets {
                config_path: resolve_config_path(args.config.as_deref())
                    .context("resolving configuration path")?
                    .map(PathBuf::from),
                keys_dir: keys_dir_path(&config),
            };

            info!(
                name = %config.name,
                listen = %config.listen_addr(),
                users = policy.users().len(),
                "Serving access queries"
            );

            let store = Arc::new(PolicyStore::new(policy));
            run_stdio(store, targets, Duration::from_millis(*debounce_ms)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    logging::init(&args.log_level, args.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting keygate");

    run(args).await
}
