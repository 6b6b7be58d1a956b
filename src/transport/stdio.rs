//! Stdio transport
//!
//! Answers access queries over standard input/output so an SSH front-end can
//! consult the policy from a forced command or a session hook.
//!
//! Each input line is `<repo> <authorized key>` or `<repo> -` for a session
//! without a public key. Each answer is one line holding the access level
//! (`no-access`, `read-only`, `read-write`, `admin-access`) or
//! `error: <reason>`.

use crate::access_control::{AccessLevel, PolicyStore, parse_authorized_key};
use crate::error::TransportError;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use ssh_key::PublicKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default delay between a file change and the policy reload
pub const DEFAULT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(250);

/// Marker for a keyless session in a query line
const KEYLESS_MARKER: &str = "-";

/// A parsed query line
#[derive(Debug, Clone)]
pub enum Query {
    Key { repo: String, key: PublicKey },
    Keyless { repo: String },
}

impl Query {
    /// Parse a query line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, TransportError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some((repo, key_text)) = line.split_once(char::is_whitespace) else {
            return Err(TransportError::InvalidQuery(format!(
                "missing key for repository '{}'",
                line
            )));
        };

        let repo = repo.to_string();
        let key_text = key_text.trim();
        if key_text == KEYLESS_MARKER {
            return Ok(Some(Query::Keyless { repo }));
        }

        let key = parse_authorized_key(key_text)
            .map_err(|e| TransportError::InvalidQuery(e.to_string()))?;
        Ok(Some(Query::Key { repo, key }))
    }

    pub fn repo(&self) -> &str {
        match self {
            Query::Key { repo, .. } | Query::Keyless { repo } => repo,
        }
    }
}

/// Evaluate a query against the current policy snapshot
pub fn answer(store: &PolicyStore, query: &Query) -> AccessLevel {
    let policy = store.snapshot();
    let evaluator = policy.evaluator();
    match query {
        Query::Key { repo, key } => evaluator.evaluate(repo, key),
        Query::Keyless { repo } => evaluator.evaluate_keyless(repo),
    }
}

/// Answer query lines from `reader` until EOF
///
/// Returns the number of queries answered, including rejected lines.
pub async fn serve_lines<R, W>(
    mut reader: R,
    mut writer: W,
    store: &PolicyStore,
) -> Result<usize, TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut answered = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let parsed = std::str::from_utf8(&buf)
            .map_err(|_| TransportError::InvalidQuery("invalid UTF-8".to_string()))
            .and_then(Query::parse);
        let response = match parsed {
            Ok(Some(query)) => {
                let level = answer(store, &query);
                debug!(repo = query.repo(), level = %level, "Answered query");
                level.to_string()
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Rejected query");
                format!("error: {}", e)
            }
        };

        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        answered += 1;
    }

    Ok(answered)
}

/// Files whose changes trigger a policy reload
#[derive(Debug, Clone, Default)]
pub struct WatchTargets {
    /// Configuration file, reloaded through `PolicyStore::reload`
    pub config_path: Option<PathBuf>,

    /// Directory of per-user key files
    pub keys_dir: Option<PathBuf>,
}

impl WatchTargets {
    pub fn is_empty(&self) -> bool {
        self.config_path.is_none() && self.keys_dir.is_none()
    }

    fn canonical(&self) -> Self {
        let canonical =
            |path: &PathBuf| std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        Self {
            config_path: self.config_path.as_ref().map(canonical),
            keys_dir: self.keys_dir.as_ref().map(canonical),
        }
    }

    /// Whether `event` touches a watched file
    ///
    /// Reads are ignored so that reloading does not trigger another reload.
    fn matches(&self, event: &Event) -> bool {
        if let EventKind::Access(kind) = &event.kind
            && *kind != AccessKind::Close(AccessMode::Write)
        {
            return false;
        }
        event.paths.iter().any(|path| {
            self.config_path.as_deref() == Some(path.as_path())
                || self.keys_dir.as_deref().is_some_and(|dir| path.starts_with(dir))
        })
    }
}

/// Reload the policy whenever the configuration file or the key directory changes
///
/// The watch is registered before this returns, so changes made afterwards are
/// seen. Bursts of events within `debounce` cause a single reload. Reload
/// failures are logged and the old policy stays active. The task ends when
/// `token` is cancelled.
pub fn spawn_reload_task(
    store: Arc<PolicyStore>,
    targets: WatchTargets,
    debounce: Duration,
    token: CancellationToken,
) -> Result<JoinHandle<()>, TransportError> {
    let watched = targets.canonical();
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;

    // Editors often replace the file, so watch its directory
    if let Some(path) = &watched.config_path {
        let dir = path.parent().unwrap_or(Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
    }
    if let Some(dir) = &watched.keys_dir {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
    }

    let config_path = targets
        .config_path
        .map(|path| path.to_string_lossy().into_owned());

    Ok(tokio::spawn(async move {
        let _watcher = watcher;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = events.recv() => match received {
                    Some(Ok(event)) if watched.matches(&event) => {
                        debug!(paths = ?event.paths, "Watched file changed");
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "File watch error");
                        continue;
                    }
                    None => break,
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(debounce) => {}
            }
            while events.try_recv().is_ok() {}

            reload(&store, config_path.clone()).await;
        }

        debug!("Reload task stopped");
    }))
}

async fn reload(store: &Arc<PolicyStore>, config_path: Option<String>) {
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || store.reload(config_path.as_deref())).await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "Policy reload failed, keeping previous policy"),
        Err(e) => warn!(error = %e, "Policy reload task failed"),
    }
}

/// Run the query loop over stdin/stdout
pub async fn run_stdio(
    store: Arc<PolicyStore>,
    targets: WatchTargets,
    debounce: Duration,
) -> anyhow::Result<()> {
    info!("Starting keygate with stdio transport");

    let token = CancellationToken::new();
    let reload_handle = if targets.is_empty() {
        None
    } else {
        info!(
            config = ?targets.config_path,
            keys_dir = ?targets.keys_dir,
            "Watching for policy changes"
        );
        spawn_reload_task(Arc::clone(&store), targets, debounce, token.clone())
            .inspect_err(|e| warn!(error = %e, "Policy reload disabled"))
            .ok()
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let result = serve_lines(stdin, stdout, &store).await;

    token.cancel();
    if let Some(handle) = reload_handle {
        let _ = handle.await;
    }

    let answered = result?;
    info!(answered, "keygate stdio transport stopped");
    Ok(())
}
