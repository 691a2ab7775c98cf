//! `vdiff`: replays a JSON-lines diff script onto a file and prints the
//! resolved result.

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use vdiff_kernel::buffer::{BufferId, LineBuffer, TextBuffer};
use vdiff_kernel::diff::read_script;
use vdiff_kernel::events::Broadcaster;
use vdiff_kernel::infrastructure::{config::Settings, telemetry::TelemetryBuilder};
use vdiff_kernel::session::{LineRange, RunOutcome, SessionManager};

const USAGE: &str = "usage: vdiff <file> <script.jsonl> [accept|reject|review]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Accept,
    Reject,
    /// Accept the first block, reject the next, and so on.
    Review,
}

impl Resolution {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            None | Some("accept") => Ok(Self::Accept),
            Some("reject") => Ok(Self::Reject),
            Some("review") => Ok(Self::Review),
            Some(other) => bail!("unknown resolution '{other}'\n{USAGE}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Settings::new().context("Failed to load configuration")?;
    TelemetryBuilder::from_settings("vdiff", &config.telemetry).init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (Some(file), Some(script)) = (args.first(), args.get(1)) else {
        bail!(USAGE);
    };
    let file = PathBuf::from(file);
    let resolution = Resolution::parse(args.get(2).map(String::as_str))?;

    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let lines = read_script(Path::new(script))
        .with_context(|| format!("Failed to read diff script {script}"))?;

    let buffer = LineBuffer::from_text(&text).shared();
    let line_count = buffer.lock().line_count();
    let buffer_id = BufferId::new(file.display().to_string());

    let broadcaster = Broadcaster::with_capacity(config.diff.event_capacity);
    let manager = SessionManager::new(config.diff.clone(), Arc::new(broadcaster));
    let handle = manager.start_session(
        buffer_id.clone(),
        Arc::clone(&buffer),
        LineRange::new(0, line_count.saturating_sub(1)),
    )?;

    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, cancelling stream");
        cancel.cancel();
    });

    info!(ops = lines.len(), ?resolution, "Streaming diff");
    let stream = futures_util::stream::iter(lines.into_iter().map(Ok::<_, std::io::Error>));
    match manager.run(&handle, stream).await {
        Ok(RunOutcome::Completed { committed_lines }) => {
            info!(lines = committed_lines.len(), "Stream applied");
        }
        Ok(RunOutcome::Cancelled { applied }) => warn!(applied, "Stream cancelled"),
        Err(e) => error!(error = %e, "Stream failed, resolving applied ops"),
    }

    let mut index = 0usize;
    while let Some(block) = manager.blocks(&buffer_id).first().copied() {
        let accept = match resolution {
            Resolution::Accept => true,
            Resolution::Reject => false,
            Resolution::Review => index % 2 == 0,
        };
        manager.accept_reject_block(&buffer_id, &block.id, accept)?;
        index += 1;
    }

    println!("{}", buffer.lock().text());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
