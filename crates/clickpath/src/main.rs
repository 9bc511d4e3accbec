use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use clickpath_engine::config::{ClickpathConfig, ConfigLoader};
use clickpath_engine::dom::{Document, NodeId, locate_target};
use clickpath_engine::formatter::{format_record, format_selection};
use clickpath_engine::protocol::{ClickCapture, ReplayAction, parse_console_line};
use clickpath_engine::provider::{RobulaLoader, RobustPathSlot};
use clickpath_engine::reporter::{
    ClickDispatcher, ClickEvent, InteractionReporter, register_interaction_listener, unregister,
};
use clickpath_engine::selector::{RobulaPlus, build_structural_selector_with, locate_str};
use clickpath_engine::session::{CaptureSource, record};
use clickpath_engine::sink::ConsoleSink;
use clickpath_h::HeadlessRecorder;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clickpath", version, about = "Clickpath selector generator and click recorder")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Configuration file (defaults to ./clickpath.yaml, then ~/.clickpath/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Mode {
    /// Print selectors for elements of a document
    Select {
        /// Markup file, JSON snapshot (*.json), or '-' for stdin
        #[arg(long)]
        file: PathBuf,
        /// Only elements matched by this selector (CSS path or XPath)
        #[arg(long)]
        at: Option<String>,
        #[arg(long, value_enum, default_value_t = Show::Both)]
        show: Show,
    },
    /// List the elements a selector designates
    Resolve {
        #[arg(long)]
        file: PathBuf,
        selector: String,
    },
    /// Check replay actions (one JSON object per stdin line) against a document
    Replay {
        #[arg(long)]
        file: PathBuf,
    },
    /// Turn console output (stdin) into interaction records
    Decode,
    /// Record clicks in a browser and print interaction records
    Record {
        /// Page to open (defaults to recorder.start_url)
        #[arg(long)]
        url: Option<String>,
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Show {
    Structural,
    Robust,
    Both,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries records.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await,
        None => ConfigLoader::load_default().await,
    }
    .context("Failed to load configuration")?;

    match args.mode {
        Mode::Select { file, at, show } => select(&config, &file, at.as_deref(), show),
        Mode::Resolve { file, selector } => resolve(&config, &file, &selector),
        Mode::Replay { file } => replay(&config, &file),
        Mode::Decode => decode(&config).await,
        Mode::Record { url, visible } => run_recorder(&config, url, visible).await,
    }
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    if path.extension().is_some_and(|ext| ext == "json") {
        return Document::parse_snapshot_json(&content)
            .with_context(|| format!("Failed to load snapshot {}", path.display()));
    }
    Document::parse_markup(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn select(
    config: &ClickpathConfig,
    file: &Path,
    at: Option<&str>,
    show: Show,
) -> anyhow::Result<()> {
    let doc = load_document(file)?;
    let targets: Vec<NodeId> = match at {
        Some(selector) => locate_str(&doc, selector)?,
        None => doc.elements(),
    };
    if targets.is_empty() {
        bail!("No element matches");
    }

    let robula = RobulaPlus::new(config.robula.clone());
    for target in targets {
        let structural = match show {
            Show::Robust => String::new(),
            _ => build_structural_selector_with(&doc, target, config.reporter.id_anchor),
        };
        let robust = match show {
            Show::Structural => None,
            _ => Some(robula.generate(&doc, target).map(|x| x.to_string())),
        };
        match show {
            Show::Robust => {
                if let Some(result) = &robust {
                    match result {
                        Ok(xpath) => println!("{}", xpath),
                        Err(e) => eprintln!("{}", e),
                    }
                }
            }
            _ => println!("{}\n", format_selection(&structural, robust.as_ref())),
        }
    }
    Ok(())
}

fn resolve(config: &ClickpathConfig, file: &Path, selector: &str) -> anyhow::Result<()> {
    let doc = load_document(file)?;
    let matches = locate_str(&doc, selector)?;
    println!("{} match(es)", matches.len());
    for el in matches {
        println!(
            "  {}",
            build_structural_selector_with(&doc, el, config.reporter.id_anchor)
        );
    }
    Ok(())
}

fn replay(config: &ClickpathConfig, file: &Path) -> anyhow::Result<()> {
    let doc = load_document(file)?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let action = match ReplayAction::from_json(&line) {
            Ok(action) => action,
            Err(e) => {
                eprintln!("Skipping line: {}", e);
                continue;
            }
        };
        match locate_str(&doc, &action.selector) {
            Ok(matches) if matches.len() == 1 => println!(
                "{} -> {}",
                action.action,
                build_structural_selector_with(&doc, matches[0], config.reporter.id_anchor)
            ),
            Ok(matches) => println!("{} -> {} matches", action.action, matches.len()),
            Err(e) => println!("{} -> invalid selector: {}", action.action, e),
        }
    }
    Ok(())
}

/// Records pass through unchanged; capture payloads are turned into records.
async fn decode(config: &ClickpathConfig) -> anyhow::Result<()> {
    let (reporter, dispatcher) = reporter_for(config).await;
    let token = register_interaction_listener(&dispatcher, &reporter);

    for line in io::stdin().lock().lines() {
        let line = line?;
        match parse_console_line(&line) {
            Ok(Some(record)) => {
                eprintln!("{}", format_record(&record));
                println!("{}", line.trim());
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Malformed interaction: {}", e);
                continue;
            }
        }
        match ClickCapture::from_console_text(&line) {
            Ok(Some(capture)) => {
                let doc = Document::from_snapshot(&capture.snapshot);
                match locate_target(&doc, &capture) {
                    Some(target) => {
                        dispatcher.dispatch(
                            &doc,
                            &ClickEvent {
                                target,
                                button: capture.button,
                            },
                        );
                    }
                    None => eprintln!("Capture target outside snapshot: {:?}", capture.target),
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("Malformed capture: {}", e),
        }
    }

    unregister(&dispatcher, token);
    Ok(())
}

async fn run_recorder(
    config: &ClickpathConfig,
    url: Option<String>,
    visible: bool,
) -> anyhow::Result<()> {
    let (reporter, dispatcher) = reporter_for(config).await;
    let token = register_interaction_listener(&dispatcher, &reporter);

    let mut recorder = HeadlessRecorder::new_with_visibility(visible || config.recorder.visible);
    if let Err(e) = recorder.launch().await {
        eprintln!("Failed to launch recorder: {}", e);
        unregister(&dispatcher, token);
        return Err(e.into());
    }

    let url = url.unwrap_or_else(|| config.recorder.start_url.clone());
    let result = run_session(&mut recorder, &dispatcher, &url, tokio::signal::ctrl_c()).await;
    unregister(&dispatcher, token);
    result
}

/// Navigate and dispatch captures until the source ends or `shutdown`
/// resolves. The source is closed on every exit path so the browser and its
/// profile directory do not outlive the session.
async fn run_session<S, F>(
    source: &mut S,
    dispatcher: &ClickDispatcher,
    url: &str,
    shutdown: F,
) -> anyhow::Result<()>
where
    S: CaptureSource + ?Sized,
    F: Future<Output = io::Result<()>>,
{
    let session = async {
        source.navigate(url).await?;
        tokio::select! {
            clicks = record(&mut *source, dispatcher) => {
                tracing::info!("Recorded {} clicks", clicks);
            }
            signal = shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, closing recorder");
            }
        }
        anyhow::Ok(())
    }
    .await;

    let closed = source.close().await;
    session?;
    closed?;
    Ok(())
}

/// Reporter writing to stdout. The robust provider is loaded up front so the
/// first clicks are not degraded.
async fn reporter_for(config: &ClickpathConfig) -> (Arc<InteractionReporter>, ClickDispatcher) {
    let slot = Arc::new(RobustPathSlot::new());
    slot.start_loading(Arc::new(RobulaLoader::new(config.robula.clone())));
    if let Err(e) = slot.wait_ready().await {
        tracing::warn!("{}", e);
    }

    let reporter = Arc::new(InteractionReporter::new(
        config.reporter.clone(),
        slot,
        Arc::new(ConsoleSink),
    ));
    (reporter, ClickDispatcher::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clickpath_engine::session::SourceError;

    /// A page that never produces a click.
    #[derive(Default)]
    struct IdleSource {
        fail_navigation: bool,
        closed: bool,
    }

    #[async_trait]
    impl CaptureSource for IdleSource {
        async fn launch(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        async fn navigate(&mut self, url: &str) -> Result<(), SourceError> {
            if self.fail_navigation {
                return Err(SourceError::Navigation(url.to_string()));
            }
            Ok(())
        }

        async fn next_capture(&mut self) -> Option<ClickCapture> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), SourceError> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn interrupt_closes_the_source() {
        let mut source = IdleSource::default();
        let dispatcher = ClickDispatcher::new();
        run_session(&mut source, &dispatcher, "about:blank", async { Ok(()) })
            .await
            .unwrap();
        assert!(source.closed);
    }

    #[tokio::test]
    async fn failed_navigation_still_closes_the_source() {
        let mut source = IdleSource {
            fail_navigation: true,
            ..IdleSource::default()
        };
        let dispatcher = ClickDispatcher::new();
        let result = run_session(
            &mut source,
            &dispatcher,
            "http://unreachable.invalid",
            std::future::pending::<io::Result<()>>(),
        )
        .await;
        assert!(result.is_err());
        assert!(source.closed);
    }
}
