//! artdoc CLI: symptom-driven diagnosis and hypothesis verification.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use artdoc::client::{EngineBridge, discover_server};
use artdoc::config::ArtdocConfig;
use artdoc::controller::DiagnosticSession;
use artdoc::error::{ArtdocResult, SessionError};
use artdoc::kb::KnowledgeBase;
use artdoc::model::{AnalysisResult, ConclusionId, SymptomId};
use artdoc::paths::ArtdocPaths;
use artdoc::render::{self, JsonSink, ResultSink, TextSink};

#[derive(Parser)]
#[command(name = "artdoc", version, about = "Rule-based diagnostic assistant")]
struct Cli {
    /// CSV rule base to run in-process.
    #[arg(long, global = true)]
    knowledge_base: Option<PathBuf>,

    /// Base URL of an artdocd server (e.g. http://127.0.0.1:8300).
    #[arg(long, global = true, conflicts_with = "knowledge_base")]
    server: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/artdoc/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit newline-delimited JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List observable symptoms.
    Symptoms {
        /// Only show symptoms whose name contains this text.
        #[arg(long)]
        filter: Option<String>,
    },

    /// List conclusions that can be verified.
    Conclusions,

    /// Forward-chain from the given symptoms.
    Diagnose {
        /// Symptom ids, e.g. `fever cough`.
        #[arg(required = true)]
        symptoms: Vec<String>,
    },

    /// Check whether a conclusion is supported by the given symptoms.
    Verify {
        /// Conclusion to verify.
        target: String,
        /// Symptom ids to check against.
        #[arg(required = true)]
        symptoms: Vec<String>,
    },

    /// Interactive session: toggle symptoms and run analyses.
    Shell,

    /// Print the effective configuration as TOML.
    Config {
        /// Also write it to the config file, creating the file if needed.
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let (paths, config_path, config) = load_settings(&cli)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    if let Commands::Config { write } = &cli.command {
        return show_config(&config, &config_path, *write);
    }

    let bridge = resolve_bridge(&cli, &config, &paths).await?;
    tracing::debug!(engine = %bridge.describe(), "engine resolved");

    let sink: Box<dyn ResultSink> = if cli.json {
        Box::new(JsonSink)
    } else {
        Box::new(TextSink)
    };

    let session = DiagnosticSession::start(bridge).await?;

    match cli.command {
        Commands::Symptoms { filter } => {
            let symptoms = session.catalog().symptoms();
            let shown = render::filter_symptoms(symptoms, filter.as_deref().unwrap_or(""));
            print_ids(cli.json, shown.iter().map(|s| s.as_str()))?;
        }

        Commands::Conclusions => {
            let conclusions = session.catalog().conclusions()?;
            print_ids(cli.json, conclusions.iter().map(|c| c.as_str()))?;
        }

        Commands::Diagnose { symptoms } => {
            select_all(&session, &symptoms)?;
            let result = session.run_diagnosis().await?;
            sink.emit(&AnalysisResult::Diagnosis(result));
        }

        Commands::Verify { target, symptoms } => {
            select_all(&session, &symptoms)?;
            let target = ConclusionId::new(target);
            let result = session.run_verification(&target).await?;
            sink.emit(&AnalysisResult::Verification { target, result });
        }

        Commands::Shell => {
            run_shell(&session, sink.as_ref()).await?;
        }

        // Answered before an engine is needed.
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// XDG directories, the config file in use, and its contents.
fn load_settings(cli: &Cli) -> ArtdocResult<(ArtdocPaths, PathBuf, ArtdocConfig)> {
    let paths = ArtdocPaths::resolve()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = ArtdocConfig::load_or_default(&config_path)?;
    Ok((paths, config_path, config))
}

fn show_config(config: &ArtdocConfig, path: &Path, write: bool) -> Result<()> {
    print!("{}", config.to_toml()?);
    if write {
        config.save(path)?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

/// Pick the engine: explicit flags, then config, then a running artdocd,
/// then the default rule base on disk.
async fn resolve_bridge(
    cli: &Cli,
    config: &ArtdocConfig,
    paths: &ArtdocPaths,
) -> ArtdocResult<EngineBridge> {
    if let Some(url) = &cli.server {
        return Ok(EngineBridge::remote(url, config.timeout()));
    }
    if let Some(path) = &cli.knowledge_base {
        return local_bridge(path);
    }
    if let Some(url) = &config.server_url {
        return Ok(EngineBridge::remote(url, config.timeout()));
    }
    if let Some(path) = &config.knowledge_base {
        return local_bridge(path);
    }

    let discover_paths = paths.clone();
    let discovered = tokio::task::spawn_blocking(move || discover_server(&discover_paths))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "artdocd discovery failed");
            None
        });
    if let Some(info) = discovered {
        tracing::info!(pid = info.pid, url = %info.base_url(), "using running artdocd");
        return Ok(EngineBridge::remote(&info.base_url(), config.timeout()));
    }

    let installed = paths.default_knowledge_base();
    let path = if installed.exists() {
        installed
    } else {
        PathBuf::from("datasets/knowledge_base.csv")
    };
    local_bridge(&path)
}

fn local_bridge(path: &Path) -> ArtdocResult<EngineBridge> {
    let kb = KnowledgeBase::load(path)?;
    Ok(EngineBridge::local(Arc::new(kb)))
}

fn select_all(session: &DiagnosticSession<EngineBridge>, symptoms: &[String]) -> ArtdocResult<()> {
    for id in symptoms {
        let id = SymptomId::new(id.as_str());
        // Repeating an id on the command line must not deselect it.
        if !session.is_selected(&id) {
            session.toggle(&id)?;
        }
    }
    Ok(())
}

fn print_ids<'a>(json: bool, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    if json {
        let ids: Vec<&str> = ids.collect();
        println!("{}", serde_json::to_string(&ids).into_diagnostic()?);
    } else {
        for id in ids {
            println!("{id}\t{}", render::display_name(id));
        }
    }
    Ok(())
}

const SHELL_HELP: &str = "\
Commands:
  list [text]       list symptoms (optionally filtered), * marks selected
  toggle <id>...    select or deselect symptoms
  selected          show the current selection
  count             number of selected symptoms
  conclusions       list conclusions available for verification
  diagnose          run forward diagnosis on the selection
  verify <id>       verify a conclusion against the selection
  reset             clear the selection
  help              show this help
  quit              leave the session";

async fn run_shell(session: &DiagnosticSession<EngineBridge>, sink: &dyn ResultSink) -> Result<()> {
    sink.notice(&format!(
        "{} symptoms loaded from {}. Type `help` for commands.",
        session.catalog().symptoms().len(),
        session.engine().describe()
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if let Some(prompt) = sink.prompt() {
            print!("{prompt}");
            std::io::stdout().flush().into_diagnostic()?;
        }

        let Some(line) = lines.next_line().await.into_diagnostic()? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        let outcome = match command {
            "quit" | "exit" => break,
            "help" => {
                sink.notice(SHELL_HELP);
                Ok(())
            }
            "list" => {
                let query = args.join(" ");
                for id in render::filter_symptoms(session.catalog().symptoms(), &query) {
                    let mark = if session.is_selected(id) { '*' } else { ' ' };
                    sink.notice(&format!("{mark} {id}\t{}", render::display_name(id.as_str())));
                }
                Ok(())
            }
            "toggle" => {
                for id in &args {
                    match session.toggle(&SymptomId::new(*id)) {
                        Ok(true) => sink.notice(&format!("+ {id}")),
                        Ok(false) => sink.notice(&format!("- {id}")),
                        Err(e) => report(e),
                    }
                }
                sink.notice(&format!("{} selected", session.count()));
                Ok(())
            }
            "selected" => {
                let names: Vec<String> = session.selected().iter().map(|s| s.to_string()).collect();
                sink.notice(&names.join(", "));
                Ok(())
            }
            "count" => {
                sink.notice(&format!("{} selected", session.count()));
                Ok(())
            }
            "conclusions" => session.catalog().conclusions().map(|list| {
                for c in list {
                    sink.notice(c.as_str());
                }
            }),
            "diagnose" => session
                .run_diagnosis()
                .await
                .map(|r| sink.emit(&AnalysisResult::Diagnosis(r))),
            "verify" => {
                let target = ConclusionId::new(args.join(" "));
                session
                    .run_verification(&target)
                    .await
                    .map(|result| sink.emit(&AnalysisResult::Verification { target, result }))
            }
            "reset" => {
                session.reset();
                sink.notice("Session reset successfully.");
                Ok(())
            }
            other => {
                sink.notice(&format!("unknown command `{other}`; type `help`"));
                Ok(())
            }
        };

        if let Err(e) = outcome {
            report(e);
        }
    }
    Ok(())
}

fn report(e: SessionError) {
    eprintln!("{:?}", miette::Report::new(e));
}
