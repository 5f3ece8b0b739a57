use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tst_core::{
    CompletionRequest, Diagnostic, Document, Engine, EngineConfig, LexicalMode, OracleClient, Position, Severity,
    StaticOracle, ValidityMatrix,
};


const DEFAULT_TRACE_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(
    name = "tst",
    author,
    version,
    about = "Check and probe TEST.* scripts",
    long_about = None,
    after_help = "Positions are zero-based, characters count UTF-16 units (as in LSP)."
)]
struct CliArgs {
    /// Log to stderr: -v for debug, -vv for trace. RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Report diagnostics for a script; exits with 1 when any error is found.
    Check {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
        /// Validity rules table (TOML) replacing the built-in one
        #[arg(long, value_name = "TOML", value_parser = parse_sanitized_path)]
        rules: Option<PathBuf>,
        /// Also report script-structure warnings
        #[arg(long)]
        strict: bool,
    },
    /// Print the completion context resolved at a position.
    Context {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[command(flatten)]
        at: At,
    },
    /// List completion items at a position, answering choice queries from a fixture.
    Complete {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[command(flatten)]
        at: At,
        /// JSON object mapping a line-so-far to a choice list or a full response
        #[arg(long, value_name = "JSON", value_parser = parse_sanitized_path)]
        choices: Option<PathBuf>,
        /// Character that triggered the request
        #[arg(long)]
        trigger: Option<char>,
        #[arg(long)]
        json: bool,
    },
    /// Print the hover text at a position.
    Hover {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[command(flatten)]
        at: At,
        #[arg(long, value_name = "JSON", value_parser = parse_sanitized_path)]
        choices: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, clap::Args)]
struct At {
    #[arg(long)]
    line: u32,
    #[arg(long)]
    character: u32,
    /// Treat the file as a coded-test source (only `// vmock` comments)
    #[arg(long)]
    embedded: bool,
    /// Environment passed to choice queries; defaults to the script's `-- Environment:` name
    #[arg(long)]
    environment: Option<String>,
}

impl At {
    fn position(&self) -> Position {
        Position::new(self.line, self.character)
    }

    fn mode(&self) -> LexicalMode {
        if self.embedded {
            LexicalMode::EmbeddedComment
        } else {
            LexicalMode::Script
        }
    }

    fn environment(&self, document: &Document) -> String {
        self.environment
            .clone()
            .or_else(|| document.environment_name())
            .unwrap_or_default()
    }
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(anyhow::anyhow!(
            "Parent directory components ('..') are not allowed in file paths."
        ));
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn init_tracing(verbose: u8) {
    let filter = match (std::env::var("RUST_LOG").ok(), verbose) {
        (Some(expr), _) => EnvFilter::try_new(expr).unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER)),
        (None, 0) => EnvFilter::new(DEFAULT_TRACE_FILTER),
        (None, 1) => EnvFilter::new("tst_core=debug,tst=debug"),
        (None, _) => EnvFilter::new("tst_core=trace,tst=trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path.display()))?;
    Ok(Document::from_text(&text))
}

fn engine_with(config: EngineConfig, choices: Option<&Path>) -> anyhow::Result<Engine> {
    let oracle = match choices {
        Some(path) => {
            let fixture =
                StaticOracle::load(path).with_context(|| format!("Failed to load choices '{}'", path.display()))?;
            debug!(entries = fixture.len(), "loaded choice fixture");
            OracleClient::new(Arc::new(fixture))
        }
        None => OracleClient::default(),
    };
    Ok(Engine::new(config, Arc::new(oracle)))
}

fn format_diagnostic(file: &Path, diag: &Diagnostic) -> String {
    format!("{}:{}", file.display(), diag)
}

fn check(file: &Path, json: bool, rules: Option<&Path>, strict: bool) -> anyhow::Result<bool> {
    let document = read_document(file)?;
    let mut config = EngineConfig::default().with_structural_checks(strict);
    if let Some(path) = rules {
        config = config.with_rules(ValidityMatrix::load(path)?);
    }
    let diagnostics = engine_with(config, None)?.diagnostics(&document);

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        for diag in &diagnostics {
            println!("{}", format_diagnostic(file, diag));
        }
    }
    Ok(!diagnostics.iter().any(|d| d.severity == Severity::Error))
}

async fn complete(file: &Path, at: &At, choices: Option<&Path>, trigger: Option<char>, json: bool) -> anyhow::Result<()> {
    let document = read_document(file)?;
    let engine = engine_with(EngineConfig::default(), choices)?;
    let request = CompletionRequest {
        document_id: file.display().to_string(),
        environment: at.environment(&document),
        document,
        position: at.position(),
        mode: at.mode(),
        trigger,
    };
    let outcome = engine.complete(&request).await;
    for notice in &outcome.notices {
        eprintln!("note: {notice}");
    }
    if let Some(failure) = &outcome.backend_failure {
        eprintln!("{}", format_diagnostic(file, failure));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.items)?);
    } else {
        for item in &outcome.items {
            if item.detail.is_empty() {
                println!("{}", item.label);
            } else {
                println!("{}\t{}", item.label, item.detail);
            }
        }
    }
    Ok(())
}

async fn hover(file: &Path, at: &At, choices: Option<&Path>) -> anyhow::Result<()> {
    let document = read_document(file)?;
    let engine = engine_with(EngineConfig::default(), choices)?;
    let environment = at.environment(&document);
    let id = file.display().to_string();
    if let Some(text) = engine.hover(&id, &document, at.position(), &environment).await {
        println!("{text}");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let CliArgs { verbose, command } = CliArgs::parse();
    init_tracing(verbose);

    match command {
        Commands::Check {
            file,
            json,
            rules,
            strict,
        } => {
            if !check(&file, json, rules.as_deref(), strict)? {
                std::process::exit(1);
            }
        }
        Commands::Context { file, at } => {
            let document = read_document(&file)?;
            let engine = engine_with(EngineConfig::default(), None)?;
            let context = engine.context(&document, at.position(), at.mode());
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
        Commands::Complete {
            file,
            at,
            choices,
            trigger,
            json,
        } => complete(&file, &at, choices.as_deref(), trigger, json).await?,
        Commands::Hover { file, at, choices } => hover(&file, &at, choices.as_deref()).await?,
    }
    Ok(())
}
