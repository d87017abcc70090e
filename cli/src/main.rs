//! KubeVox command-line front end.
//!
//! Usage:
//!   kubevox ask how many pods are running in kube-system
//!   kubevox transcribe question.wav --output voice
//!   kubevox repl --context staging
//!   kubevox catalog

mod config;

use std::{io::Write, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    model::AudioClip,
};
use kubevox_core::{
    catalog,
    traits::{Confirmer, GatePolicy},
    Dispatcher, Pipeline, Turn, TurnOutcome,
};
use kubevox_k8s::{builtin_catalog, ClusterAccess};
use kubevox_policy::{default_policy, TomlGatePolicy};
use kubevox_voice::{ElevenLabsSpeaker, LlamaClient, WhisperClient};

use crate::config::Config;

// ── CLI definition ────────────────────────────────────────────────────────────

/// KubeVox: talk to your Kubernetes cluster.
#[derive(Parser)]
#[command(
    name = "kubevox",
    version,
    about = "Voice and text assistant for Kubernetes",
    long_about = "Turns a spoken or typed request into one validated Kubernetes operation\n\
                  and answers with a short sentence, optionally spoken aloud."
)]
struct Cli {
    /// Config file (default: $KUBEVOX_CONFIG or ~/.config/kubevox/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print answers only, or also speak them.
    #[arg(long, value_enum, default_value_t = Output::Text, global = true)]
    output: Output,

    /// Kubeconfig context to use instead of the current one.
    #[arg(long, global = true)]
    context: Option<String>,

    /// Run operations that need confirmation without asking.
    #[arg(long, global = true)]
    yes: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Voice,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one typed request.
    Ask {
        /// The request, e.g. "how many nodes are ready".
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Transcribe a WAV recording and handle it as one request.
    Transcribe { wav: PathBuf },
    /// Read requests line by line from stdin until EOF or "exit".
    Repl,
    /// Print the function catalog handed to the language model.
    Catalog,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("kubevox: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> KubevoxResult<()> {
    let config = Config::load(cli.config.as_deref())?;

    let mut settings = config.cluster();
    if cli.context.is_some() {
        settings.context = cli.context.clone();
    }
    let access = Arc::new(ClusterAccess::new(settings)?);
    let store = Arc::new(builtin_catalog(access)?);

    if let Command::Catalog = cli.command {
        println!("{}", catalog::to_json(&catalog::export(&store)));
        return Ok(());
    }

    let model = LlamaClient::new(config.llama())?;
    model.check_health().await?;

    let gate = load_gate(&config)?;
    let confirmer: Box<dyn Confirmer> = if cli.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirmer)
    };

    let mut pipeline = Pipeline::new(
        Dispatcher::new(store, config.dispatch()),
        Box::new(model),
        gate,
        confirmer,
    );
    if cli.output == Output::Voice {
        pipeline = pipeline.with_speaker(Box::new(ElevenLabsSpeaker::new(config.elevenlabs())?));
    }

    match cli.command {
        Command::Ask { text } => report(pipeline.handle_transcript(&text.join(" ")).await?),
        Command::Transcribe { wav } => {
            let pipeline =
                pipeline.with_transcriber(Box::new(WhisperClient::new(config.whisper())?));
            let audio = read_wav(wav).await?;
            report(pipeline.handle_audio(&audio).await?);
        }
        Command::Repl => repl(&pipeline).await?,
        Command::Catalog => {}
    }
    Ok(())
}

fn load_gate(config: &Config) -> KubevoxResult<Box<dyn GatePolicy>> {
    let policy = match &config.policy.path {
        Some(path) => TomlGatePolicy::from_file(path)?,
        None => default_policy()?,
    };
    info!(rules = policy.rules(), "gate policy loaded");
    Ok(Box::new(policy))
}

async fn read_wav(path: PathBuf) -> KubevoxResult<AudioClip> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| KubevoxError::Transcription {
            reason: format!("cannot read '{}': {e}", path.display()),
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());
    Ok(AudioClip { bytes, file_name })
}

async fn repl(pipeline: &Pipeline) -> KubevoxResult<()> {
    loop {
        prompt("kubevox> ");
        let Some(line) = read_stdin_line().await else {
            println!();
            return Ok(());
        };
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            return Ok(());
        }
        if line.is_empty() {
            continue;
        }
        match pipeline.handle_transcript(line).await {
            Ok(turn) => report(turn),
            // A failed turn does not end the session.
            Err(e) => eprintln!("kubevox: {e}"),
        }
    }
}

fn report(turn: Option<Turn>) {
    let Some(turn) = turn else {
        println!("(nothing heard)");
        return;
    };
    match &turn.outcome {
        TurnOutcome::Dispatched(result) if !result.is_success() => {
            warn!(status = ?result.status(), "operation did not succeed")
        }
        _ => {}
    }
    println!("{}", turn.response);
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// One line from the process-wide stdin buffer. The repl and the
/// confirmation prompt share it, so neither may hold its own reader.
async fn read_stdin_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

// ── Confirmers ────────────────────────────────────────────────────────────────

struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, question: &str) -> bool {
        prompt(&format!("{question} [y/N] "));
        read_stdin_line()
            .await
            .is_some_and(|answer| is_yes(&answer))
    }
}

struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, question: &str) -> bool {
        info!(prompt = %question, "auto-confirmed (--yes)");
        true
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("sure"));
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kubevox", "ask", "how", "many", "pods", "--context", "prod", "--yes", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.context.as_deref(), Some("prod"));
        assert!(cli.yes);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask { text } => assert_eq!(text.join(" "), "how many pods"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn output_mode_is_validated() {
        assert!(Cli::try_parse_from(["kubevox", "--output", "voice", "repl"]).is_ok());
        assert!(Cli::try_parse_from(["kubevox", "--output", "braille", "repl"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
