//! secctx binary
//!
//! Usage: secctx -m server|client [OPTIONS]
//!
//! Runs one negotiation over the rendezvous socket and prints
//! `Server negotiation OK|FAILED` or `Client negotiation OK|FAILED`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use secctx::engine::shared_key::{KeytabFile, ServiceName};
use secctx::engine::{Keytab, SharedKeyEngine};
use secctx::{session, Error, NegotiationOutcome, Role, SessionConfig, DEFAULT_SOCKET_PATH};

#[derive(Parser, Debug)]
#[command(
    name = "secctx",
    version,
    about = "Negotiate a security context over a Unix-domain socket",
    after_help = "EXAMPLES:\n    \
        secctx --generate-keytab host@localhost > keytab.toml\n    \
        secctx -m server -n host@localhost -k keytab.toml\n    \
        secctx -m client -n host@localhost -k keytab.toml"
)]
struct Cli {
    /// Role to play
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Target name (client) or local name (server)
    #[arg(short, long)]
    name: Option<String>,

    /// Rendezvous socket path
    #[arg(short = 'S', long = "socket", value_name = "PATH", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Debug logging with a hex dump of every token
    #[arg(short, long)]
    debug: bool,

    /// Keytab for the built-in shared-key engine
    #[arg(short, long, value_name = "FILE", env = "SECCTX_KEYTAB")]
    keytab: Option<PathBuf>,

    /// Prefix each token with a 4-byte length (both peers must agree)
    #[arg(long)]
    framed: bool,

    /// Fail if a single send or receive blocks longer than this
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print a fresh keytab for PRINCIPAL and exit
    #[arg(long, value_name = "PRINCIPAL", conflicts_with = "mode")]
    generate_keytab: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Listen and accept one context
    Server,
    /// Connect and initiate a context
    Client,
}

impl Mode {
    fn role(self) -> Role {
        match self {
            Mode::Server => Role::Acceptor,
            Mode::Client => Role::Initiator,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Some(principal) = &cli.generate_keytab {
        return match generate_keytab(principal) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(mode) = cli.mode else {
        eprintln!("{}", Error::usage("-m/--mode server|client is required"));
        return ExitCode::from(2);
    };
    let role = mode.role();

    match run(&cli, role) {
        Ok(outcome) => {
            tracing::debug!(
                "{} rounds, {} sent, {} received",
                outcome.rounds,
                outcome.tokens_sent,
                outcome.tokens_received
            );
            println!("{} negotiation OK", role.label());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            println!("{} negotiation FAILED", role.label());
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins over the default level; `-d` still turns on this crate's debug output.
fn log_filter(debug: bool, env: Option<&str>) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    let filter = env
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));
    if !debug {
        return filter;
    }
    match "secctx=debug".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn init_tracing(debug: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(debug, env.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn session_config(cli: &Cli, role: Role) -> SessionConfig {
    let mut config = SessionConfig::new(role).with_socket_path(&cli.socket);
    config.name = cli.name.clone();
    config.keytab = cli.keytab.clone();
    config.options.trace_tokens = cli.debug;
    if cli.framed {
        config = config.framed();
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    config
}

fn run(cli: &Cli, role: Role) -> anyhow::Result<NegotiationOutcome> {
    let config = session_config(cli, role);

    let keytab = match &config.keytab {
        Some(path) => {
            let keytab = Keytab::load(path)?;
            tracing::debug!("Loaded {} keytab entries from {}", keytab.len(), path.display());
            keytab
        }
        None => {
            tracing::warn!("No keytab configured; the shared-key engine holds no keys");
            Keytab::new()
        }
    };
    let engine = SharedKeyEngine::new(keytab);

    let outcome = session::run(&config, &engine).with_context(|| {
        format!(
            "{} negotiation on {}",
            role.label(),
            config.socket_path.display()
        )
    })?;
    Ok(outcome)
}

fn generate_keytab(principal: &str) -> anyhow::Result<()> {
    let name = ServiceName::parse(principal)
        .map_err(|status| anyhow::anyhow!("invalid principal {principal:?}: {status}"))?;
    let keytab = Keytab::generate(name);
    let file = KeytabFile::from_keytab(&keytab);

    println!("# secctx keytab");
    println!("# Generated: {}", chrono::Utc::now());
    println!("# Both peers need this file; keep it private.");
    println!();
    print!("{}", toml::to_string_pretty(&file)?);

    Ok(())
}
