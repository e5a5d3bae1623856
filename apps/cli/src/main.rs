use std::{io::Write, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vidscope_core::{
    AnalysisSession, ConceptAnalysisClient, EndpointConfig, HttpModel, Provider, RequestState,
    StartError, format_analysis_readable, format_error_readable, format_state_line,
};

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
        }
    }
}

#[derive(Parser)]
#[command(name = "vidscope")]
#[command(about = "Analyze video marketing concepts with generative AI")]
struct Cli {
    /// AI provider for concept analysis
    #[arg(short, long, default_value = "gemini", global = true)]
    provider: CliProvider,

    /// Override the provider's default model
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the provider's endpoint URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Abandon an analysis after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single concept and print the result
    Analyze {
        /// Video concept, e.g. "60-second street food tour of Hanoi"
        #[arg(required = true, num_args = 1..)]
        concept: Vec<String>,

        /// Print the raw JSON result instead of the readable report
        #[arg(long)]
        json: bool,
    },
    /// Interactive analysis panel: one concept per line
    Panel,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,vidscope=debug,vidscope_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn endpoint_config(cli: &Cli) -> EndpointConfig {
    let provider: Provider = cli.provider.clone().into();
    let mut config = EndpointConfig::from_env(provider);
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

fn print_banner() {
    println!(
        "\n{}  {}\n",
        style("vidscope").cyan().bold(),
        style("Video Concept Analyzer").dim()
    );
}

fn render_state(state: &RequestState) {
    match state {
        RequestState::Succeeded(result) => {
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_analysis_readable(result));
        }
        RequestState::Failed(error) => {
            eprintln!("{} {}", style("Error:").red().bold(), format_error_readable(error));
        }
        other => println!("{}", style(format_state_line(other)).dim()),
    }
}

async fn run_analyze(
    mut session: AnalysisSession<HttpModel>,
    provider: Provider,
    concept: &str,
    json: bool,
) -> Result<()> {
    if let Err(e) = session.start(concept) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    if !json {
        print_banner();
    }

    let spinner = create_spinner(&format!("Analyzing concept with {}...", provider.name()));
    let state = session.next_transition().await.cloned().unwrap_or_default();
    spinner.finish_and_clear();

    match &state {
        RequestState::Succeeded(result) if json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        RequestState::Failed(_) => {
            render_state(&state);
            std::process::exit(1);
        }
        other => render_state(other),
    }

    Ok(())
}

async fn run_panel(mut session: AnalysisSession<HttpModel>) -> Result<()> {
    print_banner();
    println!(
        "{}",
        style("Type a concept and press Enter. :state shows status, :reset dismisses, :quit exits.")
            .dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut spinner: Option<ProgressBar> = None;

    loop {
        if spinner.is_none() {
            print!("{} ", style("concept>").cyan().bold());
            std::io::stdout().flush()?;
        }

        let in_flight = session.state().is_in_flight();
        tokio::select! {
            transition = async { session.next_transition().await.cloned() }, if in_flight => {
                if let Some(pb) = spinner.take() {
                    pb.finish_and_clear();
                }
                if let Some(state) = transition {
                    render_state(&state);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    ":quit" | ":q" => break,
                    ":reset" => {
                        if let Some(pb) = spinner.take() {
                            pb.finish_and_clear();
                        }
                        session.reset();
                        println!("{}", style("Panel dismissed.").dim());
                    }
                    ":state" => {
                        println!("{}", style(format_state_line(session.state())).dim())
                    }
                    "" => {}
                    concept => match session.start(concept) {
                        Ok(_) => spinner = Some(create_spinner("Analyzing concept...")),
                        Err(StartError::Busy) => println!(
                            "{} {}",
                            style("Busy:").yellow().bold(),
                            "an analysis is already running (:reset to abandon it)"
                        ),
                        Err(StartError::EmptyInput) => {}
                    },
                }
            }
        }
    }

    if let Some(pb) = spinner.take() {
        pb.finish_and_clear();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = endpoint_config(&cli);
    let provider = config.provider;

    // Validate API key early
    if config.api_key.is_none() {
        eprintln!(
            "{} Missing API key: set {}",
            style("Error:").red().bold(),
            provider.config().env_vars.join(" or ")
        );
        std::process::exit(1);
    }

    debug!(?config, "endpoint configured");

    let session = AnalysisSession::new(ConceptAnalysisClient::from_config(config)?);

    match cli.command {
        Command::Analyze { concept, json } => {
            run_analyze(session, provider, &concept.join(" "), json).await
        }
        Command::Panel => run_panel(session).await,
    }
}
