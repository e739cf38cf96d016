use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use mcpchat::agent::{Agent, QueryStatus};
use mcpchat::mcp::client::McpClient;
use mcpchat::providers::{base::Provider, factory};
use mcpchat::tools::invoker::ToolInvoker;
use mcpchat::tools::registry::ToolRegistry;
use mcpchat::tools::server::ToolServer;

mod configuration;
mod error;
mod prompt;
mod screenshots;
mod session;

use configuration::{AgentSettings, Settings};
use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tool server to connect to: a .js or .py script, or an http(s) url
    server: String,

    /// Provider to use (openai, claude or ollama), overrides the environment
    #[arg(short, long)]
    provider: Option<String>,

    /// Run a single query and exit instead of starting a chat
    #[arg(short, long)]
    query: Option<String>,

    /// Directory screenshots are saved to
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// Maximum model turns per query
    #[arg(long)]
    max_iterations: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so they never mix with answers
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let Settings {
        provider: provider_settings,
        mut agent,
        downloads_dir,
    } = Settings::load(cli.provider.as_deref())?;
    if let Some(max_iterations) = cli.max_iterations {
        agent.max_iterations = max_iterations;
    }
    let downloads_dir = cli.downloads_dir.unwrap_or(downloads_dir);

    for line in provider_settings.summary() {
        println!("{}", line);
    }

    let provider = factory::get_provider(provider_settings.into_config())?;

    let client = Arc::new(
        McpClient::connect(&cli.server)
            .await
            .with_context(|| format!("failed to connect to tool server '{}'", cli.server))?,
    );
    println!(
        "{} {}",
        style("Connected to").dim(),
        style(client.server_name()).green()
    );

    let result = run(
        client.clone(),
        provider,
        &agent,
        downloads_dir,
        cli.query.as_deref(),
    )
    .await;

    if let Err(e) = client.disconnect().await {
        tracing::warn!(error = %e, "failed to disconnect from tool server");
    }
    result
}

async fn run(
    client: Arc<McpClient>,
    provider: Box<dyn Provider>,
    settings: &AgentSettings,
    downloads_dir: PathBuf,
    query: Option<&str>,
) -> Result<()> {
    let registry = ToolRegistry::discover(client.as_ref()).await?;
    println!(
        "Connected to server with tools: {}",
        style(registry.names().join(", ")).cyan()
    );

    let mut invoker = ToolInvoker::new(client);
    if let Some(timeout) = settings.tool_timeout() {
        invoker = invoker.with_timeout(timeout);
    }

    let mut agent = Agent::new(provider, Arc::new(registry), invoker)
        .with_max_iterations(settings.max_iterations);
    if let Some(system_prompt) = &settings.system_prompt {
        agent = agent.with_system_prompt(system_prompt.clone());
    }

    let prompt = RustylinePrompt::new()?;
    let mut session = Session::new(agent, Box::new(prompt), downloads_dir);

    match query {
        Some(query) => {
            if session.headless_start(query).await == Some(QueryStatus::Failed) {
                bail!("query failed");
            }
            Ok(())
        }
        None => session.start().await,
    }
}
