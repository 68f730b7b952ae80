use anyhow::Result;
use burnish_core::provider::{CompletionProvider, GroqProvider, MockProvider, ProviderKind};
use burnish_core::telemetry;
use burnish_core::RelayHandler;
use burnish_relay::config::RelaySettings;
use burnish_relay::server::RelayServer;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "burnish-relay", version, about = "Prompt-enhancement relay endpoint")]
struct Cli {
    /// Address to listen on, overriding the settings file.
    #[arg(long)]
    bind: Option<String>,
    /// Path to the relay settings file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve scripted responses instead of calling the real provider.
    #[arg(long)]
    mock: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing(EnvFilter::from_default_env())?;
    let cli = Cli::parse();

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let mut settings = RelaySettings::load(cli.config.as_deref()).await?;
        settings.apply_env_overrides();
        if let Some(bind) = cli.bind {
            settings.bind_addr = bind;
        }

        let kind = if cli.mock {
            ProviderKind::Mock
        } else {
            ProviderKind::from_environment()
        };
        let provider: Arc<dyn CompletionProvider> = match kind {
            ProviderKind::Groq => Arc::new(GroqProvider::with_base_url(&settings.base_url)?),
            ProviderKind::Mock => Arc::new(MockProvider::default()),
        };
        info!(provider = ?kind, model = %settings.model, "starting relay");

        let handler = RelayHandler::new(provider, settings.relay_config());
        let server = RelayServer::bind(&settings.bind_addr, handler).await?;
        server.run().await?;
        Ok(())
    })
}
