use anyhow::{anyhow, Result};
use burnish_core::provider::MockProvider;
use burnish_core::{
    telemetry, CredentialStore, EnhanceController, MemoryClipboard, RelayConfig, RelayHandler,
    Status,
};
use burnish_relay::server::RelayServer;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Burnish")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot a mock relay and drive one enhancement through the controller.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let provider = Arc::new(MockProvider::with_fragments([
            "```markdown\n",
            "# Goal\nSmoke-test the relay.\n",
            "```",
        ]));
        let handler = RelayHandler::new(provider, RelayConfig::default());
        let server = RelayServer::bind("127.0.0.1:0", handler).await?;
        let addr = server.local_addr();
        tokio::spawn(server.run());

        let clipboard = Arc::new(MemoryClipboard::default());
        let controller = EnhanceController::new(
            format!("http://{addr}/api/enhance"),
            CredentialStore::in_memory(),
            clipboard.clone(),
        );
        controller.set_prompt("ping from xtask");
        controller.set_api_key("gsk_smoke");
        controller.submit().await;

        if controller.status() != Status::Complete {
            return Err(anyhow!(
                "smoke enhancement did not complete: {:?}",
                controller.failure()
            ));
        }
        controller.copy_markdown()?;
        info!(
            chars = controller.enhanced().chars().count(),
            copied = clipboard.last_copied().is_some(),
            "smoke enhancement completed"
        );
        Ok(())
    })
}
