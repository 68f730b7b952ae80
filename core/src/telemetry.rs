use anyhow::Result;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// The relay binary, the smoke task, and the test harness all go through
/// here; whichever arrives first wins and later calls are no-ops, so none
/// of them need to coordinate.
pub fn init_tracing(filter: EnvFilter) -> Result<()> {
    if INSTALLED.set(()).is_err() {
        return Ok(());
    }
    let subscriber = Registry::default().with(filter).with(fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
