//! End-to-end tests: a real relay server on a loopback port, a scripted
//! provider behind it, and either a raw HTTP client or the controller in
//! front.

use burnish_core::provider::CompletionProvider;
use burnish_core::{RelayConfig, RelayHandler};
use burnish_relay::server::RelayServer;
use std::net::SocketAddr;
use std::sync::Arc;

mod controller_tests;
mod relay_tests;

/// Boot a relay on an ephemeral port and return its address.
async fn spawn_relay(provider: Arc<dyn CompletionProvider>, config: RelayConfig) -> SocketAddr {
    let handler = RelayHandler::new(provider, config);
    let server = RelayServer::bind("127.0.0.1:0", handler)
        .await
        .expect("bind relay");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    addr
}

fn enhance_url(addr: SocketAddr) -> String {
    format!("http://{addr}/api/enhance")
}
