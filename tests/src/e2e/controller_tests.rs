use super::{enhance_url, spawn_relay};
use burnish_core::provider::MockProvider;
use burnish_core::{
    CredentialStore, EnhanceController, FailureClass, MemoryClipboard, RelayConfig, Status,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Duration;

fn controller_for(endpoint: String) -> EnhanceController {
    EnhanceController::new(
        endpoint,
        CredentialStore::in_memory(),
        Arc::new(MemoryClipboard::default()),
    )
}

#[tokio::test]
async fn full_enhancement_reaches_complete() {
    let provider = Arc::new(MockProvider::with_fragments([
        "```markdown\n",
        "# Goal\n",
        "Write the thing.\n",
        "```",
    ]));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("write the thing");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    assert_eq!(controller.status(), Status::Complete);
    assert!(controller.enhanced().contains("# Goal"));
    assert!(controller.failure().is_none());
}

#[tokio::test]
async fn copy_after_completion_extracts_the_block() {
    let provider = Arc::new(MockProvider::with_fragments([
        "```markdown\n# Goal\nShip.\n```",
    ]));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let clipboard = Arc::new(MemoryClipboard::default());
    let controller = EnhanceController::new(
        enhance_url(addr),
        CredentialStore::in_memory(),
        clipboard.clone(),
    );
    controller.set_prompt("ship it");
    controller.set_api_key("gsk_test");
    controller.submit().await;
    assert_eq!(controller.status(), Status::Complete);

    controller.copy_markdown().expect("copy");
    assert_eq!(clipboard.last_copied().as_deref(), Some("# Goal\nShip."));
    assert!(controller.copied());
}

#[tokio::test]
async fn empty_stream_yields_server_failure_not_complete() {
    let provider = Arc::new(MockProvider::with_fragments(Vec::<String>::new()));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    assert_eq!(controller.status(), Status::Error);
    let failure = controller.failure().expect("failure");
    assert_eq!(failure.class, FailureClass::Server);
    assert_eq!(failure.title, "Empty Response");
    assert!(failure.retryable);
}

#[tokio::test]
async fn auth_rejection_is_not_retryable() {
    let provider = Arc::new(MockProvider::default().failing_with(401, "Invalid API Key"));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_bad");
    controller.submit().await;

    assert_eq!(controller.status(), Status::Error);
    let failure = controller.failure().expect("failure");
    assert_eq!(failure.class, FailureClass::Auth);
    assert!(!failure.retryable);
}

#[tokio::test]
async fn rate_limit_classifies_as_retryable() {
    let provider = Arc::new(MockProvider::default().failing_with(429, "Too many requests"));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    let failure = controller.failure().expect("failure");
    assert_eq!(failure.class, FailureClass::RateLimit);
    assert!(failure.retryable);
}

#[tokio::test]
async fn relay_timeout_surfaces_as_timeout_class() {
    let provider = Arc::new(MockProvider::default().delayed_by(Duration::from_millis(500)));
    let config = RelayConfig {
        call_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let addr = spawn_relay(provider, config).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    let failure = controller.failure().expect("failure");
    assert_eq!(failure.class, FailureClass::Timeout);
}

#[tokio::test]
async fn multibyte_characters_survive_chunk_boundaries() {
    // A hand-rolled relay whose flushes split the é of "café" across two
    // transfer chunks: "caf\xC3" then "\xA9".
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 4096];
        if socket.read(&mut buf).await.is_err() {
            return;
        }
        let head = b"HTTP/1.1 200 OK\r\n\
                     Content-Type: text/event-stream\r\n\
                     Cache-Control: no-cache, no-transform\r\n\
                     Transfer-Encoding: chunked\r\n\r\n";
        let _ = socket.write_all(head).await;
        let _ = socket.write_all(b"4\r\ncaf\xC3\r\n").await;
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = socket.write_all(b"1\r\n\xA9\r\n0\r\n\r\n").await;
        let _ = socket.flush().await;
    });

    let controller = controller_for(format!("http://{addr}/api/enhance"));
    controller.set_prompt("accents");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    assert_eq!(controller.status(), Status::Complete);
    assert_eq!(controller.enhanced(), "café");
}

#[tokio::test]
async fn unresponsive_relay_triggers_network_timeout() {
    // A listener that accepts and then says nothing.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            // Hold the socket open without responding.
            tokio::spawn(async move {
                let _socket = socket;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    let controller = controller_for(format!("http://{addr}/api/enhance"))
        .with_network_timeout(Duration::from_millis(100));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_test");
    controller.submit().await;

    assert_eq!(controller.status(), Status::Error);
    let failure = controller.failure().expect("failure");
    assert_eq!(failure.class, FailureClass::Network);
    assert!(failure.retryable);
}

#[tokio::test]
async fn retry_after_failure_can_succeed() {
    // First relay rejects, second accepts; the controller itself is the
    // constant across retries.
    let failing = Arc::new(MockProvider::default().failing_with(500, "transient"));
    let addr = spawn_relay(failing, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("anything");
    controller.set_api_key("gsk_test");
    controller.submit().await;
    assert_eq!(controller.status(), Status::Error);
    assert!(controller.failure().expect("failure").retryable);

    // Re-submission from the error state is permitted.
    assert!(controller.can_enhance());
    controller.submit().await;
    assert_eq!(controller.status(), Status::Error);
}

#[tokio::test]
async fn start_over_returns_to_editing_with_prompt_retained() {
    let provider = Arc::new(MockProvider::with_fragments(["done"]));
    let addr = spawn_relay(provider, RelayConfig::default()).await;

    let controller = controller_for(enhance_url(addr));
    controller.set_prompt("keep me");
    controller.set_api_key("gsk_test");
    controller.submit().await;
    assert_eq!(controller.status(), Status::Complete);

    controller.start_over();
    assert_eq!(controller.status(), Status::Editing);
    assert!(controller.enhanced().is_empty());
    assert_eq!(controller.prompt(), "keep me");
}
