pub mod clipboard;
pub mod controller;
pub mod error;
pub mod keystore;
pub mod options;
pub mod prompt;
pub mod provider;
pub mod relay;
pub mod telemetry;
pub mod text;

pub use clipboard::{extract_markdown_block, Clipboard, MemoryClipboard, SystemClipboard};
pub use controller::{EnhanceController, Status};
pub use error::{EnhanceFailure, ErrorCode, FailureClass, RelayError};
pub use keystore::CredentialStore;
pub use options::EnhanceOptions;
pub use provider::{CompletionProvider, GroqProvider, MockProvider, ProviderKind, StreamChunk};
pub use relay::{EnhanceRequest, RelayConfig, RelayHandler, RelayOutcome};
pub use text::StreamDecoder;
