pub mod client;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod polling;
pub mod proxy;
pub mod stream;

pub use client::{AssistantsClient, ByteStream};
pub use proxy::{ChatBackend, ProxyClient};
pub use stream::StreamParser;
