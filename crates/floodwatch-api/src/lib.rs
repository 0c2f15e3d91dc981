// floodwatch-api: async client for the sensor backend (snapshot endpoints + event channel)

pub mod channel;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use channel::{
    Channel, ChannelEvent, ChannelManager, ChannelState, EventHandler, HandlerId, ReconnectConfig,
};
pub use client::ApiClient;
pub use error::Error;
pub use models::{ApiAlert, ApiDevice};
pub use transport::{TlsMode, TransportConfig};
