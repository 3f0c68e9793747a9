mod channel_transport;

pub use channel_transport::{ChannelOffloadTransport, TransportBehavior};
