pub mod outbox_dispatcher;
pub mod transports;

pub use outbox_dispatcher::OutboxDispatcher;
pub use transports::{build_transport, LogTransport, WebhookTransport};
