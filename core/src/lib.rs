pub mod config;
pub mod error;
pub mod event;
pub mod form;
pub mod id;
pub mod message;
pub mod state;

pub use config::ServerConfig;
pub use error::{AuditRecord, DrafterError, Level};
pub use event::{Correlation, Event, EventBus, EventData};
pub use id::{EventId, RequestId, ResponseId, RouteUrl};
pub use message::{
    Action, ClientMessage, Message, MessageKind, PayloadKind, Request, Response, ServerMessage,
};
pub use state::{SiteState, StateSnapshot};

/// Read-only view of the registered routes, used by verification.
pub trait RouteTable {
    fn has_route(&self, url: &RouteUrl) -> bool;

    fn route_urls(&self) -> Vec<RouteUrl>;
}
