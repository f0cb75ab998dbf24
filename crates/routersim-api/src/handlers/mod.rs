//! HTTP API handlers — exposes node state as JSON.

pub mod messages;
pub mod status;

use routersim_services::{Inbox, NodeHandle};

pub use messages::{handle_inbox, handle_send_message};
pub use status::{handle_routes, handle_status};

#[derive(Clone)]
pub struct ApiState {
    pub node: NodeHandle,
    pub inbox: Inbox,
}
