//! Lightning/Aura protocol helpers
//!
//! Builds the action messages a scan sends, recognises captured requests that
//! can be replayed, and interprets action responses.

mod payload;
mod request;
mod response;

pub use payload::{discovery_message, object_items_message, DISCOVERY_DESCRIPTOR, LIST_ITEMS_DESCRIPTOR, PAGE_SIZE};
pub use request::{is_aura_request, rewrite_message_param};
pub use response::{object_exists, parse_discovery_response, parse_object_response, ObjectRecords};
