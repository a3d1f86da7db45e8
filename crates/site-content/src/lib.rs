//! Content store: hydrate from the Persistent Store, update with shallow-merge or
//! replace semantics, persist every change and fan it out to subscribers.

mod bus;
mod defaults;
mod hydrate;
mod records;
mod store;

pub use bus::{NotificationBus, SubscriptionId};
pub use defaults::{default_section, default_tree};
pub use hydrate::overlay_onto_defaults;
pub use records::{next_record_id, record_id};
pub use site_types::{ContentChange, ContentError, ContentTree, SectionKey, SectionUpdate};
pub use store::{ContentStore, CONTENT_EXPORT_VERSION};
