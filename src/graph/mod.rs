//! Follow-graph data model
//!
//! Usernames, relationship kinds, and the sets exchanged between the remote
//! client, the consistency layer, and the batch executor.

mod relationship;
mod username;

pub use relationship::{Direction, MutationKind, RelationshipKind, RelationshipSet};
pub use username::Username;
