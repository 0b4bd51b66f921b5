//! Retrieval records shared by the search clients and the query pipeline
//!
//! These are the fixed-shape forms of what the knowledge graph and the
//! document stores return; raw responses are validated into them at the
//! client boundary.

mod graph;
mod store;

pub use graph::{Direction, GraphHit, GraphRelationship, SIMILARITY_FLOOR};
pub use store::{StoreInfo, StoreStatus};
