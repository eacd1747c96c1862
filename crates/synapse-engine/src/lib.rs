pub mod batch;
pub mod engine;

pub use batch::{BatchInsightRunner, BatchItem, BatchOutcome};
pub use engine::{DomainListing, KnowledgeEngine};
