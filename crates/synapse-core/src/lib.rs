pub mod analysis;
pub mod config;
pub mod delta;
pub mod domain;
pub mod entity;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod narrative;
pub mod numeric;
pub mod reasoning;
pub mod text;

pub use analysis::{AnalysisResult, CentralityScore, Community, GraphStatistics};
pub use config::{AcceleratorConfig, EngineConfig};
pub use delta::{ChangeLogEntry, ChangeSummary, DeltaType, GraphDelta};
pub use domain::{ActiveDomain, DomainConfig, DomainRegistry};
pub use entity::{category, Entity, Graph, GraphMetadata, NodeType, Properties, Relation, TextIssue};
pub use error::{Result, SynapseError};
pub use extraction::{EntityRecognizer, ExtractionOptions, RecognizedEntity};
pub use graph::{GraphAccelerator, StoreStatistics};
pub use narrative::{InsightCard, NarrativeGenerator};
