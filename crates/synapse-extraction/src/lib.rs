pub mod context;
pub mod entities;
pub mod lexicon;
pub mod pipeline;
pub mod quality;
pub mod recognizer;
pub mod relations;
pub mod validation;

pub use context::ExtractionContext;
pub use entities::EntityExtractor;
pub use pipeline::{check_text, ExtractionPipeline};
pub use recognizer::{HttpRecognizer, PatternRecognizer};
pub use relations::RelationExtractor;
pub use validation::{validate_extraction, ExtractionValidation, QualityGrade};
