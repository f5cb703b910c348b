//! Chunk quality assessment: cheap structural heuristics or an LLM judge.

pub mod ai;
pub mod assessment;
pub mod error;
pub mod heuristics;
pub mod label;

pub use ai::{AiAssessment, AiAssessor, AiJudgeConfig};
pub use assessment::{Assessment, ChunkAssessment, Verdict};
pub use error::QualityError;
pub use heuristics::{HeuristicAssessor, QualityConfig};
pub use label::{AssessmentMethod, QualityLabel};
