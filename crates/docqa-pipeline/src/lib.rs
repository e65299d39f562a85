//! docqa-pipeline
//!
//! Single-document question answering: ingest a document into a vector
//! index, retrieve the best units for a question, assemble them into a
//! bounded context and ask the completion model.

pub mod assemble;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use assemble::{assemble, render_unit, ContextAssembler};
pub use pipeline::{Answer, AnswerPipeline, Citation, IngestReport, PipelineState};
pub use retriever::Retriever;
