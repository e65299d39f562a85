//! docqa-vector
//!
//! In-memory exact cosine index for a single document's units.

pub mod index;
pub mod similarity;

pub use index::{Rebuild, VectorIndex};
pub use similarity::cosine_similarity;
