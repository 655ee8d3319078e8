//! Query-result shapes that have no counterpart in the domain model.

use serde::Serialize;

/// Staged posting counts for one source, split by sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub total: i64,
    pub imported: i64,
}

impl SourceCount {
    pub fn pending(&self) -> i64 {
        self.total - self.imported
    }
}
