use serde::{Deserialize, Serialize};

/// How much history backed a computed result.
///
/// Together with `Err(..)` this lets callers tell apart "confidently computed",
/// "computed with low confidence due to sparse data" and "could not compute".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Sufficient,
    Sparse,
}

impl DataQuality {
    pub fn is_sparse(self) -> bool {
        matches!(self, DataQuality::Sparse)
    }

    /// The worse of two qualities.
    pub fn combine(self, other: DataQuality) -> DataQuality {
        if self.is_sparse() || other.is_sparse() {
            DataQuality::Sparse
        } else {
            DataQuality::Sufficient
        }
    }
}
