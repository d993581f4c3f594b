pub mod applications;
pub mod clicks;
pub mod events;
pub mod leads;
pub mod pagination;
pub mod partners;
pub mod profiles;
pub mod redemptions;

/// Raised when a text column or request field does not name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
