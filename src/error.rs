use crate::port::{PortRange, SearchType};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(
        "Invalid search type `{value}`. Available options are [{}].",
        SearchType::variants().join("|")
    )]
    InvalidSearchType { value: String },

    #[error("Invalid port range [{min}, {max}]: expected 1 <= min <= max.")]
    InvalidPortRange { min: u16, max: u16 },

    #[error(
        "Unable to find available port in range {range} with {search_type} search in {tries} tries."
    )]
    NoAvailablePortFound {
        range: PortRange,
        search_type: SearchType,
        tries: usize,
    },

    #[error("Invalid time expression `{expr}`: {reason}.")]
    InvalidTimeExpression { expr: String, reason: &'static str },
}
