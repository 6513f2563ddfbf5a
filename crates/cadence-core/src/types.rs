//! Policy enums shared by the expansion and configuration layers.

use serde::Deserialize;

/// Whether an occurrence starting exactly at a rule's UNTIL instant is kept.
///
/// RFC 5545 says UNTIL is inclusive, but producers disagree in practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntilBoundary {
    #[default]
    Inclusive,
    Exclusive,
}

/// Which instant wins when a local time occurs twice (DST fall-back overlap).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldPolicy {
    /// The first of the two instants (the offset in effect before the shift).
    #[default]
    Earlier,
    /// The second of the two instants.
    Later,
}

impl std::fmt::Display for UntilBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inclusive => "inclusive",
            Self::Exclusive => "exclusive",
        })
    }
}
