//! Error types for Markdown rendering.

/// Markdown could not be turned into cell write groups.
///
/// Callers decide whether to propagate this or fall back to writing the
/// Markdown source as plain text.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RenderError {
    /// List nesting exceeded the configured limit.
    #[error("list nesting depth {depth} exceeds the limit of {limit}")]
    NestingTooDeep {
        /// Depth that was reached.
        depth: usize,
        /// Configured maximum depth.
        limit: usize,
    },

    /// An end event arrived without a matching start.
    #[error("unbalanced markdown: unexpected end of {0}")]
    UnbalancedEnd(&'static str),

    /// A `ListEnd` token arrived with no open list.
    #[error("list end without an open list")]
    UnbalancedList,

    /// A `ListItem` token arrived with no open list.
    #[error("list item outside of a list")]
    OrphanListItem,
}
