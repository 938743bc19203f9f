//! CLI command implementations.

pub(crate) mod convert;
pub(crate) mod inspect;

pub(crate) use convert::ConvertArgs;
pub(crate) use inspect::InspectArgs;
