#![warn(missing_docs)]
//! Resource kinds and the error chain helper used when reporting errors.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Report error chain.
pub trait ErrorChain {
    /// Full error chain as a string separated by ':'.
    fn full_string(&self) -> String;
}

impl<T> ErrorChain for T
where
    T: std::error::Error,
{
    /// loops through the error chain and formats into a single string
    /// containing all the lower level errors.
    fn full_string(&self) -> String {
        let mut msg = format!("{self}");
        let mut opt_source = self.source();
        while let Some(source) = opt_source {
            msg = format!("{msg}: {source}");
            opt_source = source.source();
        }
        msg
    }
}

/// All the different variants of Resources.
#[derive(
    Serialize, Deserialize, Debug, Copy, Clone, AsRefStr, Display, Eq, PartialEq, Default,
)]
pub enum ResourceKind {
    /// Unknown or unspecified resource.
    #[default]
    Unknown,
    /// Cluster resource.
    Cluster,
    /// Node resource.
    Node,
    /// Device resource.
    Device,
    /// Brick resource.
    Brick,
    /// Volume resource.
    Volume,
    /// Block volume resource.
    BlockVolume,
    /// Pending operation record.
    Operation,
}
