//! Wire enums for read source and server-timestamp resolution.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a read is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    ServerAndCache,
    ServerOnly,
    CacheOnly,
}

/// How pending server timestamps are reported in snapshot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServerTimestampBehavior {
    #[default]
    None,
    Estimate,
    Previous,
}

impl Source {
    pub const TOKENS: [&'static str; 3] = ["serverAndCache", "server", "cache"];
}

impl ServerTimestampBehavior {
    pub const TOKENS: [&'static str; 3] = ["none", "estimate", "previous"];
}

/// # Errors
/// `CompileError::InvalidSource` for any token outside `serverAndCache | server | cache`.
pub fn map_source(token: &str) -> Result<Source, CompileError> {
    match token {
        "serverAndCache" => Ok(Source::ServerAndCache),
        "server" => Ok(Source::ServerOnly),
        "cache" => Ok(Source::CacheOnly),
        other => Err(CompileError::InvalidSource(other.to_string())),
    }
}

/// # Errors
/// `CompileError::InvalidServerTimestampBehavior` for any token outside
/// `none | estimate | previous`.
pub fn map_timestamp_behavior(token: &str) -> Result<ServerTimestampBehavior, CompileError> {
    match token {
        "none" => Ok(ServerTimestampBehavior::None),
        "estimate" => Ok(ServerTimestampBehavior::Estimate),
        "previous" => Ok(ServerTimestampBehavior::Previous),
        other => Err(CompileError::InvalidServerTimestampBehavior(other.to_string())),
    }
}

impl FromStr for Source {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        map_source(s)
    }
}

impl FromStr for ServerTimestampBehavior {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        map_timestamp_behavior(s)
    }
}
