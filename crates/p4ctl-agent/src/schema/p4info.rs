//! P4Info document model.
//!
//! Mirrors the protobuf JSON mapping of `p4.config.v1.P4Info`: camelCase
//! keys, 64-bit integers (`size`) rendered as strings. Only the parts the
//! agent resolves against are modeled; unknown keys are ignored.

use super::SchemaError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Preamble {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub alias: String,
}

/// Match discipline of a table key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Lpm => write!(f, "lpm"),
            MatchKind::Ternary => write!(f, "ternary"),
            MatchKind::Range => write!(f, "range"),
            MatchKind::Optional => write!(f, "optional"),
            MatchKind::Unspecified => write!(f, "unspecified"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFieldInfo {
    pub id: u32,
    pub name: String,
    pub bitwidth: u32,
    #[serde(default)]
    pub match_type: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionRef {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub preamble: Preamble,
    #[serde(default)]
    pub match_fields: Vec<MatchFieldInfo>,
    #[serde(default)]
    pub action_refs: Vec<ActionRef>,
    #[serde(default, deserialize_with = "de_int64")]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParamInfo {
    pub id: u32,
    pub name: String,
    pub bitwidth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionInfo {
    pub preamble: Preamble,
    #[serde(default)]
    pub params: Vec<ParamInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CounterInfo {
    pub preamble: Preamble,
    #[serde(default, deserialize_with = "de_int64")]
    pub size: u64,
}

/// A P4Info document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct P4Info {
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub actions: Vec<ActionInfo>,
    #[serde(default)]
    pub counters: Vec<CounterInfo>,
}

impl P4Info {
    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }
}

/// Accepts an int64 either as a JSON number or as a decimal string.
fn de_int64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
