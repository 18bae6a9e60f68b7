//! Iterator configuration.
//!
//! An iterator can be described in JSON:
//!
//! ```json
//! {
//!   "sources": ["$DATA/run0", "$DATA/run1"],
//!   "groups": "geds/hit",
//!   "entry_list": [[0, 4, 9], [2]],
//!   "field_mask": ["energy", "channel"],
//!   "buffer_len": 1000,
//!   "friend": { "sources": ["$DATA/run0", "$DATA/run1"], "groups": "geds/raw" }
//! }
//! ```
//!
//! `sources` and `groups` each accept a string or an array of strings. A single
//! source is paired with every group and a single group with every source.
//!
//! A source may be a wildcard pattern such as `"$DATA/run*"`. It stands for
//! every source the storage finds matching it, in sorted order, each paired
//! with the pattern's group.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChunkError, Result};
use crate::iterator::{ChunkIterator, DEFAULT_BUFFER_LEN};
use crate::selection::Selection;
use crate::storage::Storage;

/// One identifier or an ordered list of identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sources {
    One(String),
    Many(Vec<String>),
}

impl Sources {
    pub fn len(&self) -> usize {
        match self {
            Sources::One(_) => 1,
            Sources::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Sources {
    fn from(s: &str) -> Self {
        Sources::One(s.to_string())
    }
}

impl From<String> for Sources {
    fn from(s: String) -> Self {
        Sources::One(s)
    }
}

impl From<Vec<String>> for Sources {
    fn from(items: Vec<String>) -> Self {
        Sources::Many(items)
    }
}

impl From<Vec<&str>> for Sources {
    fn from(items: Vec<&str>) -> Self {
        Sources::Many(items.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Sources {
    fn from(items: [&str; N]) -> Self {
        Sources::Many(items.iter().map(|s| s.to_string()).collect())
    }
}

impl TryFrom<&Value> for Sources {
    type Error = ChunkError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Sources::One(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(String::from).ok_or_else(|| {
                        ChunkError::argument_type(format!("Expected a string, got {}", item))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Sources::Many),
            other => Err(ChunkError::argument_type(format!(
                "Expected a string or an array of strings, got {}",
                other
            ))),
        }
    }
}

/// Pair sources with groups, broadcasting a single side across the other.
pub fn pair_sources(sources: &Sources, groups: &Sources) -> Result<Vec<(String, String)>> {
    if sources.is_empty() || groups.is_empty() {
        return Err(ChunkError::argument_type("Sources and groups must not be empty"));
    }

    let pairs = match (sources, groups) {
        (Sources::One(s), Sources::One(g)) => vec![(s.clone(), g.clone())],
        (Sources::One(s), Sources::Many(gs)) => {
            gs.iter().map(|g| (s.clone(), g.clone())).collect()
        }
        (Sources::Many(ss), Sources::One(g)) => {
            ss.iter().map(|s| (s.clone(), g.clone())).collect()
        }
        (Sources::Many(ss), Sources::Many(gs)) => {
            if ss.len() != gs.len() {
                return Err(ChunkError::argument_type(format!(
                    "Got {} sources and {} groups; lengths must match",
                    ss.len(),
                    gs.len()
                )));
            }
            ss.iter().cloned().zip(gs.iter().cloned()).collect()
        }
    };
    Ok(pairs)
}

/// Expand `~/`, `$VAR` and `${VAR}` in a path, then join it under `base_path`
/// when relative. Unset variables are left in place.
pub fn expand_path(path: &str, base_path: Option<&Path>) -> String {
    let expanded = expand_env(path);
    match base_path {
        Some(base) if Path::new(&expanded).is_relative() => {
            let base = expand_env(&base.to_string_lossy());
            PathBuf::from(base).join(expanded).to_string_lossy().into_owned()
        }
        _ => expanded,
    }
}

fn expand_env(path: &str) -> String {
    let vars = shellexpand::env_with_context_no_errors(path, |var| std::env::var(var).ok());
    shellexpand::tilde(vars.as_ref()).into_owned()
}

/// Global or per-source entry list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryList {
    Global(Vec<usize>),
    PerSource(Vec<Vec<usize>>),
}

/// Global or per-source entry mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryMask {
    Global(Vec<bool>),
    PerSource(Vec<Vec<bool>>),
}

fn default_buffer_len() -> usize {
    DEFAULT_BUFFER_LEN
}

/// Serializable description of a chunk iterator and its friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IteratorConfig {
    /// Source identifier or list of identifiers.
    pub sources: Value,
    /// Group path or list of group paths.
    pub groups: Value,
    /// Directory relative sources are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_list: Option<EntryList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_mask: Option<EntryMask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_mask: Option<Vec<String>>,
    #[serde(default = "default_buffer_len")]
    pub buffer_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friend: Option<Box<IteratorConfig>>,
}

impl IteratorConfig {
    /// Parse a config from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Validated sources.
    pub fn sources(&self) -> Result<Sources> {
        Sources::try_from(&self.sources)
    }

    /// Validated groups.
    pub fn groups(&self) -> Result<Sources> {
        Sources::try_from(&self.groups)
    }

    /// Entry selection described by `entry_list` / `entry_mask`.
    pub fn selection(&self) -> Result<Selection> {
        match (&self.entry_list, &self.entry_mask) {
            (Some(_), Some(_)) => Err(ChunkError::config(
                "entry_list and entry_mask are mutually exclusive",
            )),
            (Some(EntryList::Global(entries)), None) => Ok(Selection::Entries(entries.clone())),
            (Some(EntryList::PerSource(lists)), None) => Ok(Selection::PerSource(lists.clone())),
            (None, Some(EntryMask::Global(mask))) => Ok(Selection::Mask(mask.clone())),
            (None, Some(EntryMask::PerSource(masks))) => Ok(Selection::PerSourceMask(masks.clone())),
            (None, None) => Ok(Selection::All),
        }
    }
}

impl ChunkIterator {
    /// Build an iterator (and its friends, recursively) from a config.
    pub fn from_config(storage: Arc<dyn Storage>, config: &IteratorConfig) -> Result<Self> {
        let mut builder = ChunkIterator::builder(Arc::clone(&storage))
            .sources(config.sources()?)
            .groups(config.groups()?)
            .selection(config.selection()?)
            .buffer_len(config.buffer_len);
        if let Some(base) = &config.base_path {
            builder = builder.base_path(base.clone());
        }
        if let Some(mask) = &config.field_mask {
            builder = builder.field_mask(mask.clone());
        }
        if let Some(friend) = &config.friend {
            builder = builder.friend(ChunkIterator::from_config(storage, friend)?);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sources_from_json() {
        assert_eq!(
            Sources::try_from(&json!("run0")).unwrap(),
            Sources::One("run0".into())
        );
        assert_eq!(
            Sources::try_from(&json!(["a", "b"])).unwrap(),
            Sources::Many(vec!["a".into(), "b".into()])
        );
        assert!(matches!(
            Sources::try_from(&json!(1)),
            Err(ChunkError::ArgumentType(_))
        ));
        assert!(matches!(
            Sources::try_from(&json!(["a", 2])),
            Err(ChunkError::ArgumentType(_))
        ));
    }

    #[test]
    fn test_pair_sources_broadcast() {
        let pairs = pair_sources(&"f".into(), &vec!["g0", "g1"].into()).unwrap();
        assert_eq!(
            pairs,
            vec![("f".to_string(), "g0".to_string()), ("f".to_string(), "g1".to_string())]
        );

        let pairs = pair_sources(&["f0", "f1", "f2"].into(), &"g".into()).unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(_, g)| g == "g"));

        let pairs = pair_sources(&["f0", "f1"].into(), &["g0", "g1"].into()).unwrap();
        assert_eq!(pairs[1], ("f1".to_string(), "g1".to_string()));
    }

    #[test]
    fn test_pair_sources_shape_errors() {
        assert!(matches!(
            pair_sources(&["f0", "f1"].into(), &["g0", "g1", "g2"].into()),
            Err(ChunkError::ArgumentType(_))
        ));
        assert!(matches!(
            pair_sources(&Sources::Many(vec![]), &"g".into()),
            Err(ChunkError::ArgumentType(_))
        ));
    }

    #[test]
    fn test_expand_path() {
        std::env::set_var("EVTSTREAM_TEST_DATA", "/data/l200");
        assert_eq!(
            expand_path("$EVTSTREAM_TEST_DATA/run0", None),
            "/data/l200/run0"
        );
        assert_eq!(
            expand_path("${EVTSTREAM_TEST_DATA}/run1", None),
            "/data/l200/run1"
        );
        assert_eq!(
            expand_path("$EVTSTREAM_UNSET_VARIABLE/run0", None),
            "$EVTSTREAM_UNSET_VARIABLE/run0"
        );
        assert_eq!(
            expand_path("run2", Some(Path::new("$EVTSTREAM_TEST_DATA"))),
            "/data/l200/run2"
        );
        assert_eq!(expand_path("/abs/run3", Some(Path::new("/data"))), "/abs/run3");
    }

    #[test]
    fn test_parse_config() {
        let config = IteratorConfig::from_json_str(
            r#"{
                "sources": ["run0", "run1"],
                "groups": "geds/hit",
                "entry_list": [[0, 2], [1]],
                "field_mask": ["energy"],
                "friend": {"sources": ["run0", "run1"], "groups": "geds/raw", "buffer_len": 4000}
            }"#,
        )
        .unwrap();

        assert_eq!(config.buffer_len, DEFAULT_BUFFER_LEN);
        assert_eq!(
            config.selection().unwrap(),
            Selection::PerSource(vec![vec![0, 2], vec![1]])
        );
        let friend = config.friend.as_ref().unwrap();
        assert_eq!(friend.buffer_len, 4000);
        assert_eq!(friend.groups().unwrap(), Sources::One("geds/raw".into()));
    }

    #[test]
    fn test_entry_list_and_mask_exclusive() {
        let config = IteratorConfig::from_json_str(
            r#"{"sources": "run0", "groups": "g", "entry_list": [1], "entry_mask": [true]}"#,
        )
        .unwrap();
        assert!(matches!(config.selection(), Err(ChunkError::Config(_))));

        let config =
            IteratorConfig::from_json_str(r#"{"sources": "run0", "groups": "g", "entry_mask": [true, false]}"#)
                .unwrap();
        assert_eq!(config.selection().unwrap(), Selection::Mask(vec![true, false]));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = IteratorConfig::from_json_str(r#"{"sources": "a", "groups": "b", "chunk": 5}"#)
            .unwrap_err();
        assert!(matches!(err, ChunkError::Json(_)));
    }
}
