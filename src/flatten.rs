//! Flattening of hierarchical secret namespaces.
//!
//! Tree-structured stores organize secrets under slash-delimited paths, and
//! each leaf secret bundles a flat record of fields. [`TreeWalker`]
//! enumerates such a namespace and flattens it into colon-delimited
//! configuration keys: a leaf at `app/db` with field `password` becomes
//! `app:db:password`.
//!
//! A failure while listing or reading one subtree never aborts the walk.
//! The failed subtree contributes no entries and the failure is reported as
//! a [`WalkDiagnostic`] alongside the flattened mapping, so callers decide
//! whether to log, alert, or abort.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};

use crate::error::{ResolveError, Result};
use crate::types::SecretString;

/// Delimiter used by tree stores between path segments.
pub const STORE_DELIMITER: char = '/';

/// Delimiter used in the flattened configuration namespace.
pub const FLAT_DELIMITER: char = ':';

/// Read access to one hierarchical secret store.
///
/// Entry names returned by `list` follow the store convention: a name
/// ending with `/` is a folder, anything else is a leaf secret.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// List entry names at a path. The root is the empty path.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Read the field map of one leaf secret.
    async fn read(&self, path: &str) -> Result<HashMap<String, String>>;
}

/// Where in the walk a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStage {
    /// Listing entries at a path failed.
    List,
    /// Reading a leaf secret failed.
    Read,
    /// A leaf payload could not be parsed into fields.
    Parse,
    /// The depth bound was reached; the subtree was not entered.
    Depth,
}

impl fmt::Display for WalkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalkStage::List => "list",
            WalkStage::Read => "read",
            WalkStage::Parse => "parse",
            WalkStage::Depth => "depth",
        };
        write!(f, "{}", s)
    }
}

/// One partial failure encountered during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkDiagnostic {
    /// Store path at which the failure occurred.
    pub path: String,
    pub stage: WalkStage,
    pub message: String,
}

impl WalkDiagnostic {
    fn new(path: impl Into<String>, stage: WalkStage, message: impl Into<String>) -> Self {
        Self { path: path.into(), stage, message: message.into() }
    }
}

impl fmt::Display for WalkDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at '{}': {}", self.stage, self.path, self.message)
    }
}

/// A flattened snapshot of one tree backend.
///
/// Every key maps to a leaf field; folder markers never appear. The
/// snapshot is rebuilt whole on each walk, never patched.
#[derive(Debug, Clone, Default)]
pub struct FlattenedTree {
    entries: HashMap<String, SecretString>,
    diagnostics: Vec<WalkDiagnostic>,
}

impl FlattenedTree {
    /// Look up one flattened key.
    pub fn get(&self, key: &str) -> Option<&SecretString> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &HashMap<String, SecretString> {
        &self.entries
    }

    pub fn into_entries(self) -> HashMap<String, SecretString> {
        self.entries
    }

    /// Partial failures encountered while building this snapshot.
    pub fn diagnostics(&self) -> &[WalkDiagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type WalkOutput = (HashMap<String, SecretString>, Vec<WalkDiagnostic>);

/// Recursive walker over a [`TreeSource`].
///
/// Sibling subtrees and sibling leaf reads within one tree are walked
/// concurrently; recursion is bounded by `max_depth`.
#[derive(Debug, Clone, Copy)]
pub struct TreeWalker {
    max_depth: usize,
}

impl TreeWalker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Flatten the whole namespace reachable from the root.
    ///
    /// Never fails: every list/read/parse failure becomes a diagnostic and
    /// its subtree contributes no entries.
    pub async fn flatten(&self, source: &dyn TreeSource) -> FlattenedTree {
        let (entries, diagnostics) = self.walk(source, String::new(), 0).await;
        FlattenedTree { entries, diagnostics }
    }

    fn walk<'a>(
        &'a self,
        source: &'a dyn TreeSource,
        path: String,
        depth: usize,
    ) -> BoxFuture<'a, WalkOutput> {
        async move {
            let mut entries = HashMap::new();
            let mut diagnostics = Vec::new();

            if depth > self.max_depth {
                diagnostics.push(WalkDiagnostic::new(
                    &path,
                    WalkStage::Depth,
                    format!("recursion depth {} exceeds bound {}", depth, self.max_depth),
                ));
                return (entries, diagnostics);
            }

            let names = match source.list(&path).await {
                Ok(names) => names,
                Err(err) => {
                    diagnostics.push(WalkDiagnostic::new(&path, WalkStage::List, err.to_string()));
                    return (entries, diagnostics);
                }
            };

            let mut branches: Vec<BoxFuture<'a, WalkOutput>> = Vec::with_capacity(names.len());
            for name in names {
                if name.is_empty() {
                    continue;
                }
                let child = format!("{}{}", path, name);
                if name.ends_with(STORE_DELIMITER) {
                    branches.push(self.walk(source, child, depth + 1));
                } else {
                    branches.push(self.read_leaf(source, child).boxed());
                }
            }

            for (sub_entries, sub_diagnostics) in join_all(branches).await {
                entries.extend(sub_entries);
                diagnostics.extend(sub_diagnostics);
            }

            (entries, diagnostics)
        }
        .boxed()
    }

    async fn read_leaf(&self, source: &dyn TreeSource, path: String) -> WalkOutput {
        match source.read(&path).await {
            Ok(fields) => {
                let flat = path.replace(STORE_DELIMITER, ":");
                let entries = fields
                    .into_iter()
                    .map(|(field, value)| {
                        (format!("{}{}{}", flat, FLAT_DELIMITER, field), SecretString::new(value))
                    })
                    .collect();
                (entries, Vec::new())
            }
            Err(err) => {
                let stage = match &err {
                    ResolveError::MalformedSecret { .. } => WalkStage::Parse,
                    _ => WalkStage::Read,
                };
                (HashMap::new(), vec![WalkDiagnostic::new(&path, stage, err.to_string())])
            }
        }
    }
}
