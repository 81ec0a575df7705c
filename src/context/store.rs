//! On-disk context files.
//!
//! A context named `dev` lives in a file called `dev.context.json` somewhere
//! under the configured root. Only string values take part in resolution;
//! other JSON values are skipped on read and preserved on write.

use crate::config::EffectiveConfig;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// File name suffix that marks a context file.
pub const CONTEXT_SUFFIX: &str = ".context.json";

/// Key -> value pairs produced by loading one or more contexts.
pub type ContextValues = BTreeMap<String, String>;

/// Extract the context name from a file name, if it is a context file.
pub fn context_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(CONTEXT_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Context name -> file path, as found by scanning directories.
///
/// The first path found for a name wins; later scans never replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMap {
    entries: BTreeMap<String, PathBuf>,
}

impl ContextMap {
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Record a path unless the name is already known. Returns true if added.
    pub fn insert_if_absent(&mut self, name: &str, path: PathBuf) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), path);
        true
    }

    /// Scan `root` recursively for context files.
    ///
    /// Breadth-first: each directory's files are recorded (in name order)
    /// before any of its subdirectories are visited. Hidden entries are skipped.
    pub async fn scan(&mut self, root: &Path) {
        let mut queue = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                    continue;
                }
            };

            let mut files = Vec::new();
            let mut subdirs = Vec::new();
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(dir = %dir.display(), error = %err, "error reading directory");
                        break;
                    }
                };
                let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if file_name.starts_with('.') {
                    continue;
                }
                match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => subdirs.push(entry.path()),
                    Ok(_) => files.push((file_name, entry.path())),
                    Err(_) => {}
                }
            }

            files.sort();
            subdirs.sort();
            for (file_name, path) in files {
                if let Some(name) = context_name(&file_name) {
                    self.insert_if_absent(name, path);
                }
            }
            queue.extend(subdirs);
        }
    }
}

/// Scan a single root directory.
pub async fn discover(root: &Path) -> ContextMap {
    let mut map = ContextMap::default();
    map.scan(root).await;
    map
}

/// Read the string values of one context file.
///
/// Missing, unreadable or malformed files yield an empty map.
pub async fn read_values(path: &Path) -> ContextValues {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read context file");
            return ContextValues::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(fields)) => fields
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect(),
        Ok(_) => {
            warn!(path = %path.display(), "context file is not a JSON object; ignoring");
            ContextValues::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed context file; ignoring");
            ContextValues::new()
        }
    }
}

/// Reads and writes contexts for one root / context directory pair.
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
    context_dir: Option<PathBuf>,
}

impl ContextStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            context_dir: None,
        }
    }

    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    pub fn from_config(config: &EffectiveConfig) -> Self {
        Self {
            root: config.root.clone(),
            context_dir: config.context_dir.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that `load_single` tries first and new files are created in.
    pub fn primary_dir(&self) -> &Path {
        self.context_dir.as_deref().unwrap_or(&self.root)
    }

    /// Discover contexts under the context directory, then the root.
    pub async fn discover(&self) -> ContextMap {
        let mut map = ContextMap::default();
        if let Some(dir) = &self.context_dir {
            map.scan(dir).await;
        }
        map.scan(&self.root).await;
        map
    }

    /// Load contexts in order; later contexts override earlier keys.
    ///
    /// Names with no file are skipped with a warning.
    pub async fn load_merged(&self, names: &[String]) -> ContextValues {
        let mut merged = ContextValues::new();
        if names.is_empty() {
            return merged;
        }

        let map = self.discover().await;
        for name in names {
            match map.get(name) {
                Some(path) => merged.extend(read_values(path).await),
                None => warn!(context = %name, "context not found; skipping"),
            }
        }
        merged
    }

    /// Load a single context, trying the primary directory before the root.
    pub async fn load_single(&self, name: &str) -> Option<ContextValues> {
        let mut map = discover(self.primary_dir()).await;
        if !map.contains(name) && self.context_dir.is_some() {
            map.scan(&self.root).await;
        }
        match map.get(name) {
            Some(path) => Some(read_values(path).await),
            None => None,
        }
    }

    /// Path a context would be written to: its discovered file, or a new
    /// file in the primary directory.
    pub async fn path_for(&self, name: &str) -> PathBuf {
        match self.discover().await.get(name) {
            Some(path) => path.to_path_buf(),
            None => self.primary_dir().join(format!("{}{}", name, CONTEXT_SUFFIX)),
        }
    }

    /// Set one key in a context file, creating the file if needed.
    ///
    /// Other keys, including non-string values, are kept as they were.
    pub async fn write(&self, name: &str, key: &str, value: &str) -> Result<PathBuf> {
        let path = self.path_for(name).await;

        let mut fields = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(fields)) => fields,
                _ => {
                    warn!(path = %path.display(), "replacing unparseable context file contents");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        fields.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut content = serde_json::to_string_pretty(&Value::Object(fields))?;
        content.push('\n');
        fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(context = %name, key = %key, path = %path.display(), "saved value");
        Ok(path)
    }
}
