//! Document sources.
//!
//! A [`DocumentLoader`] turns the `documentURI` of an import into a canonical
//! URI and reads its text. Building and linking stay in the session; a
//! loader only does I/O.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

/// Errors raised while locating or reading a document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document `{uri}` not found")]
    NotFound { uri: String },

    #[error("cannot read `{uri}`: {source}")]
    Io {
        uri: String,
        #[source]
        source: io::Error,
    },

    #[error("unsupported document URI `{uri}`")]
    Unsupported { uri: String },
}

/// Locates and reads documents.
pub trait DocumentLoader {
    /// Resolve `uri` against the canonical URI of the importing document.
    ///
    /// The result identifies the document: two imports that canonicalize to
    /// the same string share one loaded document.
    fn canonicalize(&self, uri: &str, base: Option<&str>) -> Result<String, LoadError>;

    /// Read the text of a canonical URI.
    fn read(&self, canonical: &str) -> Result<String, LoadError>;
}

/// Loads documents from the filesystem.
///
/// Relative URIs are resolved against the importing document's directory,
/// or against `root` for the top-level document. `file://` URIs are
/// accepted; other schemes are not.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Relative URIs are read under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A loader rooted at the current directory.
    pub fn current_dir() -> Result<Self, LoadError> {
        let root = std::env::current_dir().map_err(|source| LoadError::Io {
            uri: ".".to_string(),
            source,
        })?;
        Ok(Self::new(root))
    }
}

fn strip_scheme(uri: &str) -> Result<&str, LoadError> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(path);
    }
    if uri.contains("://") {
        return Err(LoadError::Unsupported {
            uri: uri.to_string(),
        });
    }
    Ok(uri)
}

impl DocumentLoader for FileLoader {
    fn canonicalize(&self, uri: &str, base: Option<&str>) -> Result<String, LoadError> {
        let path = Path::new(strip_scheme(uri)?);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let dir = base
                .and_then(|base| Path::new(base).parent())
                .unwrap_or(self.root.as_path());
            dir.join(path)
        };

        let canonical = fs::canonicalize(&joined).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                uri: uri.to_string(),
            },
            _ => LoadError::Io {
                uri: uri.to_string(),
                source,
            },
        })?;
        canonical
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| LoadError::Unsupported {
                uri: uri.to_string(),
            })
    }

    fn read(&self, canonical: &str) -> Result<String, LoadError> {
        debug!(path = canonical; "Reading document");
        fs::read_to_string(canonical).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                uri: canonical.to_string(),
            },
            _ => LoadError::Io {
                uri: canonical.to_string(),
                source,
            },
        })
    }
}

/// Serves documents from memory, keyed by `/`-separated paths.
///
/// # Examples
///
/// ```
/// use weft::loader::{DocumentLoader, MemoryLoader};
///
/// let loader = MemoryLoader::new()
///     .with_document("app/main.ncl", "<ncl/>")
///     .with_document("lib/rules.ncl", "<ncl/>");
///
/// let canonical = loader
///     .canonicalize("../lib/rules.ncl", Some("app/main.ncl"))
///     .unwrap();
/// assert_eq!(canonical, "lib/rules.ncl");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: IndexMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: &str, source: impl Into<String>) -> Self {
        self.insert(uri, source);
        self
    }

    /// Store `source` under the normalized form of `uri`.
    pub fn insert(&mut self, uri: &str, source: impl Into<String>) {
        self.documents.insert(normalize(uri), source.into());
    }
}

/// Collapse `.` and `..` segments and repeated separators.
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

impl DocumentLoader for MemoryLoader {
    fn canonicalize(&self, uri: &str, base: Option<&str>) -> Result<String, LoadError> {
        let joined = match base.and_then(|base| base.rsplit_once('/')) {
            Some((dir, _)) if !uri.starts_with('/') => format!("{dir}/{uri}"),
            _ => uri.to_string(),
        };
        let canonical = normalize(&joined);
        if self.documents.contains_key(&canonical) {
            Ok(canonical)
        } else {
            Err(LoadError::NotFound {
                uri: uri.to_string(),
            })
        }
    }

    fn read(&self, canonical: &str) -> Result<String, LoadError> {
        self.documents
            .get(canonical)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                uri: canonical.to_string(),
            })
    }
}
