//! Session configuration.
//!
//! A [`Config`] is handed to [`Session::open`](crate::Session::open) and stays with the
//! session for its lifetime. Nothing here is global; two sessions may use different rind
//! conventions side by side.

use crate::array::DataType;
use crate::Error;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// environment variable consulted when no file type is configured
pub const FILE_TYPE_ENV: &str = "CGNS_FILETYPE";

/// how user supplied index ranges are related to rind planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RindConvention {
    /// index 1 is the first stored plane, rind included (behaviour of old libraries)
    Zero,
    /// index 1 is the first core plane, lower rind planes have indices below 1
    Core,
}

impl Default for RindConvention {
    fn default() -> Self {
        RindConvention::Core
    }
}

/// encoding of a persisted node document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// human readable payloads, no native type conversion in the store
    Ascii,
    /// base64 payloads, the store converts element types itself
    Base64,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Ascii => "ascii",
            FileType::Base64 => "base64",
        }
    }

    /// parse a file type name. `adf` and `hdf5` are accepted as aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ascii" | "adf" => Some(FileType::Ascii),
            "base64" | "hdf5" => Some(FileType::Base64),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// when deleted node slots are squeezed out of a document on close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compaction {
    Never,
    Always,
    /// compact once at least this many nodes were deleted
    AfterDeletes(usize),
}

impl Compaction {
    pub fn should_compact(&self, deleted: usize) -> bool {
        match self {
            Compaction::Never => false,
            Compaction::Always => true,
            Compaction::AfterDeletes(threshold) => deleted >= *threshold,
        }
    }
}

impl Default for Compaction {
    fn default() -> Self {
        Compaction::Never
    }
}

/// callback invoked with every error a session operation returns
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Config {
    file_type: Option<FileType>,
    rind_convention: RindConvention,
    link_path: Vec<PathBuf>,
    error_handler: Option<ErrorHandler>,
    compaction: Compaction,
    index_type: Option<DataType>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("file_type", &self.file_type)
            .field("rind_convention", &self.rind_convention)
            .field("link_path", &self.link_path)
            .field("error_handler", &self.error_handler.is_some())
            .field("compaction", &self.compaction)
            .field("index_type", &self.index_type)
            .finish()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = Some(file_type);
        self
    }

    pub fn with_rind_convention(mut self, convention: RindConvention) -> Self {
        self.rind_convention = convention;
        self
    }

    pub fn with_compaction(mut self, compaction: Compaction) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// integer type used for new point sets and element connectivity
    pub fn with_index_type(mut self, index_type: DataType) -> Result<Self, Error> {
        if !index_type.is_integer() {
            return Err(Error::invalid(format!(
                "index data must be stored as I4 or I8, not {index_type}"
            )));
        }
        self.index_type = Some(index_type);
        Ok(self)
    }

    /// replace the link search path. Entries are separated like the `PATH` variable
    pub fn set_link_path(mut self, path: &str) -> Self {
        self.link_path = std::env::split_paths(path).collect();
        self
    }

    /// append directories to the link search path
    pub fn add_link_path(mut self, path: &str) -> Self {
        self.link_path.extend(std::env::split_paths(path));
        self
    }

    pub fn link_path(&self) -> &[PathBuf] {
        &self.link_path
    }

    pub fn rind_convention(&self) -> RindConvention {
        self.rind_convention
    }

    pub fn compaction(&self) -> Compaction {
        self.compaction
    }

    pub fn index_type(&self) -> DataType {
        self.index_type.unwrap_or(DataType::LongInteger)
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// the configured file type, else the `CGNS_FILETYPE` environment variable, else base64
    pub fn file_type(&self) -> FileType {
        if let Some(file_type) = self.file_type {
            return file_type;
        }

        match std::env::var(FILE_TYPE_ENV) {
            Ok(name) => FileType::parse(&name).unwrap_or_else(|| {
                log::warn!("ignoring unknown {FILE_TYPE_ENV} value `{name}`");
                FileType::Base64
            }),
            Err(_) => FileType::Base64,
        }
    }

    /// locate a linked file: absolute paths and paths relative to `base_dir` are used as is,
    /// otherwise every directory of the link search path is tried in order
    pub fn find_file(&self, name: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return candidate.exists().then(|| candidate.to_path_buf());
        }

        let local = match base_dir {
            Some(dir) => dir.join(candidate),
            None => candidate.to_path_buf(),
        };
        if local.exists() {
            return Some(local);
        }

        self.link_path
            .iter()
            .map(|dir| dir.join(candidate))
            .find(|path| path.exists())
    }
}
