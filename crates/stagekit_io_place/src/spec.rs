//! Placement specification models and top-level error types.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Filesystem entry classification used for copy dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumEntryKind {
    /// Regular file or symbolic link: copied as one leaf.
    RegularOrSymlink,
    /// Directory: walked and mirrored.
    Directory,
    /// Socket, fifo, device node or anything else.
    Unsupported,
}

impl EnumEntryKind {
    /// Classify one file type. Call once per entry, never inherit from a parent.
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_file() || file_type.is_symlink() {
            Self::RegularOrSymlink
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Unsupported
        }
    }
}

/// Copy strategy chosen from the number of glob matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMatchMode {
    /// No glob hit: the source pattern is used as a literal path.
    Literal,
    /// Exactly one hit: copied to the destination as given.
    Single,
    /// Two or more hits: every match is copied into the destination directory.
    Directory,
}

impl EnumMatchMode {
    pub fn from_match_count(n_matches: usize) -> Self {
        match n_matches {
            0 => Self::Literal,
            1 => Self::Single,
            _ => Self::Directory,
        }
    }
}

/// Error taxonomy, independent of the context wrapping applied on the way up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPlaceErrorKind {
    NotFound,
    Pattern,
    Io,
    UnsupportedType,
    Metadata,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsInit

/// Ownership and permission directives applied after a file is copied.
///
/// `uid`/`gid` accept either a numeric id or a user/group name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecFileMetadata {
    /// Octal permission bits, e.g. `"0644"`.
    pub mode: Option<String>,
    /// Owner user.
    pub uid: Option<String>,
    /// Owner group.
    pub gid: Option<String>,
}

impl SpecFileMetadata {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.uid.is_none() && self.gid.is_none()
    }

    /// Parse `mode` as octal permission bits.
    pub fn parse_mode(&self) -> Result<Option<u32>, MetadataError> {
        let Some(c_mode) = self.mode.as_deref() else {
            return Ok(None);
        };
        let n_mode =
            u32::from_str_radix(c_mode.trim(), 8).map_err(|_| MetadataError::InvalidMode {
                value: c_mode.to_string(),
            })?;
        if n_mode > 0o7777 {
            return Err(MetadataError::InvalidMode {
                value: c_mode.to_string(),
            });
        }
        Ok(Some(n_mode))
    }
}

/// One file placement directive.
///
/// `dest_path` semantics:
/// - empty: same relative path as `source_pattern`, under the base directory,
/// - trailing separator: destination is a directory, files keep their basename,
/// - otherwise: the literal destination path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpecPlacement {
    /// Literal path or glob pattern (`*`, `?`, character classes).
    #[serde(rename = "source")]
    pub source_pattern: String,
    /// Destination relative to the base directory.
    #[serde(rename = "path", default)]
    pub dest_path: String,
    /// Post-copy ownership and permission directives.
    #[serde(flatten)]
    pub metadata: SpecFileMetadata,
}

impl SpecPlacement {
    pub fn new(source_pattern: impl Into<String>, dest_path: impl Into<String>) -> Self {
        Self {
            source_pattern: source_pattern.into(),
            dest_path: dest_path.into(),
            metadata: SpecFileMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: SpecFileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether `dest_path` ends in a path separator.
    pub fn is_dest_directory(&self) -> bool {
        self.dest_path.chars().last().is_some_and(std::path::is_separator)
    }
}

/// Input options for resolution and placement.
#[derive(Debug, Clone, Default)]
pub struct SpecPlaceOptions {
    /// Root that relative source patterns are resolved against.
    /// `None` resolves them against the current working directory.
    pub path_dir_src_root: Option<PathBuf>,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

/// One concrete unit of work produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecPlacementItem {
    /// Concrete source entry.
    pub path_src: PathBuf,
    /// Resolved destination (file path, or directory when the spec says so).
    pub path_dst: PathBuf,
    /// Effective spec; `dest_path` carries a trailing separator in directory mode.
    pub spec_placement: SpecPlacement,
}

/// Resolver output: chosen mode plus work items in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecResolution {
    pub enum_match_mode: EnumMatchMode,
    pub l_items: Vec<SpecPlacementItem>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure applying ownership/permission directives.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Invalid permission mode '{value}': must be octal and <= 7777")]
    InvalidMode { value: String },
    #[error("User '{0}' not found")]
    UnknownUser(String),
    #[error("Group '{0}' not found")]
    UnknownGroup(String),
    #[error("Failed to look up '{name}': {message}")]
    Lookup { name: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Ownership and permission directives are unsupported on this platform")]
    Unsupported,
}

/// Errors raised while resolving or placing files.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// Missing source file, directory or listing target.
    #[error("Not found: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Malformed glob pattern.
    #[error("Failed to match pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    /// Listing, stat, read or write failure.
    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Top-level source that is neither file, symlink nor directory.
    #[error("File type of {} not supported ({kind})", path.display())]
    UnsupportedType { path: PathBuf, kind: &'static str },
    /// Metadata normalization failed on an already copied file.
    #[error("Failed to update file access of {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },
    /// Context wrapper naming the leaf copy that failed.
    #[error("Failed to copy file {} to {}: {source}", src.display(), dst.display())]
    Copy {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: Box<PlaceError>,
    },
}

impl PlaceError {
    /// Build an I/O error, surfacing `NotFound` as its own variant.
    pub(crate) fn from_io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound { path, source };
        }
        Self::Io {
            action,
            path,
            source,
        }
    }

    pub(crate) fn wrap_copy(self, src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self::Copy {
            src: src.into(),
            dst: dst.into(),
            source: Box::new(self),
        }
    }

    /// Underlying error kind, looking through `Copy` context.
    pub fn kind(&self) -> EnumPlaceErrorKind {
        match self {
            Self::NotFound { .. } => EnumPlaceErrorKind::NotFound,
            Self::Pattern { .. } => EnumPlaceErrorKind::Pattern,
            Self::Io { .. } => EnumPlaceErrorKind::Io,
            Self::UnsupportedType { .. } => EnumPlaceErrorKind::UnsupportedType,
            Self::Metadata { .. } => EnumPlaceErrorKind::Metadata,
            Self::Copy { source, .. } => source.kind(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
