//! `stagekit_io_place` v1:
//! Rust-side file placement engine for staging image trees.
//!
//! A placement spec names a source (literal path or glob) and a destination
//! under a base directory. Module layout:
//! - `resolve` : glob matching and match-mode selection
//! - `place`   : entry dispatch, directory walk and per-leaf copy
//! - `access`  : post-copy ownership/permission normalization
//! - `spec`    : enums/options/errors
//! - `report`  : run-time report model
//! - `util`    : byte copy and shared path helpers

pub mod access;
pub mod place;
pub mod report;
pub mod resolve;
pub mod spec;
mod util;

pub use access::{FileAccessNormalizer, MetadataApply};
pub use place::{Placer, place_files};
pub use report::{ReportPlace, ReportPlaceBuilder};
pub use resolve::resolve_placement;
pub use spec::{
    EnumEntryKind, EnumMatchMode, EnumPlaceErrorKind, MetadataError, PlaceError,
    SpecFileMetadata, SpecPlaceOptions, SpecPlacement, SpecPlacementItem, SpecResolution,
};
pub use util::{ByteCopy, ByteCopyPreserving};
