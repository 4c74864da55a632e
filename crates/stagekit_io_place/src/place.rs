//! Entry dispatch, directory walk and per-leaf copy orchestration.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::access::{FileAccessNormalizer, MetadataApply};
use crate::report::{ReportPlace, ReportPlaceBuilder};
use crate::resolve::resolve_placement;
use crate::spec::{
    EnumEntryKind, PlaceError, SpecFileMetadata, SpecPlaceOptions, SpecPlacement,
    SpecPlacementItem,
};
use crate::util::{ByteCopy, ByteCopyPreserving, describe_file_type};

/// Resolve `spec_placement` and place every match under `path_dir_base`
/// with the default collaborators.
///
/// See [`Placer::place_files`].
pub fn place_files(
    spec_placement: &SpecPlacement,
    path_dir_base: &Path,
    spec_place_options: SpecPlaceOptions,
) -> Result<ReportPlace, PlaceError> {
    Placer::new(spec_place_options).place_files(spec_placement, path_dir_base)
}

/// Copies resolved placement items using a byte copier and a metadata applier.
#[derive(Debug, Clone, Default)]
pub struct Placer<B = ByteCopyPreserving, M = FileAccessNormalizer> {
    byte_copy: B,
    metadata_apply: M,
    spec_place_options: SpecPlaceOptions,
}

impl Placer {
    pub fn new(spec_place_options: SpecPlaceOptions) -> Self {
        Self {
            byte_copy: ByteCopyPreserving,
            metadata_apply: FileAccessNormalizer,
            spec_place_options,
        }
    }
}

impl<B: ByteCopy, M: MetadataApply> Placer<B, M> {
    pub fn with_collaborators(
        byte_copy: B,
        metadata_apply: M,
        spec_place_options: SpecPlaceOptions,
    ) -> Self {
        Self {
            byte_copy,
            metadata_apply,
            spec_place_options,
        }
    }

    /// Resolve and place one placement directive.
    ///
    /// The first failing item aborts the remaining ones. Files copied before
    /// the failure stay in place.
    pub fn place_files(
        &self,
        spec_placement: &SpecPlacement,
        path_dir_base: &Path,
    ) -> Result<ReportPlace, PlaceError> {
        let spec_resolution =
            resolve_placement(spec_placement, path_dir_base, &self.spec_place_options)?;

        let mut builder_place_report = ReportPlaceBuilder::default();
        builder_place_report.add_matched(spec_resolution.l_items.len() as u64);
        for spec_item in &spec_resolution.l_items {
            self.place(spec_item, &mut builder_place_report)?;
        }

        let report = builder_place_report.build();
        log::info!("{}: {}", spec_placement.source_pattern, report);
        Ok(report)
    }

    /// Place one resolved item, dispatching on the source entry kind.
    pub fn place(
        &self,
        spec_item: &SpecPlacementItem,
        builder_place_report: &mut ReportPlaceBuilder,
    ) -> Result<(), PlaceError> {
        let path_src = &spec_item.path_src;
        let meta_src =
            fs::metadata(path_src).map_err(|e| PlaceError::from_io("stat", path_src, e))?;
        builder_place_report.add_scanned();

        match EnumEntryKind::from_file_type(meta_src.file_type()) {
            EnumEntryKind::RegularOrSymlink => {
                let path_dst = if spec_item.spec_placement.is_dest_directory() {
                    match path_src.file_name() {
                        Some(name) => spec_item.path_dst.join(name),
                        None => spec_item.path_dst.clone(),
                    }
                } else {
                    spec_item.path_dst.clone()
                };
                self.copy_leaf(
                    path_src,
                    &path_dst,
                    &spec_item.spec_placement.metadata,
                    builder_place_report,
                )
            }
            EnumEntryKind::Directory => self.copy_dir(
                path_src,
                &spec_item.path_dst,
                &spec_item.spec_placement.metadata,
                builder_place_report,
            ),
            EnumEntryKind::Unsupported => Err(PlaceError::UnsupportedType {
                path: path_src.clone(),
                kind: describe_file_type(meta_src.file_type()),
            }),
        }
    }

    /// Mirror the tree under `path_dir_src` onto `path_dir_dst`.
    ///
    /// Leaves keep their relative path; no basename is appended. Unsupported
    /// entries are reported as warnings and skipped.
    fn copy_dir(
        &self,
        path_dir_src: &Path,
        path_dir_dst: &Path,
        spec_metadata: &SpecFileMetadata,
        builder_place_report: &mut ReportPlaceBuilder,
    ) -> Result<(), PlaceError> {
        log::debug!(
            "Walking {} into {}",
            path_dir_src.display(),
            path_dir_dst.display()
        );

        for entry_res in WalkDir::new(path_dir_src) {
            let entry = entry_res.map_err(|e| {
                let path_err = e.path().unwrap_or(path_dir_src).to_path_buf();
                let err_io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                PlaceError::from_io("walk", path_err, err_io)
            })?;
            if entry.depth() > 0 {
                builder_place_report.add_scanned();
            }

            let path_rel = entry.path().strip_prefix(path_dir_src).unwrap_or(Path::new(""));
            let path_dst = mirror_path(path_dir_dst, path_rel);

            match EnumEntryKind::from_file_type(entry.file_type()) {
                EnumEntryKind::RegularOrSymlink => {
                    self.copy_leaf(entry.path(), &path_dst, spec_metadata, builder_place_report)?;
                }
                EnumEntryKind::Directory => {
                    if self.spec_place_options.if_dry_run {
                        log::debug!("Dry run: would create {}", path_dst.display());
                        builder_place_report.add_skipped();
                        continue;
                    }
                    fs::create_dir_all(&path_dst)
                        .map_err(|e| PlaceError::from_io("create directory", &path_dst, e))?;
                    builder_place_report.add_dir_created();
                }
                EnumEntryKind::Unsupported => {
                    builder_place_report.add_warning(format!(
                        "File type of {} not supported ({}), skipping",
                        entry.path().display(),
                        describe_file_type(entry.file_type())
                    ));
                    builder_place_report.add_skipped();
                }
            }
        }
        Ok(())
    }

    /// Copy one file or symlink and normalize its metadata.
    fn copy_leaf(
        &self,
        path_src: &Path,
        path_dst: &Path,
        spec_metadata: &SpecFileMetadata,
        builder_place_report: &mut ReportPlaceBuilder,
    ) -> Result<(), PlaceError> {
        if self.spec_place_options.if_dry_run {
            log::debug!(
                "Dry run: would copy {} to {}",
                path_src.display(),
                path_dst.display()
            );
            builder_place_report.add_skipped();
            return Ok(());
        }

        self.copy_leaf_inner(path_src, path_dst, spec_metadata)
            .map_err(|e| e.wrap_copy(path_src, path_dst))?;
        builder_place_report.add_copied();
        Ok(())
    }

    fn copy_leaf_inner(
        &self,
        path_src: &Path,
        path_dst: &Path,
        spec_metadata: &SpecFileMetadata,
    ) -> Result<(), PlaceError> {
        log::debug!("Copying {} to {}", path_src.display(), path_dst.display());

        if let Some(path_parent_dst) = path_dst.parent()
            && !path_parent_dst.as_os_str().is_empty()
            && !path_parent_dst.is_dir()
        {
            fs::create_dir_all(path_parent_dst)
                .map_err(|e| PlaceError::from_io("create directory", path_parent_dst, e))?;
        }

        let meta_src = fs::symlink_metadata(path_src)
            .map_err(|e| PlaceError::from_io("stat", path_src, e))?;
        self.byte_copy
            .copy_bytes(path_src, path_dst)
            .map_err(|e| PlaceError::from_io("copy", path_dst, e))?;

        // the handle would resolve to the link target
        if meta_src.file_type().is_symlink() {
            return Ok(());
        }

        let file_dst =
            File::open(path_dst).map_err(|e| PlaceError::from_io("open", path_dst, e))?;
        self.metadata_apply
            .apply_metadata(&file_dst, spec_metadata)
            .map_err(|e| PlaceError::Metadata {
                path: path_dst.to_path_buf(),
                source: e,
            })
    }
}

fn mirror_path(path_dir_dst: &Path, path_rel: &Path) -> PathBuf {
    if path_rel.as_os_str().is_empty() {
        path_dir_dst.to_path_buf()
    } else {
        path_dir_dst.join(path_rel)
    }
}
