//! Source pattern resolution into concrete placement items.

use std::fs;
use std::path::{Path, PathBuf};

use crate::spec::{
    EnumMatchMode, PlaceError, SpecPlaceOptions, SpecPlacement, SpecPlacementItem,
    SpecResolution,
};
use crate::util::{
    compile_source_pattern, join_name, join_under_root, listing_dir, parent_or_empty,
};

/// Resolve `spec_placement` into work items under `path_dir_base`.
///
/// The number of glob hits in the pattern's directory picks the match mode:
/// - `0`: the pattern is taken as a literal path and must exist,
/// - `1`: the match is placed at the destination as given,
/// - `>=2`: the destination becomes a directory and every match lands in it.
///
/// Matches keep the order the directory listing produced them in.
/// Nothing is copied here.
pub fn resolve_placement(
    spec_placement: &SpecPlacement,
    path_dir_base: &Path,
    spec_place_options: &SpecPlaceOptions,
) -> Result<SpecResolution, PlaceError> {
    let path_pattern_rel = Path::new(&spec_placement.source_pattern);
    let path_parent_rel = parent_or_empty(path_pattern_rel);

    let matcher = compile_source_pattern(&spec_placement.source_pattern)?;
    let l_matches = list_matches(
        path_parent_rel,
        spec_place_options.path_dir_src_root.as_deref(),
        |path_candidate| matcher.is_match(path_candidate),
    )?;

    let enum_match_mode = EnumMatchMode::from_match_count(l_matches.len());
    log::debug!(
        "Source {:?} matched {} entries ({enum_match_mode:?})",
        spec_placement.source_pattern,
        l_matches.len()
    );

    let path_dst = if spec_placement.dest_path.is_empty() {
        join_under_root(path_dir_base, path_pattern_rel)
    } else {
        join_under_root(path_dir_base, Path::new(&spec_placement.dest_path))
    };

    let l_items = match enum_match_mode {
        EnumMatchMode::Literal => {
            let path_src =
                resolve_source(path_pattern_rel, spec_place_options.path_dir_src_root.as_deref());
            fs::metadata(&path_src).map_err(|e| PlaceError::from_io("stat", &path_src, e))?;
            vec![SpecPlacementItem {
                path_src,
                path_dst,
                spec_placement: spec_placement.clone(),
            }]
        }
        EnumMatchMode::Single => l_matches
            .into_iter()
            .map(|path_src| SpecPlacementItem {
                path_src,
                path_dst: path_dst.clone(),
                spec_placement: spec_placement.clone(),
            })
            .collect(),
        EnumMatchMode::Directory => {
            let mut spec_placement_dir = spec_placement.clone();
            spec_placement_dir.dest_path.push(std::path::MAIN_SEPARATOR);
            l_matches
                .into_iter()
                .map(|path_src| SpecPlacementItem {
                    path_src,
                    path_dst: path_dst.clone(),
                    spec_placement: spec_placement_dir.clone(),
                })
                .collect()
        }
    };

    Ok(SpecResolution {
        enum_match_mode,
        l_items,
    })
}

/// List `path_parent_rel` and keep the entries whose joined path passes `is_match`.
///
/// `is_match` sees the candidate relative to the source root, the same way the
/// pattern was written; returned paths are rooted.
fn list_matches(
    path_parent_rel: &Path,
    path_dir_src_root: Option<&Path>,
    is_match: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>, PlaceError> {
    let path_dir_list = resolve_source(listing_dir(path_parent_rel), path_dir_src_root);
    let iter_entries = fs::read_dir(&path_dir_list)
        .map_err(|e| PlaceError::from_io("read directory", &path_dir_list, e))?;

    let mut l_matches = Vec::new();
    for entry_res in iter_entries {
        let entry =
            entry_res.map_err(|e| PlaceError::from_io("read directory", &path_dir_list, e))?;
        let path_candidate = join_name(path_parent_rel, &entry.file_name());
        if is_match(&path_candidate) {
            l_matches.push(resolve_source(&path_candidate, path_dir_src_root));
        }
    }
    Ok(l_matches)
}

fn resolve_source(path_src: &Path, path_dir_src_root: Option<&Path>) -> PathBuf {
    match path_dir_src_root {
        Some(path_root) if path_src.is_relative() => path_root.join(path_src),
        _ => path_src.to_path_buf(),
    }
}
