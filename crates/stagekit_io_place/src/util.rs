use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::spec::PlaceError;

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

/// Compile a source pattern with shell semantics: wildcards stop at separators
/// and braces are plain characters.
pub(crate) fn compile_source_pattern(pattern: &str) -> Result<GlobMatcher, PlaceError> {
    GlobBuilder::new(&escape_alternation(pattern))
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| PlaceError::Pattern {
            pattern: pattern.to_string(),
            source: e,
        })
}

/// Escape `{` and `}` outside character classes so globset never expands them.
fn escape_alternation(pattern: &str) -> String {
    let mut c_out = String::with_capacity(pattern.len());
    let mut b_in_class = false;
    let mut iter_chars = pattern.chars();
    while let Some(ch) = iter_chars.next() {
        match ch {
            '\\' => {
                c_out.push(ch);
                if let Some(ch_next) = iter_chars.next() {
                    c_out.push(ch_next);
                }
            }
            '[' if !b_in_class => {
                b_in_class = true;
                c_out.push(ch);
            }
            ']' if b_in_class => {
                b_in_class = false;
                c_out.push(ch);
            }
            '{' | '}' if !b_in_class => {
                c_out.push('\\');
                c_out.push(ch);
            }
            _ => c_out.push(ch),
        }
    }
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Parent directory of a pattern or path; empty for bare names.
pub(crate) fn parent_or_empty(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}

/// Directory to list for `path_parent`; `.` stands in for the empty path.
pub(crate) fn listing_dir(path_parent: &Path) -> &Path {
    if path_parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path_parent
    }
}

/// Join a name onto a parent without introducing a `./` prefix.
pub(crate) fn join_name(path_parent: &Path, name: &std::ffi::OsStr) -> PathBuf {
    if path_parent.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        path_parent.join(name)
    }
}

/// Join `path_rel` lexically under `path_dir_base`.
///
/// Root and prefix components of `path_rel` are dropped and `..` never climbs
/// above `path_dir_base`, so `/etc/motd` joined on `/rootfs` is `/rootfs/etc/motd`.
pub(crate) fn join_under_root(path_dir_base: &Path, path_rel: &Path) -> PathBuf {
    let mut path_out = path_dir_base.to_path_buf();
    let mut n_depth = 0_usize;
    for part in path_rel.components() {
        match part {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if n_depth > 0 {
                    path_out.pop();
                    n_depth -= 1;
                }
            }
            Component::Normal(name) => {
                path_out.push(name);
                n_depth += 1;
            }
        }
    }
    path_out
}

/// Human-readable name for a file type that is not file/symlink/dir.
pub(crate) fn describe_file_type(file_type: fs::FileType) -> &'static str {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_socket() {
            return "socket";
        }
        if file_type.is_fifo() {
            return "fifo";
        }
        if file_type.is_block_device() {
            return "block device";
        }
        if file_type.is_char_device() {
            return "character device";
        }
    }
    if file_type.is_dir() {
        return "directory";
    }
    if file_type.is_symlink() {
        return "symlink";
    }
    if file_type.is_file() {
        return "regular file";
    }
    "unknown"
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ByteCopy

/// Byte-level copy of one leaf entry.
///
/// Implementations must copy symlinks as links (never dereference) and must
/// have finished writing `path_dst` when they return.
pub trait ByteCopy {
    fn copy_bytes(&self, path_src: &Path, path_dst: &Path) -> io::Result<()>;
}

/// Default copier: content, permissions, timestamps and xattrs; symlinks verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCopyPreserving;

impl ByteCopy for ByteCopyPreserving {
    fn copy_bytes(&self, path_src: &Path, path_dst: &Path) -> io::Result<()> {
        let meta_src = fs::symlink_metadata(path_src)?;
        remove_existing_leaf(path_dst)?;
        if meta_src.file_type().is_symlink() {
            return create_symbolic_link(path_src, path_dst);
        }
        copy_file_with_metadata(path_src, path_dst)
    }
}

/// Remove a file or link sitting at `path_dst`. Directories are left alone.
fn remove_existing_leaf(path_dst: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path_dst) {
        Ok(meta_dst) if meta_dst.file_type().is_dir() => Ok(()),
        Ok(_) => fs::remove_file(path_dst),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn create_symbolic_link(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    let target = fs::read_link(path_src)?;
    std::os::unix::fs::symlink(target, path_dst)
}

#[cfg(windows)]
fn create_symbolic_link(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let target = fs::read_link(path_src)?;
    if path_src.is_dir() {
        symlink_dir(target, path_dst)
    } else {
        symlink_file(target, path_dst)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symbolic_link(_path_src: &Path, _path_dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Symbolic links are unsupported on this platform",
    ))
}

fn copy_file_with_metadata(path_file_src: &Path, path_file_dst: &Path) -> io::Result<()> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        preserve_times_linux(path_file_src, path_file_dst)?;
        copy_xattrs_linux(path_file_src, path_file_dst);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn preserve_times_linux(path_file_src: &Path, path_file_dst: &Path) -> io::Result<()> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let Ok(iter_xattr_names) = xattr::list(path_file_src) else {
        return;
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            log::debug!(
                "Skipping xattr {:?} on {} ({e})",
                name,
                path_file_dst.display()
            );
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{ByteCopy, ByteCopyPreserving, compile_source_pattern, join_under_root};
    use crate::spec::EnumPlaceErrorKind;

    #[test]
    fn join_under_root_confines_absolute_and_parent_parts() {
        let base = Path::new("/rootfs");
        assert_eq!(
            join_under_root(base, Path::new("/etc/motd")),
            PathBuf::from("/rootfs/etc/motd")
        );
        assert_eq!(
            join_under_root(base, Path::new("etc/../../../x")),
            PathBuf::from("/rootfs/x")
        );
        assert_eq!(
            join_under_root(base, Path::new("./a/./b/")),
            PathBuf::from("/rootfs/a/b")
        );
    }

    #[test]
    fn source_pattern_wildcard_stops_at_separator() {
        let matcher = compile_source_pattern("/srv/*.txt").expect("compile");
        assert!(matcher.is_match("/srv/a.txt"));
        assert!(!matcher.is_match("/srv/sub/a.txt"));
    }

    #[test]
    fn source_pattern_braces_are_literal() {
        let matcher = compile_source_pattern("/srv/{a,b}.txt").expect("compile");
        assert!(matcher.is_match("/srv/{a,b}.txt"));
        assert!(!matcher.is_match("/srv/a.txt"));
        assert!(!matcher.is_match("/srv/b.txt"));

        let matcher = compile_source_pattern("/srv/\\{x}*").expect("compile escaped");
        assert!(matcher.is_match("/srv/{x}.log"));
    }

    #[test]
    fn source_pattern_invalid_rejected() {
        let err = compile_source_pattern("/srv/[").expect_err("must fail");
        assert_eq!(err.kind(), EnumPlaceErrorKind::Pattern);
    }

    #[test]
    fn byte_copy_replaces_read_only_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.txt");
        let path_dst = tmp.path().join("dst.txt");
        std::fs::write(&path_src, "new").expect("write src");
        std::fs::write(&path_dst, "old").expect("write dst");
        let mut permissions = std::fs::metadata(&path_dst).expect("meta").permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&path_dst, permissions).expect("set readonly");

        ByteCopyPreserving
            .copy_bytes(&path_src, &path_dst)
            .expect("copy bytes");
        assert_eq!(std::fs::read_to_string(&path_dst).expect("read"), "new");
    }

    #[cfg(unix)]
    #[test]
    fn byte_copy_keeps_symlink_as_link() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().expect("tempdir");
        let path_link_src = tmp.path().join("link_src");
        let path_link_dst = tmp.path().join("link_dst");
        symlink("does/not/exist", &path_link_src).expect("create symlink");

        ByteCopyPreserving
            .copy_bytes(&path_link_src, &path_link_dst)
            .expect("copy link");
        assert!(path_link_dst.is_symlink());
        assert_eq!(
            std::fs::read_link(&path_link_dst).expect("read link"),
            PathBuf::from("does/not/exist")
        );

        // second run over the existing link
        ByteCopyPreserving
            .copy_bytes(&path_link_src, &path_link_dst)
            .expect("copy link again");
        assert!(path_link_dst.is_symlink());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn byte_copy_preserves_modification_time() {
        use filetime::{FileTime, set_file_times};

        let tmp = tempfile::tempdir().expect("tempdir");
        let path_src = tmp.path().join("src.txt");
        let path_dst = tmp.path().join("dst.txt");
        std::fs::write(&path_src, "meta").expect("write src");
        set_file_times(
            &path_src,
            FileTime::from_unix_time(1_700_000_010, 0),
            FileTime::from_unix_time(1_700_000_020, 0),
        )
        .expect("set times");

        ByteCopyPreserving
            .copy_bytes(&path_src, &path_dst)
            .expect("copy bytes");
        let stat_dst = std::fs::metadata(&path_dst).expect("dst metadata");
        assert_eq!(
            FileTime::from_last_modification_time(&stat_dst),
            FileTime::from_unix_time(1_700_000_020, 0)
        );
    }
}
