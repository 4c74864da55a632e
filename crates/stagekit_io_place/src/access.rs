//! Post-copy ownership and permission normalization.

use std::fs::File;

use crate::spec::{MetadataError, SpecFileMetadata};

/// Applies metadata directives to an already written, open destination file.
pub trait MetadataApply {
    fn apply_metadata(
        &self,
        file_dst: &File,
        spec_metadata: &SpecFileMetadata,
    ) -> Result<(), MetadataError>;
}

/// Default normalizer: mode first, then group, then owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAccessNormalizer;

#[cfg(unix)]
impl MetadataApply for FileAccessNormalizer {
    fn apply_metadata(
        &self,
        file_dst: &File,
        spec_metadata: &SpecFileMetadata,
    ) -> Result<(), MetadataError> {
        use std::fs::Permissions;
        use std::os::unix::fs::{PermissionsExt, fchown};

        if let Some(n_mode) = spec_metadata.parse_mode()? {
            log::debug!("Setting mode {n_mode:o}");
            file_dst.set_permissions(Permissions::from_mode(n_mode))?;
        }

        if let Some(c_gid) = spec_metadata.gid.as_deref() {
            let n_gid = resolve_gid(c_gid)?;
            log::debug!("Setting group {c_gid} ({n_gid})");
            fchown(file_dst, None, Some(n_gid))?;
        }

        if let Some(c_uid) = spec_metadata.uid.as_deref() {
            let n_uid = resolve_uid(c_uid)?;
            log::debug!("Setting owner {c_uid} ({n_uid})");
            fchown(file_dst, Some(n_uid), None)?;
        }

        Ok(())
    }
}

#[cfg(not(unix))]
impl MetadataApply for FileAccessNormalizer {
    fn apply_metadata(
        &self,
        _file_dst: &File,
        spec_metadata: &SpecFileMetadata,
    ) -> Result<(), MetadataError> {
        if spec_metadata.is_empty() {
            return Ok(());
        }
        Err(MetadataError::Unsupported)
    }
}

/// Resolve a numeric uid or a user name.
#[cfg(unix)]
pub(crate) fn resolve_uid(c_user: &str) -> Result<u32, MetadataError> {
    use nix::unistd::User;

    if let Ok(n_uid) = c_user.trim().parse::<u32>() {
        return Ok(n_uid);
    }
    let user = User::from_name(c_user).map_err(|e| MetadataError::Lookup {
        name: c_user.to_string(),
        message: e.to_string(),
    })?;
    user.map(|u| u.uid.as_raw())
        .ok_or_else(|| MetadataError::UnknownUser(c_user.to_string()))
}

/// Resolve a numeric gid or a group name.
#[cfg(unix)]
pub(crate) fn resolve_gid(c_group: &str) -> Result<u32, MetadataError> {
    use nix::unistd::Group;

    if let Ok(n_gid) = c_group.trim().parse::<u32>() {
        return Ok(n_gid);
    }
    let group = Group::from_name(c_group).map_err(|e| MetadataError::Lookup {
        name: c_group.to_string(),
        message: e.to_string(),
    })?;
    group
        .map(|g| g.gid.as_raw())
        .ok_or_else(|| MetadataError::UnknownGroup(c_group.to_string()))
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs::File;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    use super::{FileAccessNormalizer, MetadataApply, resolve_gid, resolve_uid};
    use crate::spec::{MetadataError, SpecFileMetadata};

    #[test]
    fn apply_sets_mode_on_open_handle() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("a.txt");
        std::fs::write(&path_file, "a").expect("write");

        let spec_metadata = SpecFileMetadata {
            mode: Some("640".to_string()),
            ..SpecFileMetadata::default()
        };
        {
            let file_dst = File::open(&path_file).expect("open");
            FileAccessNormalizer
                .apply_metadata(&file_dst, &spec_metadata)
                .expect("apply");
        }

        let mode = std::fs::metadata(&path_file).expect("meta").permissions().mode();
        assert_eq!(mode & 0o7777, 0o640);
    }

    #[test]
    fn apply_chown_to_current_owner_succeeds() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("a.txt");
        std::fs::write(&path_file, "a").expect("write");
        let stat_file = std::fs::metadata(&path_file).expect("meta");

        let spec_metadata = SpecFileMetadata {
            mode: None,
            uid: Some(stat_file.uid().to_string()),
            gid: Some(stat_file.gid().to_string()),
        };
        let file_dst = File::open(&path_file).expect("open");
        FileAccessNormalizer
            .apply_metadata(&file_dst, &spec_metadata)
            .expect("apply");

        let stat_after = std::fs::metadata(&path_file).expect("meta");
        assert_eq!(stat_after.uid(), stat_file.uid());
        assert_eq!(stat_after.gid(), stat_file.gid());
    }

    #[test]
    fn apply_rejects_invalid_mode_before_touching_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_file = tmp.path().join("a.txt");
        std::fs::write(&path_file, "a").expect("write");
        let mode_before = std::fs::metadata(&path_file).expect("meta").permissions().mode();

        let spec_metadata = SpecFileMetadata {
            mode: Some("u+rw".to_string()),
            ..SpecFileMetadata::default()
        };
        let file_dst = File::open(&path_file).expect("open");
        let err = FileAccessNormalizer
            .apply_metadata(&file_dst, &spec_metadata)
            .expect_err("must fail");
        assert!(matches!(err, MetadataError::InvalidMode { .. }));
        let mode_after = std::fs::metadata(&path_file).expect("meta").permissions().mode();
        assert_eq!(mode_before, mode_after);
    }

    #[test]
    fn resolve_ids_accept_numbers_and_names() {
        assert_eq!(resolve_uid("0").expect("uid"), 0);
        assert_eq!(resolve_gid(" 42 ").expect("gid"), 42);
        assert_eq!(resolve_uid("root").expect("root user"), 0);
    }

    #[test]
    fn resolve_unknown_names_fail() {
        let err = resolve_uid("stagekit-no-such-user").expect_err("must fail");
        assert!(matches!(
            err,
            MetadataError::UnknownUser(_) | MetadataError::Lookup { .. }
        ));
        let err = resolve_gid("stagekit-no-such-group").expect_err("must fail");
        assert!(matches!(
            err,
            MetadataError::UnknownGroup(_) | MetadataError::Lookup { .. }
        ));
    }
}
