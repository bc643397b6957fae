// ABOUTME: Tar packing and unpacking for moving files between host and container.
// ABOUTME: Archives are rooted at the source's base name; unpacking never leaves its destination.

use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::{ErrorKind, RuntimeFailure};

/// Local failure while preparing or applying an archive.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ArchiveError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("archive entry escapes destination: {0}")]
    Escape(String),

    #[error("destination climbs out of its root: {0}")]
    Destination(String),
}

impl RuntimeFailure for ArchiveError {
    fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Io(_) => ErrorKind::Io,
            ArchiveError::Escape(_) | ArchiveError::Destination(_) => ErrorKind::Conflict,
        }
    }
}

/// Reject container destinations that climb above where they start.
pub(crate) fn check_destination(container_dir: &str, no_overwrite: bool) -> Result<(), ArchiveError> {
    if container_dir.is_empty() {
        return Err(ArchiveError::Destination("empty path".to_string()));
    }
    if no_overwrite
        && Path::new(container_dir)
            .components()
            .any(|c| c == Component::ParentDir)
    {
        return Err(ArchiveError::Destination(container_dir.to_string()));
    }
    Ok(())
}

/// Tar a host file or directory under its base name.
pub(crate) fn pack(source: &Path) -> Result<Vec<u8>, ArchiveError> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        )
    })?;

    let mut builder = tar::Builder::new(Vec::new());
    if source.is_dir() {
        builder.append_dir_all(name, source)?;
    } else {
        builder.append_path_with_name(source, name)?;
    }
    Ok(builder.into_inner()?)
}

/// Unpack an archive into `dest`, returning the regular files written.
pub(crate) fn unpack(archive: &[u8], dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    std::fs::create_dir_all(dest)?;

    let mut written = Vec::new();
    let mut archive = tar::Archive::new(archive);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        let is_file = entry.header().entry_type().is_file();
        if !entry.unpack_in(dest)? {
            return Err(ArchiveError::Escape(rel.display().to_string()));
        }
        if is_file {
            written.push(dest.join(rel));
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_components_are_refused_only_when_guarded() {
        assert!(matches!(
            check_destination("/data/../etc", true),
            Err(ArchiveError::Destination(_))
        ));
        assert!(check_destination("/data/../etc", false).is_ok());
        assert!(check_destination("/data", true).is_ok());
        assert!(check_destination("", false).is_err());
    }

    #[test]
    fn directory_round_trips_under_its_name() {
        let src = tempfile::tempdir().unwrap();
        let site = src.path().join("site");
        std::fs::create_dir_all(site.join("css")).unwrap();
        std::fs::write(site.join("index.html"), b"<h1>hi</h1>").unwrap();
        std::fs::write(site.join("css/main.css"), b"body{}").unwrap();

        let archive = pack(&site).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut written = unpack(&archive, dest.path()).unwrap();
        written.sort();

        assert_eq!(
            written,
            vec![
                dest.path().join("site/css/main.css"),
                dest.path().join("site/index.html"),
            ]
        );
        assert_eq!(
            std::fs::read(dest.path().join("site/index.html")).unwrap(),
            b"<h1>hi</h1>"
        );
    }

    #[test]
    fn escaping_entries_are_conflicts() {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(4);
        header.set_mode(0o644);
        // append_data refuses "..", so write the raw name into the header.
        let name = b"../evil";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_cksum();
        let mut builder = tar::Builder::new(Vec::new());
        builder.append(&header, &b"boom"[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let dest = tempfile::tempdir().unwrap();
        let err = unpack(&archive, dest.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
