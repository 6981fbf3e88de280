//! Archive extraction
//!
//! Handles `.tar.gz`, `.tgz`, `.tar.xz`, `.tar.bz2` and `.zip`. Every
//! entry path is validated before anything touches the disk: absolute
//! paths and `..` components are rejected so a hostile archive cannot
//! escape the target directory.

use crate::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Extract an archive into `target`, choosing the codec by extension.
pub fn extract(archive: &Path, url: &str, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;
    let path_part = url.split(['?', '#']).next().unwrap_or(url);

    if path_part.ends_with(".zip") {
        return extract_zip(archive, target);
    }
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let decoder: Box<dyn Read> = if path_part.ends_with(".tar.gz") || path_part.ends_with(".tgz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else if path_part.ends_with(".tar.xz") {
        Box::new(xz2::read::XzDecoder::new(file))
    } else if path_part.ends_with(".tar.bz2") {
        Box::new(bzip2::read::BzDecoder::new(file))
    } else {
        return Err(Error::ExtractFailed {
            message: format!("unrecognized archive extension in {url}"),
        });
    };
    extract_tar(decoder, target)
}

fn extract_tar(reader: impl Read, target: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|e| Error::ExtractFailed {
        message: e.to_string(),
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::ExtractFailed {
            message: e.to_string(),
        })?;
        let path = entry
            .path()
            .map_err(|e| Error::ExtractFailed {
                message: e.to_string(),
            })?
            .into_owned();
        let safe = sanitize_entry_path(&path)?;
        let dest = target.join(safe);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        entry.unpack(&dest).map_err(|e| Error::ExtractFailed {
            message: format!("{}: {e}", path.display()),
        })?;
    }
    Ok(())
}

fn extract_zip(archive: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::ExtractFailed {
        message: e.to_string(),
    })?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| Error::ExtractFailed {
            message: e.to_string(),
        })?;
        let raw_name = entry.name().to_string();
        let safe = sanitize_entry_path(Path::new(&raw_name))?;
        let dest = target.join(safe);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out = File::create(&dest).map_err(|e| Error::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| Error::ExtractFailed {
            message: format!("{raw_name}: {e}"),
        })?;
    }
    Ok(())
}

/// Reject absolute paths and any `..` component; strip `.` components.
fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut safe = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => safe.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::ExtractFailed {
                    message: format!("entry escapes target directory: {}", path.display()),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ExtractFailed {
                    message: format!("entry has an absolute path: {}", path.display()),
                });
            }
        }
    }
    if safe.as_os_str().is_empty() {
        return Err(Error::ExtractFailed {
            message: "entry resolves to an empty path".to_string(),
        });
    }
    Ok(safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn tar_gz_round_trips() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.tar.gz");
        write_tar_gz(&archive, &[("bin/kubectl", "#!/bin/sh\n")]);

        let target = dir.path().join("out");
        extract(&archive, "https://x/tool.tar.gz", &target).unwrap();
        let extracted = std::fs::read_to_string(target.join("bin/kubectl")).unwrap();
        assert_eq!(extracted, "#!/bin/sh\n");
    }

    #[test]
    fn parent_dir_entries_are_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.tar.gz");
        write_tar_gz(&archive, &[("../outside.txt", "pwned")]);

        let target = dir.path().join("out");
        let err = extract(&archive, "https://x/evil.tar.gz", &target).unwrap_err();
        assert!(matches!(err, Error::ExtractFailed { .. }));
        assert!(!dir.path().join("outside.txt").exists());
    }

    #[test]
    fn zip_archives_extract() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("tofu", zip::write::SimpleFileOptions::default())
                .unwrap();
            use std::io::Write;
            zip.write_all(b"binary-bytes").unwrap();
            zip.finish().unwrap();
        }

        let target = dir.path().join("out");
        extract(&archive, "https://x/tool.zip", &target).unwrap();
        assert_eq!(std::fs::read(target.join("tofu")).unwrap(), b"binary-bytes");
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("tool.rar");
        std::fs::write(&archive, "x").unwrap();
        let err = extract(&archive, "https://x/tool.rar", dir.path()).unwrap_err();
        assert!(matches!(err, Error::ExtractFailed { .. }));
    }

    #[test]
    fn sanitize_rejects_absolute_and_keeps_relative() {
        assert!(sanitize_entry_path(Path::new("/etc/passwd")).is_err());
        assert!(sanitize_entry_path(Path::new("a/../../b")).is_err());
        assert_eq!(
            sanitize_entry_path(Path::new("./bin/tool")).unwrap(),
            PathBuf::from("bin/tool")
        );
    }
}
