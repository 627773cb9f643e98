//! Backup copies of the output file

use crate::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `src` into `folder`
///
/// `name` defaults to the source file name. With `timestamp` set the name
/// gets a `_YYYYmmddHHMMSS` suffix. Unless `overwrite` is set, an existing
/// copy is kept and `_1`, `_2`, ... is appended instead. Returns `None` when
/// `src` does not exist yet.
pub fn backup_file(
    src: &Path,
    folder: &Path,
    name: Option<&str>,
    timestamp: bool,
    overwrite: bool,
) -> Result<Option<PathBuf>> {
    if !src.is_file() {
        return Ok(None);
    }
    fs::create_dir_all(folder)?;

    let file_name = match name {
        Some(n) => n.to_string(),
        None => src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup".to_string()),
    };
    let (stem, ext) = split_name(&file_name);
    let stem = if timestamp {
        format!("{}_{}", stem, Local::now().format("%Y%m%d%H%M%S"))
    } else {
        stem.to_string()
    };

    let mut dest = folder.join(join_name(&stem, ext));
    let mut n = 1;
    while !overwrite && dest.exists() {
        dest = folder.join(join_name(&format!("{}_{}", stem, n), ext));
        n += 1;
    }

    fs::copy(src, &dest)?;
    log::info!("backed up {} to {}", src.display(), dest.display());
    Ok(Some(dest))
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn join_name(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = backup_file(&dir.path().join("nope.csv"), dir.path(), None, false, false);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_backup_suffixes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("data.csv");
        fs::write(&src, "a,b\n").unwrap();
        let folder = dir.path().join("backup");

        let first = backup_file(&src, &folder, None, false, false).unwrap().unwrap();
        let second = backup_file(&src, &folder, None, false, false).unwrap().unwrap();
        let third = backup_file(&src, &folder, None, false, true).unwrap().unwrap();

        assert_eq!(first, folder.join("data.csv"));
        assert_eq!(second, folder.join("data_1.csv"));
        assert_eq!(third, folder.join("data.csv"));
        assert_eq!(fs::read_to_string(second).unwrap(), "a,b\n");
    }

    #[test]
    fn test_backup_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("log");
        fs::write(&src, "x").unwrap();

        let dest = backup_file(&src, dir.path(), Some("copy.txt"), true, false)
            .unwrap()
            .unwrap();
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("copy_"));
        assert!(name.ends_with(".txt"));
    }
}
