use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::warn;
use walkdir::WalkDir;

/// Absolute paths of the regular files directly inside `dir`, in listing order.
///
/// Subdirectories are not descended into. Symlinks to files count as files.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let root = fs::canonicalize(dir)
        .with_context(|| format!("failed to resolve {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry in {}: {err}", root.display());
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_top_level_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.jpg"), b"c").unwrap();

        let mut names: Vec<String> = list_files(dir.path())
            .unwrap()
            .iter()
            .map(|path| {
                assert!(path.is_absolute());
                path.file_name().unwrap().to_string_lossy().into_owned()
            })
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.jpg", "b.txt"]);
    }

    #[test]
    fn missing_directories_are_errors() {
        let dir = tempdir().unwrap();
        assert!(list_files(&dir.path().join("absent")).is_err());

        let file = dir.path().join("file.jpg");
        fs::write(&file, b"x").unwrap();
        assert!(list_files(&file).is_err());
    }

    #[test]
    fn empty_directories_list_nothing() {
        let dir = tempdir().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }
}
