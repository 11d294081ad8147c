//! Expansion of command line paths into candidate image files.

use core_index::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Expand files and directories into a list of candidates.
///
/// Files are taken as given. Directories are walked recursively and only
/// entries with a supported image extension are kept, in file name order.
/// Anything else is skipped with a warning.
pub fn expand(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            walk(path, &mut files);
        } else {
            warn!(path = %path.display(), "Not a file or a directory");
        }
    }

    files
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        });

    for entry in entries {
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::is_supported_extension)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_directories_are_filtered_and_sorted() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("2009");
        fs::create_dir_all(&nested).unwrap();

        for name in ["b.JPG", "a.png", "notes.txt", "c.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::write(nested.join("d.GIF"), b"x").unwrap();

        let files = expand(&[dir.path().to_path_buf()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("2009/d.GIF"),
                PathBuf::from("a.png"),
                PathBuf::from("b.JPG"),
                PathBuf::from("c.jpeg"),
            ]
        );
    }

    #[test]
    fn test_explicit_files_kept_and_missing_skipped() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("scan.tiff");
        fs::write(&explicit, b"x").unwrap();

        let files = expand(&[explicit.clone(), dir.path().join("missing.jpg")]);
        assert_eq!(files, vec![explicit]);
    }
}
