use crate::error::Result;
use crate::paths;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

fn is_excluded(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    // Never prune the root itself, even if it is named like an excluded dir.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    exclude_dirs.iter().any(|d| d == name.as_ref())
}

/// List every regular file under `root` as a sorted, root-relative
/// `/`-separated path, pruning excluded directory names at any depth.
///
/// Symlinks are not followed. Entries that cannot be read are skipped with a
/// warning rather than aborting the scan.
pub fn list_files(root: &Path, exclude_dirs: &[String]) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("scan root is not a directory: {}", root.display()),
        )
        .into());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(paths::relative_slash(root, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}
