use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use log::{debug, info, warn};
use crate::error::{ConvertError, ConvertResult};

/// Create `dir` (and parents) if it does not exist yet.
///
/// Returns `true` when the directory was created by this call.
pub fn ensure_dir_exists(dir: &Path) -> ConvertResult<bool> {
    if dir.is_dir() {
        return Ok(false);
    }

    std::fs::create_dir_all(dir).map_err(|e| ConvertError::filesystem(dir, e))?;
    info!("Created directory: {}", dir.display());
    Ok(true)
}

/// List the regular files directly inside `dir`, sorted by path.
///
/// Subdirectories and anything below them are ignored. The directory is
/// created first when missing, in which case the result is empty.
pub fn discover_inputs(dir: &Path) -> ConvertResult<Vec<PathBuf>> {
    ensure_dir_exists(dir)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false);
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                // A failure on the root itself means the folder is unusable
                if e.depth() == 0 {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
                    return Err(ConvertError::filesystem(dir, source));
                }
                warn!("Error reading directory entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            debug!("Skipping non-file entry: {}", path.display());
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    debug!("Discovered {} input file(s) in {}", files.len(), dir.display());
    Ok(files)
}
