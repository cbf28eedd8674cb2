//! SHA-256 checksum manifests in `sha256sum` format, and the file walking
//! used to build them.

use std::fs;
use std::fs::File;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use sha2::Digest;
use sha2::Sha256;

/// Computes the hex-encoded SHA-256 digest of a file.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

/// Recursively lists the files under `root` for which `keep` returns true,
/// sorted by path. Directories for which `prune` returns true are not
/// descended into.
pub fn walk_files(
    root: &Path,
    prune: impl Fn(&Path) -> bool,
    keep: impl Fn(&Path) -> bool,
) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                if !prune(&path) {
                    pending.push(path);
                }
            } else if keep(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Whether or not the file name of a path ends with `suffix`.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

/// Recursively lists the files under `root` whose names end with `suffix`,
/// sorted by path.
pub fn find_files(root: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    walk_files(root, |_| false, |path| has_suffix(path, suffix))
}

/// Writes a manifest of `files` to `manifest`, with each path written
/// relative to `base`.
pub fn write_manifest(manifest: &Path, base: &Path, files: &[PathBuf]) -> io::Result<()> {
    let mut out = File::create(manifest)?;

    for file in files {
        let digest = sha256_file(file)?;
        let name = file.strip_prefix(base).unwrap_or(file);
        writeln!(out, "{digest}  {}", name.display())?;
    }

    out.sync_all()
}
