//! File replacement helpers

use crate::error::ErrorKind;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `contents` via write-to-temp-then-rename.
///
/// The temp file lives in the same directory so the rename stays on one
/// filesystem. On any failure the original file is untouched and the temp
/// file is removed when dropped. Permissions of the original are preserved.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ErrorKind> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ErrorKind::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ErrorKind::io(tmp.path(), e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| ErrorKind::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| ErrorKind::io(path, e.error))?;
    Ok(())
}

/// Read a whole file as UTF-8.
pub fn read_source(path: &Path) -> Result<String, ErrorKind> {
    std::fs::read_to_string(path).map_err(|e| ErrorKind::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.h");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, "new contents\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new contents\n");
        // No stray temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.cpp");

        write_atomic(&path, "x").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
    }

    #[test]
    fn test_write_atomic_missing_directory_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("foo.h");

        let result = write_atomic(&path, "x");

        assert!(matches!(result, Err(ErrorKind::Io { .. })));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        write_atomic(&path, "new").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_read_source_missing() {
        let dir = TempDir::new().unwrap();
        let result = read_source(&dir.path().join("missing.cpp"));
        assert!(matches!(result, Err(ErrorKind::Io { .. })));
    }
}
