//! File helpers shared by the remediators.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Read a file as text, replacing invalid UTF-8 sequences with U+FFFD.
pub fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically replace `path` with `contents` (temp sibling + rename).
///
/// The original file is untouched unless the rename succeeds. Permissions of
/// an existing target are carried over to the replacement.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = temp_sibling(path);
    debug!(path = %path.display(), tmp = %tmp_path.display(), "atomic write");

    let result = write_then_rename(path, &tmp_path, contents);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.with_context(|| format!("replace {}", path.display()))
}

fn write_then_rename(path: &Path, tmp_path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp_path, meta.permissions())
            .with_context(|| format!("copy permissions to {}", tmp_path.display()))?;
    }
    fs::rename(tmp_path, path).with_context(|| format!("rename over {}", path.display()))?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(format!(".cleaner-{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Give the owner write access to `path` if it is read-only.
///
/// Returns `Ok(false)` when the file was already writable.
pub fn make_writable(path: &Path) -> Result<bool> {
    let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(false);
    }
    grant_owner_write(&mut perms);
    fs::set_permissions(path, perms)
        .with_context(|| format!("make {} writable", path.display()))?;
    Ok(true)
}

#[cfg(unix)]
fn grant_owner_write(perms: &mut fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o200);
}

#[cfg(not(unix))]
fn grant_owner_write(perms: &mut fs::Permissions) {
    perms.set_readonly(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lossy_replaces_invalid_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("userSetup.py");
        fs::write(&path, b"ok\xff\xfe\nimport vaccine\n").expect("write");

        let text = read_lossy(&path).expect("read");
        assert!(text.starts_with("ok\u{FFFD}"));
        assert!(text.contains("import vaccine"));
    }

    #[test]
    fn write_atomic_replaces_contents_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("userSetup.py");
        fs::write(&path, "old").expect("write");

        write_atomic(&path, b"new").expect("atomic write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "new");
        let entries: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("userSetup.py")]);
    }

    #[test]
    fn write_atomic_failure_keeps_original() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Target is a directory, so the final rename must fail.
        let path = temp.path().join("scripts");
        fs::create_dir(&path).expect("mkdir");
        fs::write(path.join("keep.py"), "x").expect("write");

        assert!(write_atomic(&path, b"new").is_err());
        assert!(path.join("keep.py").is_file());
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn make_writable_clears_readonly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("vaccine.py");
        fs::write(&path, "x").expect("write");
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).expect("set readonly");

        assert!(make_writable(&path).expect("writable"));
        assert!(!fs::metadata(&path).expect("meta").permissions().readonly());
        assert!(!make_writable(&path).expect("already writable"));
    }
}
