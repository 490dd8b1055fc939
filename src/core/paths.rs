//! Shared filesystem utilities: forgiving removal, atomic rewrites, backup
//! path resolution.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use rand::Rng;

use crate::core::config::BackupConfig;
use crate::core::errors::{Result, SentinelError};

/// Remove a file, swallowing not-found.
///
/// Other IO failures (e.g. permissions) propagate.
pub fn safe_remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SentinelError::io(path, e)),
    }
}

/// Remove a directory tree, swallowing not-found.
pub fn safe_remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SentinelError::io(path, e)),
    }
}

/// Remove a path of either kind, swallowing not-found.
pub fn safe_remove_any(path: &Path) -> Result<()> {
    if path.is_dir() {
        safe_remove_tree(path)
    } else {
        safe_remove_file(path)
    }
}

/// Random 6-char uppercase/digit suffix for sibling temp files.
fn temp_suffix() -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..6)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}

/// Write `content` to `path` atomically: a sibling `._XXXXXX` temp file is
/// written first, then renamed into place. A crash mid-write never leaves a
/// partially written target.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!("._{}", temp_suffix()));
    let write = |tmp: &Path| -> std::io::Result<()> {
        let mut f = fs::File::create(tmp)?;
        f.write_all(content)?;
        f.sync_data()?;
        Ok(())
    };
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(SentinelError::io(path, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        SentinelError::io(path, e)
    })
}

/// Resolve the backup destination for `path`.
///
/// Returns `None` when backups are disabled. With an explicit root, the
/// original directory structure is mirrored underneath it; otherwise the
/// backup lands in a sibling folder (default `_virus`) next to the original.
/// The destination directory is created on demand.
pub fn backup_path_for(path: &Path, backup: &BackupConfig) -> Result<Option<PathBuf>> {
    if backup.ignore {
        return Ok(None);
    }
    let file_name = path.file_name().ok_or_else(|| SentinelError::ScanInput {
        details: format!("backup target has no file name: {}", path.display()),
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let backup_dir = backup.root.as_ref().map_or_else(
        || dir.join(&backup.folder_name),
        |root| root.join(strip_prefix_components(dir)),
    );
    fs::create_dir_all(&backup_dir).map_err(|e| SentinelError::io(&backup_dir, e))?;
    Ok(Some(backup_dir.join(file_name)))
}

/// Drop root/prefix components so a path can be re-rooted elsewhere.
fn strip_prefix_components(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_remove_missing_file_is_ok() {
        assert!(safe_remove_file(Path::new("/nonexistent/ssn-gone")).is_ok());
        assert!(safe_remove_tree(Path::new("/nonexistent/ssn-gone-dir")).is_ok());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        fs::write(&target, "old").unwrap();

        atomic_write(&target, b"new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");

        // No temp litter left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("._"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn backup_defaults_to_sibling_folder() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("shot.scene");
        let cfg = BackupConfig::default();

        let dest = backup_path_for(&scene, &cfg).unwrap().unwrap();
        assert_eq!(dest, dir.path().join("_virus").join("shot.scene"));
        assert!(dest.parent().unwrap().is_dir());
    }

    #[test]
    fn backup_mirrors_structure_under_explicit_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("backups");
        let scene = dir.path().join("proj").join("shots").join("shot.scene");
        fs::create_dir_all(scene.parent().unwrap()).unwrap();

        let cfg = BackupConfig {
            root: Some(root.clone()),
            ..BackupConfig::default()
        };
        let dest = backup_path_for(&scene, &cfg).unwrap().unwrap();
        assert!(dest.starts_with(&root));
        assert!(dest.ends_with(Path::new("proj").join("shots").join("shot.scene")));
    }

    #[test]
    fn backup_disabled_yields_none() {
        let cfg = BackupConfig {
            ignore: true,
            ..BackupConfig::default()
        };
        assert!(
            backup_path_for(Path::new("/tmp/a.scene"), &cfg)
                .unwrap()
                .is_none()
        );
    }
}
