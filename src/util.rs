use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

/// Message carried by a `catch_unwind` payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn hash_file(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut h = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(format!("{:x}", h.finalize()))
}

/// `<name>.1` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".1");
    path.with_file_name(name)
}

/// Moves `path` to `<name>.1` if it is larger than `max_bytes`, replacing an
/// older backup. Returns whether a rotation happened.
pub fn rotate_log_file(path: &Path, max_bytes: u64) -> Result<bool> {
    let size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return Ok(false),
    };
    if max_bytes == 0 || size <= max_bytes {
        return Ok(false);
    }
    let backup = backup_path(path);
    if backup.exists() {
        std::fs::remove_file(&backup)
            .with_context(|| format!("remove old log backup: {}", backup.display()))?;
    }
    std::fs::rename(path, &backup)
        .with_context(|| format!("rotate log: {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_only_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");
        std::fs::write(&log, "x".repeat(10)).unwrap();
        assert!(!rotate_log_file(&log, 10).unwrap());

        std::fs::write(dir.path().join("run.log.1"), "old").unwrap();
        assert!(rotate_log_file(&log, 5).unwrap());
        assert!(!log.exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("run.log.1")).unwrap(),
            "x".repeat(10)
        );
    }

    #[test]
    fn hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.bin");
        std::fs::write(&p, b"abc").unwrap();
        assert_eq!(
            hash_file(&p).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn panic_payloads_yield_their_message() {
        let owned = std::panic::catch_unwind(|| -> u8 { panic!("{} failed", "slice") }).unwrap_err();
        assert_eq!(panic_message(owned.as_ref()), "slice failed");
        let fixed = std::panic::catch_unwind(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(panic_message(fixed.as_ref()), "boom");
    }
}
