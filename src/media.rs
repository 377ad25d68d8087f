use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{NgajiError, Result};

pub const MEDIA_DIR: &str = "media";
pub const MEDIA_SCHEME: &str = "media://";

/// Turns a local recording into a durable URI. A submission is only created
/// once this has succeeded.
pub trait MediaHost {
    fn upload(&self, local: &Path) -> Result<String>;
}

/// Content-addressed store under `<workspace>/media`. Uploading the same
/// recording twice yields the same URI.
#[derive(Debug, Clone)]
pub struct LocalMediaHost {
    root: PathBuf,
}

impl LocalMediaHost {
    pub fn for_workspace(workspace: &Path) -> Self {
        Self {
            root: workspace.join(MEDIA_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a `media://` URI back to the stored file, if it exists.
    pub fn resolve(&self, uri: &str) -> Option<PathBuf> {
        let name = uri.strip_prefix(MEDIA_SCHEME)?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        let p = self.root.join(name);
        p.is_file().then_some(p)
    }
}

impl MediaHost for LocalMediaHost {
    fn upload(&self, local: &Path) -> Result<String> {
        if !local.is_file() {
            return Err(NgajiError::validation(format!(
                "audio file not found: {}",
                local.to_string_lossy()
            )));
        }

        let mut f = File::open(local)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        let mut total: u64 = 0;
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            hasher.update(&buf[..n]);
        }
        if total == 0 {
            return Err(NgajiError::validation("audio file is empty"));
        }
        let digest = hex(&hasher.finalize());

        let name = match audio_extension(local) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        };
        std::fs::create_dir_all(&self.root)?;
        let dst = self.root.join(&name);
        if dst.is_file() {
            debug!(file = %name, "media already stored");
        } else {
            let tmp = self.root.join(format!("{name}.uploading"));
            if let Err(e) = std::fs::copy(local, &tmp).and_then(|_| std::fs::rename(&tmp, &dst)) {
                let _ = std::fs::remove_file(&tmp);
                warn!(error = %e, "media upload failed");
                return Err(e.into());
            }
        }
        Ok(format!("{MEDIA_SCHEME}{name}"))
    }
}

fn audio_extension(p: &Path) -> Option<String> {
    let ext = p.extension()?.to_str()?.to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn upload_is_content_addressed() {
        let ws = temp_dir("ngaji-media");
        let src = ws.join("rec.M4A");
        std::fs::write(&src, b"bismillah").unwrap();

        let host = LocalMediaHost::for_workspace(&ws);
        let a = host.upload(&src).unwrap();
        let b = host.upload(&src).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(MEDIA_SCHEME));
        assert!(a.ends_with(".m4a"));
        assert!(host.resolve(&a).is_some());
        assert!(host.resolve("media://../ngaji.sqlite3").is_none());

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn missing_or_empty_files_are_rejected() {
        let ws = temp_dir("ngaji-media-empty");
        let host = LocalMediaHost::for_workspace(&ws);
        assert!(matches!(
            host.upload(&ws.join("nope.mp3")),
            Err(NgajiError::Validation(_))
        ));
        let empty = ws.join("empty.mp3");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(host.upload(&empty), Err(NgajiError::Validation(_))));
        let _ = std::fs::remove_dir_all(ws);
    }
}
