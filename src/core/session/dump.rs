//! Optional raw PCM dumps for debugging audio paths.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::realtime::Role;

/// Appends raw audio to `{dir}/{role}_{channel}.pcm`.
#[derive(Debug, Clone)]
pub struct AudioDump {
    dir: PathBuf,
}

impl AudioDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, role: Role, channel: Option<&str>) -> PathBuf {
        self.dir
            .join(format!("{}_{}.pcm", role, channel.unwrap_or("default")))
    }

    /// Append `buf`. Failures are logged and otherwise ignored.
    pub async fn write(&self, role: Role, channel: Option<&str>, buf: &[u8]) {
        let path = self.path_for(role, channel);
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(buf).await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to dump audio to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dump_appends() {
        let dir = TempDir::new().unwrap();
        let dump = AudioDump::new(dir.path());

        dump.write(Role::User, Some("room1"), &[1, 2]).await;
        dump.write(Role::User, Some("room1"), &[3]).await;
        dump.write(Role::Assistant, None, &[9]).await;

        let user = tokio::fs::read(dir.path().join("user_room1.pcm")).await.unwrap();
        assert_eq!(user, vec![1, 2, 3]);
        let assistant = tokio::fs::read(dir.path().join("assistant_default.pcm"))
            .await
            .unwrap();
        assert_eq!(assistant, vec![9]);
    }

    #[tokio::test]
    async fn test_dump_to_missing_dir_is_ignored() {
        let dump = AudioDump::new("/nonexistent/dump/dir");
        dump.write(Role::User, None, &[1]).await;
    }
}
