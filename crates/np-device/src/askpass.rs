//! Password delivery to the OpenSSH client.
//!
//! `ssh` never reads a password from a pipe. With `SSH_ASKPASS_REQUIRE=force`
//! it runs the askpass program instead, which here is a tiny script echoing
//! an environment variable set only on the child process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::process::Command;

use crate::error::{SessionError, SessionResult};

const PASSWORD_VAR: &str = "NETPILOT_SSH_PASS";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$NETPILOT_SSH_PASS\"\n";

/// Write the askpass script if it is missing or stale, returning its path.
pub async fn ensure_script() -> SessionResult<PathBuf> {
    let dir = match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".netpilot"),
        None => std::env::temp_dir().join("netpilot"),
    };
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| SessionError::Io(format!("failed to create {}: {e}", dir.display())))?;

    let path = dir.join("ssh-askpass.sh");
    let up_to_date = fs::read(&path)
        .await
        .is_ok_and(|existing| existing == ASKPASS_SCRIPT.as_bytes());
    if !up_to_date {
        // Write then rename so a concurrent reader never sees a partial script.
        let tmp = dir.join(format!(
            "ssh-askpass.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, ASKPASS_SCRIPT)
            .await
            .map_err(|e| SessionError::Io(format!("failed to write {}: {e}", tmp.display())))?;
        set_executable(&tmp).await?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::Io(format!("failed to install {}: {e}", path.display())))?;
    } else {
        set_executable(&path).await?;
    }

    Ok(path)
}

async fn set_executable(path: &Path) -> SessionResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|e| SessionError::Io(format!("failed to chmod {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Environment that makes `ssh` take `password` from the askpass script.
pub async fn env(password: &str) -> SessionResult<Vec<(String, String)>> {
    let script = ensure_script().await?;
    Ok(vec![
        (PASSWORD_VAR.to_string(), password.to_string()),
        (
            "SSH_ASKPASS".to_string(),
            script.to_string_lossy().to_string(),
        ),
        ("SSH_ASKPASS_REQUIRE".to_string(), "force".to_string()),
        ("DISPLAY".to_string(), "netpilot:0".to_string()),
    ])
}

pub async fn apply(cmd: &mut Command, password: &str) -> SessionResult<()> {
    for (key, value) in env(password).await? {
        cmd.env(key, value);
    }
    Ok(())
}
