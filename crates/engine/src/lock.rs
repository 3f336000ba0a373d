// Cross-process lock files under `<vault>/.vectorlink/`.
//
// A lock is a file created with `create_new` holding the owner's pid and
// start time. A lock whose owner is gone, or that is older than
// `STALE_AFTER_SECONDS`, is removed and taken over. A file that does not
// parse is treated as abandoned once it is older than the write grace.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// How often a queued caller retries a held lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

const STALE_AFTER_SECONDS: i64 = 6 * 60 * 60;
/// A holder may have created the file but not written it yet.
const UNWRITTEN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
#[error("lock file {}: {source}", .path.display())]
pub struct LockError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl LockError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self { path: path.to_path_buf(), source }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at: DateTime<Utc>,
    operation: String,
}

enum Holder {
    Held,
    Abandoned(&'static str),
    Gone,
}

/// An acquired lock file. Dropping it releases the lock.
#[derive(Debug)]
pub struct VaultLock {
    path: PathBuf,
}

impl VaultLock {
    /// Take the lock at `path`, or return `None` while another live owner
    /// holds it.
    pub fn try_acquire(path: &Path, operation: &str) -> Result<Option<Self>, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::new(path, e))?;
        }
        if let Some(lock) = create(path, operation)? {
            return Ok(Some(lock));
        }
        match inspect(path)? {
            Holder::Held => return Ok(None),
            Holder::Gone => {}
            Holder::Abandoned(reason) => {
                warn!(path = %path.display(), reason, "taking over abandoned lock");
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(LockError::new(path, e)),
                }
            }
        }
        // Another process may win the race for the freed file.
        create(path, operation)
    }

    /// Take the lock at `path`, polling until the current owner releases it.
    pub async fn acquire(path: &Path, operation: &str, poll: Duration) -> Result<Self, LockError> {
        let mut announced = false;
        loop {
            if let Some(lock) = Self::try_acquire(path, operation)? {
                return Ok(lock);
            }
            if !announced {
                debug!(path = %path.display(), operation, "waiting for lock");
                announced = true;
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %error, "failed to release lock");
            }
        }
    }
}

fn create(path: &Path, operation: &str) -> Result<Option<VaultLock>, LockError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(LockError::new(path, e)),
    };
    // From here on the file is ours; dropping the guard removes it on error.
    let lock = VaultLock { path: path.to_path_buf() };
    let info = LockInfo {
        pid: std::process::id(),
        created_at: Utc::now(),
        operation: operation.to_string(),
    };
    let contents = serde_json::to_vec(&info).map_err(|e| LockError::new(path, e.into()))?;
    file.write_all(&contents).and_then(|()| file.sync_all()).map_err(|e| LockError::new(path, e))?;
    Ok(Some(lock))
}

fn inspect(path: &Path) -> Result<Holder, LockError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Holder::Gone),
        Err(e) => return Err(LockError::new(path, e)),
    };
    let Ok(info) = serde_json::from_slice::<LockInfo>(&contents) else {
        return Ok(if written_recently(path) { Holder::Held } else { Holder::Abandoned("corrupt") });
    };
    if !pid_is_alive(info.pid) {
        return Ok(Holder::Abandoned("owner exited"));
    }
    if (Utc::now() - info.created_at).num_seconds() > STALE_AFTER_SECONDS {
        return Ok(Holder::Abandoned("stale"));
    }
    debug!(pid = info.pid, operation = %info.operation, since = %info.created_at, "lock is held");
    Ok(Holder::Held)
}

fn written_recently(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|modified| !matches!(modified.elapsed(), Ok(age) if age >= UNWRITTEN_GRACE))
        .unwrap_or(true)
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}
