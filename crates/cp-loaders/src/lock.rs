/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Exclusive lock over the working directory.
//!
//! The fixed local artifact paths are shared by every run, so two runs must
//! never overlap. The lock file is created with `create_new` and removed
//! when the guard drops. A lock left behind by a killed process is stale
//! once its holder pid is gone or it is older than [`STALE_AFTER_SECS`], and is
//! then taken over.

use crate::{LoaderError, LoaderResult};
use chrono::{DateTime, Duration, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = ".pipeline.lock";

/// Age after which a lock is stale whatever its holder
pub const STALE_AFTER_SECS: i64 = 3600;

fn stale_after() -> Duration {
  Duration::seconds(STALE_AFTER_SECS)
}

/// Holder recorded in a lock file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Holder {
  pid: u32,
  acquired: DateTime<Utc>,
}

impl Holder {
  fn current() -> Self {
    Self { pid: std::process::id(), acquired: Utc::now() }
  }

  fn parse(text: &str) -> Option<Self> {
    let mut pid = None;
    let mut acquired = None;
    for field in text.split_whitespace() {
      match field.split_once('=') {
        Some(("pid", v)) => pid = v.parse().ok(),
        Some(("acquired", v)) => {
          acquired = DateTime::parse_from_rfc3339(v).ok().map(|t| t.with_timezone(&Utc))
        }
        _ => {}
      }
    }
    Some(Self { pid: pid?, acquired: acquired? })
  }

  fn is_stale(&self, now: DateTime<Utc>) -> bool {
    now - self.acquired > stale_after() || process_gone(self.pid)
  }
}

/// Only answers for a local procfs; elsewhere the age rule applies
fn process_gone(pid: u32) -> bool {
  let proc = Path::new("/proc");
  proc.join("self").exists() && !proc.join(pid.to_string()).exists()
}

#[derive(Debug)]
pub struct RunLock {
  path: PathBuf,
}

impl RunLock {
  pub fn acquire(work_dir: &Path) -> LoaderResult<Self> {
    fs::create_dir_all(work_dir).map_err(|e| LoaderError::io(work_dir, e))?;
    let path = work_dir.join(LOCK_FILE);

    match create(&path) {
      Err(LoaderError::RunInProgress(_)) if is_stale(&path) => {
        warn!("Removing stale lock {}", path.display());
        match fs::remove_file(&path) {
          Ok(()) => {}
          Err(e) if e.kind() == ErrorKind::NotFound => {}
          Err(e) => return Err(LoaderError::io(&path, e)),
        }
        create(&path)?;
      }
      other => other?,
    }

    debug!("Acquired {}", path.display());
    Ok(Self { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

fn create(path: &Path) -> LoaderResult<()> {
  let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
    Ok(file) => file,
    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
      return Err(LoaderError::RunInProgress(path.to_path_buf()))
    }
    Err(e) => return Err(LoaderError::io(path, e)),
  };
  if let Err(e) = write_holder(&mut file, &Holder::current()) {
    let _ = fs::remove_file(path);
    return Err(LoaderError::io(path, e));
  }
  Ok(())
}

fn write_holder(file: &mut File, holder: &Holder) -> std::io::Result<()> {
  writeln!(file, "pid={} acquired={}", holder.pid, holder.acquired.to_rfc3339())?;
  file.sync_all()
}

/// Unreadable holder info falls back to the file's modification time
fn is_stale(path: &Path) -> bool {
  let now = Utc::now();
  if let Some(holder) = fs::read_to_string(path).ok().and_then(|text| Holder::parse(&text)) {
    return holder.is_stale(now);
  }
  fs::metadata(path)
    .and_then(|m| m.modified())
    .map(|modified| now - DateTime::<Utc>::from(modified) > stale_after())
    .unwrap_or(false)
}

impl Drop for RunLock {
  fn drop(&mut self) {
    if let Err(e) = fs::remove_file(&self.path) {
      warn!("Failed to release {}: {}", self.path.display(), e);
    }
  }
}
