//! Supervised camera streaming helper
//!
//! The helper runs as a detached child process tracked through a PID file,
//! so a restarted control plane can still find and stop it.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Configuration for the streaming helper
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Helper executable
    pub command: PathBuf,
    /// Where the helper's PID is recorded
    pub pid_file: PathBuf,
    /// Capture resolution used when none is requested
    pub resolution: String,
    /// Frame rate used when none is requested
    pub framerate: u32,
    /// HTTP port the helper serves the stream on
    pub http_port: u16,
    /// Number of SIGQUITs sent before SIGKILL
    pub quit_attempts: u32,
    /// Pause between shutdown signals
    pub quit_interval: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            command: "mjpg_streamer".into(),
            pid_file: "mjpg_stream.pid".into(),
            resolution: "640x480".into(),
            framerate: 20,
            http_port: 8280,
            quit_attempts: 5,
            quit_interval: Duration::from_secs(1),
        }
    }
}

/// Handle to the streaming helper process
pub struct StreamerProcess {
    config: StreamerConfig,
}

impl StreamerProcess {
    pub fn new(config: StreamerConfig) -> Self {
        Self { config }
    }

    /// (Re)start the helper, returning its PID
    pub async fn start(&self, resolution: Option<&str>, framerate: Option<u32>) -> Result<u32> {
        let resolution = resolution.unwrap_or(&self.config.resolution);
        let framerate = framerate.unwrap_or(self.config.framerate);
        if !is_valid_resolution(resolution) {
            return Err(anyhow!("invalid resolution {:?}", resolution));
        }

        self.stop().await;

        let input = format!("/usr/lib/input_uvc.so -f {} -r {}", framerate, resolution);
        let output = format!("/usr/lib/output_http.so -w /srv/http -p {}", self.config.http_port);
        info!(
            "[STREAMER] running: {} -i {:?} -o {:?}",
            self.config.command.display(),
            input,
            output
        );

        let mut child = Command::new(&self.config.command)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.config.command.display()))?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("streamer exited before its PID was read"))?;

        fs::write(&self.config.pid_file, pid.to_string())
            .with_context(|| format!("failed to write {}", self.config.pid_file.display()))?;

        // Reap the child whenever it exits
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("[STREAMER] pid {} exited: {}", pid, status),
                Err(e) => warn!("[STREAMER] pid {} wait failed: {}", pid, e),
            }
        });

        Ok(pid)
    }

    /// Stop the helper if it is running
    ///
    /// Sends SIGQUIT `quit_attempts` times, `quit_interval` apart, then
    /// SIGKILL. Failures are logged only.
    pub async fn stop(&self) {
        let Some(pid) = self.pid() else {
            return;
        };

        info!("[STREAMER] stopping pid {}", pid);
        for _ in 0..self.config.quit_attempts {
            if !self.deliver(pid, libc::SIGQUIT) {
                return;
            }
            tokio::time::sleep(self.config.quit_interval).await;
        }
        self.deliver(pid, libc::SIGKILL);
    }

    /// PID of the running helper
    ///
    /// A PID file that is unreadable or names a dead process is removed.
    pub fn pid(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.config.pid_file).ok()?;

        let pid = contents.trim().parse::<u32>().ok().filter(|pid| *pid > 0);
        match pid {
            Some(pid) if signal(pid, 0).is_ok() => Some(pid),
            _ => {
                debug!("[STREAMER] removing stale pid file {:?}", contents.trim());
                self.remove_pid_file();
                None
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.pid().is_some()
    }

    /// Send `sig`, returning whether the process is still worth signalling
    fn deliver(&self, pid: u32, sig: libc::c_int) -> bool {
        match signal(pid, sig) {
            Ok(()) => true,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
                debug!("[STREAMER] pid {} is gone", pid);
                self.remove_pid_file();
                false
            }
            Err(e) => {
                warn!("[STREAMER] kill {}: {}", pid, e);
                false
            }
        }
    }

    fn remove_pid_file(&self) {
        if let Err(e) = fs::remove_file(&self.config.pid_file) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("[STREAMER] failed to remove {}: {}", self.config.pid_file.display(), e);
            }
        }
    }
}

fn signal(pid: u32, sig: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::from_raw_os_error(libc::ESRCH))?;
    let result = unsafe { libc::kill(pid, sig) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `<width>x<height>`, digits only
fn is_valid_resolution(resolution: &str) -> bool {
    match resolution.split_once('x') {
        Some((w, h)) => {
            !w.is_empty()
                && !h.is_empty()
                && w.bytes().all(|b| b.is_ascii_digit())
                && h.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> StreamerConfig {
        StreamerConfig {
            pid_file: dir.path().join("stream.pid"),
            quit_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();
        assert_eq!(config.resolution, "640x480");
        assert_eq!(config.framerate, 20);
        assert_eq!(config.quit_attempts, 5);
    }

    #[test]
    fn test_resolution_validation() {
        assert!(is_valid_resolution("640x480"));
        assert!(is_valid_resolution("1280x720"));
        assert!(!is_valid_resolution("640"));
        assert!(!is_valid_resolution("x480"));
        assert!(!is_valid_resolution("640x480 -d /dev/video1"));
    }

    #[test]
    fn test_not_running_without_pid_file() {
        let dir = TempDir::new().unwrap();
        let streamer = StreamerProcess::new(config_in(&dir));
        assert!(!streamer.is_running());
    }

    #[test]
    fn test_stale_pid_file_removed() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::write(&config.pid_file, "999999999").unwrap();

        let streamer = StreamerProcess::new(config.clone());
        assert_eq!(streamer.pid(), None);
        assert!(!config.pid_file.exists());
    }

    #[test]
    fn test_garbage_pid_file_removed() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::write(&config.pid_file, "not-a-pid").unwrap();

        let streamer = StreamerProcess::new(config.clone());
        assert!(!streamer.is_running());
        assert!(!config.pid_file.exists());
    }

    #[tokio::test]
    async fn test_invalid_resolution_rejected() {
        let dir = TempDir::new().unwrap();
        let streamer = StreamerProcess::new(config_in(&dir));
        assert!(streamer.start(Some("huge"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake_streamer");
        fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let config = StreamerConfig {
            command: script,
            ..config_in(&dir)
        };
        let streamer = StreamerProcess::new(config.clone());

        let pid = streamer.start(None, Some(10)).await.expect("start failed");
        assert_eq!(streamer.pid(), Some(pid));
        assert_eq!(fs::read_to_string(&config.pid_file).unwrap(), pid.to_string());

        streamer.stop().await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while streamer.is_running() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("streamer still running after stop");
        assert!(!config.pid_file.exists());
    }
}
