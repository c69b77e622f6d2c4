use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// First candidate found on `PATH`.
pub fn find_program(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|c| which::which(c).ok())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn run(
    program: &Path,
    args: &[OsString],
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
) -> Result<Output> {
    debug!(
        "run {} {} timeout={:?}",
        program.display(),
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" "),
        timeout
    );
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    for (k, v) in env {
        cmd.env(k, v);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {}", program.display()))?;

    match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit),
        None => child
            .wait_with_output()
            .with_context(|| format!("waiting for {}", program.display())),
    }
}

/// `Ok(())` on a zero exit status, otherwise a one-line summary ending with
/// the tail of stderr.
pub fn check_status(program: &Path, output: &Output) -> std::result::Result<(), String> {
    if output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program.display(), stderr.trim());
        }
        return Ok(());
    }
    Err(format!(
        "{} exited with {}: {}",
        program.display(),
        output.status,
        stderr_tail(&output.stderr, 8)
    ))
}

fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let from = all.len().saturating_sub(lines);
    all[from..].join(" | ")
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain both pipes while polling; a chatty converter can otherwise block on
    // a full pipe buffer and never exit.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("process timed out after {:?}; killing it", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "process exceeded timeout ({:?}); stderr: {}",
                timeout,
                stderr_tail(&stderr, 8)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_last_non_empty_lines() {
        let tail = stderr_tail(b"a\n\nb\nc\n", 2);
        assert_eq!(tail, "b | c");
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(3), Some(Duration::from_secs(3)));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_tilde("~/bin/x"), PathBuf::from(home).join("bin/x"));
        }
        assert_eq!(expand_tilde("/usr/bin/x"), PathBuf::from("/usr/bin/x"));
    }
}
