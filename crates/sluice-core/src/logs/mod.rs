//! Logging for the gateway: a colorized diagnostic log via `env_logger`,
//! and a dedicated, file-backed audit log for pipeline rejections and admin
//! mutations.

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

/// Configures the process-wide `log` facade: timestamped, level-colored
/// output to stderr, driven by `RUST_LOG` (defaults to `info`).
pub fn configure_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:<5}] {}:{} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init()
        .ok();
}

/// Append-mode audit log for the admission pipeline.
///
/// Every rejection (`unauthorized`, `not_found`, `rate_limit_exceeded`,
/// `internal_server_error`) and every admin mutation writes one line here.
/// Writes are serialized through a mutex around the file handle.
pub struct AuditLog {
    file: Mutex<File>,
}

impl AuditLog {
    /// Opens (creating if necessary) the audit log at `path` in append mode.
    pub fn open(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one structured rejection line: kind, path, and the user
    /// credential where available.
    pub fn write_rejection(&self, kind: &str, path: &str, user_id: Option<&str>) {
        let line = format!(
            "{} ERROR kind={} path={} user={}\n",
            Local::now().to_rfc3339(),
            kind,
            path,
            user_id.unwrap_or("-"),
        );
        self.write_line(&line);
    }

    /// Writes one structured admin-mutation line.
    pub fn write_admin_mutation(&self, victim_id: &str, rate: f64) {
        let line = format!(
            "{} INFO kind=admin_mutate victim={} rate={:.3}\n",
            Local::now().to_rfc3339(),
            victim_id,
            rate,
        );
        self.write_line(&line);
    }

    fn write_line(&self, line: &str) {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()) {
            log::error!("failed to write audit log line: {}", e);
        }
    }
}
