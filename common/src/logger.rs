// Standard library imports
use std::path::PathBuf;

// Third party imports
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, fmt::format::FmtSpan, prelude::*, EnvFilter};

// Internal imports
use crate::error::{CommonError, CommonResult};

/// Cấu hình logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Mức log mặc định khi không có RUST_LOG
    pub level: String,
    /// Thư mục chứa file log xoay vòng theo ngày, `None` thì chỉ ghi stderr
    pub log_dir: Option<PathBuf>,
    /// Tiền tố tên file log
    pub file_prefix: String,
    /// Bật màu ANSI cho stderr
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "nodeweave.log".to_string(),
            ansi: true,
        }
    }
}

impl LogConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Khởi tạo tracing subscriber toàn cục.
///
/// Trả về guard của writer non-blocking khi ghi ra file; caller phải giữ
/// guard tới khi thoát để log được flush.
pub fn init_logging(config: &LogConfig) -> CommonResult<Option<WorkerGuard>> {
    let stderr_layer = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(stderr_layer)
                .with(
                    fmt::Layer::new()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init()
                .map_err(|e| CommonError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(stderr_layer)
                .try_init()
                .map_err(|e| CommonError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_file_logging_creates_dir_and_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_dir: Some(dir.path().join("logs")),
            ansi: false,
            ..LogConfig::default()
        };

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
        tracing::info!("logging initialised");

        let second = init_logging(&LogConfig::default());
        assert!(matches!(second, Err(CommonError::Logging(_))));
    }
}
