//! Các thành phần dùng chung: lỗi, cấu hình, logging, quản lý task nền và tiện ích hex.

pub mod config;
pub mod error;
pub mod logger;
pub mod task_manager;
pub mod utils;

// Re-exports
pub use config::load_settings;
pub use error::{CommonError, CommonResult};
pub use logger::{init_logging, LogConfig};
pub use task_manager::TaskManager;
