// Standard library imports
use std::path::Path;

// Third party imports
use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

// Internal imports
use crate::error::{CommonError, CommonResult};

/// Tải cấu hình theo lớp: file (tùy chọn) rồi biến môi trường `PREFIX__SECTION__KEY`.
///
/// File `.env` được nạp trước nếu có. Khóa trong biến môi trường được viết
/// thường, phân cách bằng `__`.
pub fn load_settings<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> CommonResult<T> {
    if dotenv().is_err() {
        debug!("Không tìm thấy file .env, bỏ qua");
    }

    let mut builder = Config::builder();
    if let Some(path) = path {
        if !path.exists() {
            return Err(CommonError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        debug!("Đọc cấu hình từ {}", path.display());
        builder = builder.add_source(File::from(path));
    } else {
        warn!("Không có file cấu hình, chỉ dùng biến môi trường {}__*", env_prefix);
    }

    let settings = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings
        .try_deserialize::<T>()
        .map_err(|e| CommonError::Config(format!("cannot deserialize settings: {}", e)))
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        weight: f64,
        nested: Nested,
    }

    #[derive(Debug, Deserialize)]
    struct Nested {
        chunk: usize,
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"mainnet\"\nweight = 0.5\n[nested]\nchunk = 20").unwrap();

        let sample: Sample = load_settings(Some(file.path()), "NODEWEAVE_CFG_TEST").unwrap();
        assert_eq!(sample.name, "mainnet");
        assert_eq!(sample.weight, 0.5);
        assert_eq!(sample.nested.chunk, 20);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"mainnet\"\n[nested]\nchunk = 20").unwrap();
        std::env::set_var("NODEWEAVE_CFG_ENV__NESTED__CHUNK", "7");

        let sample: Sample = load_settings(Some(file.path()), "NODEWEAVE_CFG_ENV").unwrap();
        assert_eq!(sample.nested.chunk, 7);
        std::env::remove_var("NODEWEAVE_CFG_ENV__NESTED__CHUNK");
    }

    #[test]
    fn test_missing_file_is_error() {
        let result: CommonResult<Sample> =
            load_settings(Some(Path::new("/nonexistent/settings.toml")), "NODEWEAVE_CFG_MISSING");
        assert!(matches!(result, Err(CommonError::Config(_))));
    }
}
