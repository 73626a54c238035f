//! Service configuration, layered from defaults, an optional TOML file, and
//! `LEAFSCAN_*` environment variables

use crate::predict::DEFAULT_MAX_PIXELS;
use crate::torch::TensorLayout;
use ::config::{Config, Environment, File};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Log filter used when `RUST_LOG` is not set
pub const RUST_LOG: &str = "leafscan=info,actix_web=info";

/// Prefix for environment overrides, e.g. `LEAFSCAN_PORT=9000`
pub const ENV_PREFIX: &str = "LEAFSCAN";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Interface to listen on
    pub host: String,

    pub port: u16,

    /// The TorchScript model file
    pub model_path: PathBuf,

    /// Labels file, one class per line. The built-in PlantVillage table is
    /// used when unset
    pub labels_path: Option<PathBuf>,

    pub layout: TensorLayout,

    /// Quality of the echoed JPEG, 1 to 100
    pub jpeg_quality: u8,

    /// Largest accepted upload
    pub max_upload_bytes: usize,

    /// Largest accepted image after decoding, as width times height
    pub max_pixels: u64,

    /// Probe the model at startup and require its output width to match the
    /// label count
    pub validate_labels: bool,

    /// HTTP worker threads; the actix default when unset
    pub workers: Option<usize>,
}

impl Settings {
    /// Load settings. `file`, when given, must exist
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000_i64)?
            .set_default("model_path", "models/plant_disease.pt")?
            .set_default("layout", "channels_last")?
            .set_default("jpeg_quality", 75_i64)?
            .set_default("max_upload_bytes", 10 * 1024 * 1024_i64)?
            .set_default("max_pixels", DEFAULT_MAX_PIXELS as i64)?
            .set_default("validate_labels", true)?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be positive"));
        }
        if self.max_pixels == 0 {
            return Err(anyhow!("max_pixels must be positive"));
        }
        if self.workers == Some(0) {
            return Err(anyhow!("workers must be positive"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    /// Held by every test that reads or writes `LEAFSCAN_*` variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn load(file: Option<&str>) -> Result<Settings> {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        Settings::load(file)
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = load(None).unwrap();
        assert_eq!(settings.bind_addr(), ("0.0.0.0", 8000));
        assert_eq!(settings.model_path, PathBuf::from("models/plant_disease.pt"));
        assert_eq!(settings.layout, TensorLayout::ChannelsLast);
        assert_eq!(settings.jpeg_quality, 75);
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.max_pixels, 178_956_970);
        assert!(settings.validate_labels);
        assert!(settings.labels_path.is_none());
        assert!(settings.workers.is_none());
    }

    #[test]
    fn test_file_overrides() {
        let file = toml_file(
            r#"
            port = 9001
            model_path = "/srv/leaf.pt"
            labels_path = "/srv/labels.txt"
            layout = "channels_first"
            workers = 2
            max_pixels = 4000000
            "#,
        );

        let settings = load(file.path().to_str()).unwrap();
        assert_eq!(settings.port, 9001);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.model_path, PathBuf::from("/srv/leaf.pt"));
        assert_eq!(settings.labels_path, Some(PathBuf::from("/srv/labels.txt")));
        assert_eq!(settings.layout, TensorLayout::ChannelsFirst);
        assert_eq!(settings.workers, Some(2));
        assert_eq!(settings.max_pixels, 4_000_000);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file(
            r#"
            port = 9001
            model_path = "/srv/from-file.pt"
            "#,
        );

        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("LEAFSCAN_PORT", "9100");
        env::set_var("LEAFSCAN_MODEL_PATH", "/srv/from-env.pt");
        let settings = Settings::load(file.path().to_str());
        env::remove_var("LEAFSCAN_PORT");
        env::remove_var("LEAFSCAN_MODEL_PATH");

        let settings = settings.unwrap();
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.model_path, PathBuf::from("/srv/from-env.pt"));
        assert_eq!(settings.host, "0.0.0.0");
    }

    #[test]
    fn test_zero_max_pixels() {
        let file = toml_file("max_pixels = 0");
        assert!(load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_bad_quality() {
        let file = toml_file("jpeg_quality = 0");
        assert!(load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_bad_layout() {
        let file = toml_file(r#"layout = "sideways""#);
        assert!(load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load(Some("does/not/exist.toml")).is_err());
    }
}
