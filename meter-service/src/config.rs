use anyhow::{bail, Context};
use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::{billing::Rates, ocr::NormalizeOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: PathBuf,
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Tesseract `--oem`; 1 selects the LSTM recognizer.
    #[serde(default = "default_engine_mode")]
    pub engine_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: default_tesseract_bin(),
            tessdata_dir: None,
            language: default_language(),
            engine_mode: default_engine_mode(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_contrast")]
    pub contrast: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            contrast: default_contrast(),
        }
    }
}

impl NormalizeConfig {
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            max_width: self.max_width,
            contrast: self.contrast,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_evidence_dir")]
    pub dir: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            dir: default_evidence_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub rates: Rates,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("METER_CONFIG").unwrap_or_else(|_| "meter-config.toml".to_string());
        let contents = fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("loading config {path}"))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.store.kind == StoreKind::Postgres && self.store.uri.is_none() {
            bail!("store.uri is required when store.kind = \"postgres\"");
        }
        if self.normalize.max_width == 0 {
            bail!("normalize.max_width must be positive");
        }
        if !(self.normalize.contrast > -1.0 && self.normalize.contrast < 1.0) {
            bail!("normalize.contrast must lie strictly between -1 and 1");
        }
        if !self.rates.water.is_positive() || !self.rates.electric.is_positive() {
            bail!("rates must be positive");
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_tesseract_bin() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_engine_mode() -> u8 {
    1
}

fn default_max_width() -> u32 {
    800
}

fn default_contrast() -> f32 {
    0.5
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("uploads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::Rate;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [store]
            kind = "memory"

            [http]
            bind_addr = "127.0.0.1:3000"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.store.kind, StoreKind::Memory);
        assert_eq!(cfg.normalize.max_width, 800);
        assert_eq!(cfg.ocr.language, "eng");
        assert_eq!(cfg.ocr.engine_mode, 1);
        assert_eq!(cfg.rates.water, Rate::whole(17));
        assert_eq!(cfg.rates.electric, Rate::whole(7));
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn rates_accept_decimal_strings() {
        let cfg = AppConfig::from_toml(
            r#"
            [store]
            kind = "memory"

            [http]
            bind_addr = "127.0.0.1:3000"

            [rates]
            water = "18.50"
            electric = 8
            "#,
        )
        .unwrap();

        assert_eq!(cfg.rates.water, Rate::from_ten_thousandths(185_000));
        assert_eq!(cfg.rates.electric, Rate::whole(8));
    }

    #[test]
    fn postgres_requires_uri() {
        let res = AppConfig::from_toml(
            r#"
            [store]
            kind = "postgres"

            [http]
            bind_addr = "127.0.0.1:3000"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn contrast_out_of_range_is_rejected() {
        let res = AppConfig::from_toml(
            r#"
            [store]
            kind = "memory"

            [http]
            bind_addr = "127.0.0.1:3000"

            [normalize]
            contrast = 1.0
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn non_positive_rates_are_rejected() {
        let res = AppConfig::from_toml(
            r#"
            [store]
            kind = "memory"

            [http]
            bind_addr = "127.0.0.1:3000"

            [rates]
            water = "0"
            electric = "7"
            "#,
        );
        assert!(res.is_err());
    }
}
