use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "docx-equations.toml";
pub const CONFIG_ENV_VAR: &str = "DOCX_EQUATIONS_CONFIG";

pub const DEFAULT_CONVERTER_PROGRAM: &str = "ruby";
pub const DEFAULT_CONVERTER_SCRIPT: &str = "mt2mml.rb";
pub const CONVERTER_SCRIPT: &str = include_str!("../mt2mml.rb");
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 15 * 1024 * 1024;
pub const DEFAULT_MAX_STREAM_INVENTORY: usize = 30;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub converter: ConverterSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConverterSection {
    /// Program that turns an OLE equation file into MathML on stdout.
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments placed before the staged file path.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Working directory for the converter process. Relative paths resolve against the
    /// config file directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Where payloads are staged for the converter (default: OS temp dir).
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LimitsSection {
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
    #[serde(default)]
    pub max_stream_inventory: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    #[serde(default)]
    pub fallback_html: Option<bool>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent();
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

/// Finds the bundled converter script next to the config file, else upwards from the
/// executable (covers `target/<profile>/` builds run from the crate root).
pub fn find_converter_script(config_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = config_dir {
        let cand = dir.join(DEFAULT_CONVERTER_SCRIPT);
        if cand.is_file() {
            return Some(cand);
        }
    }
    let exe = std::env::current_exe().ok()?;
    find_file_upwards(exe.parent()?, DEFAULT_CONVERTER_SCRIPT, 3)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).context("parse config toml")?;
    if cfg.limits.max_upload_bytes == Some(0) {
        return Err(anyhow!("limits.max_upload_bytes must be greater than zero"));
    }
    Ok(cfg)
}

pub fn default_config_toml() -> String {
    format!(
        r#"# docx-equations configuration

[converter]
# Program + arguments used to turn an embedded OLE equation into MathML.
# The staged file path is appended as the last argument.
program = "{DEFAULT_CONVERTER_PROGRAM}"
args = ["{DEFAULT_CONVERTER_SCRIPT}"]
# working_dir = "."
# tmp_dir = "/tmp"

[limits]
max_upload_bytes = {DEFAULT_MAX_UPLOAD_BYTES}
max_stream_inventory = {DEFAULT_MAX_STREAM_INVENTORY}

[output]
fallback_html = true
"#
    )
}

/// Writes `docx-equations.toml` into `dir`, plus the converter script it points at.
/// Refuses to overwrite the config unless `force` is set; an existing script is kept.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        ));
    }
    std::fs::write(&path, default_config_toml())
        .with_context(|| format!("write config: {}", path.display()))?;

    let script = dir.join(DEFAULT_CONVERTER_SCRIPT);
    if !script.exists() || force {
        std::fs::write(&script, CONVERTER_SCRIPT)
            .with_context(|| format!("write converter script: {}", script.display()))?;
    }
    Ok(path)
}
