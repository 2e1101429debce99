use std::path::{Path, PathBuf};

use crate::config::{
    find_converter_script, find_default_config, load_config, AppConfig, CONFIG_ENV_VAR,
    DEFAULT_CONFIG_FILE, DEFAULT_CONVERTER_PROGRAM, DEFAULT_CONVERTER_SCRIPT,
    DEFAULT_MAX_STREAM_INVENTORY, DEFAULT_MAX_UPLOAD_BYTES,
};
use crate::equation::convert::CommandMarkupConverter;

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub converter_program: Option<String>,
    pub converter_args: Vec<String>,
    pub tmp_dir: Option<PathBuf>,
    pub max_upload_bytes: Option<u64>,
    pub no_fallback_html: bool,
}

/// Fully resolved settings for one process. Built once, passed by reference to every request.
#[derive(Clone, Debug)]
pub struct ConvertConfig {
    pub config_path: Option<PathBuf>,
    pub converter: CommandMarkupConverter,
    pub tmp_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_stream_inventory: usize,
    pub fallback_html: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default(), None, &ConfigOverrides::default())
    }
}

impl ConvertConfig {
    /// Locates and loads the config file (`--config`, then `DOCX_EQUATIONS_CONFIG`, then an
    /// upward search from `workdir`) and applies `overrides` on top.
    pub fn resolve(
        workdir: &Path,
        config_path: Option<PathBuf>,
        overrides: &ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(workdir, DEFAULT_CONFIG_FILE));

        let mut file_cfg = AppConfig::default();
        let mut loaded = None;
        if let Some(p) = cfg_file {
            if p.exists() {
                file_cfg = load_config(&p)?;
                loaded = Some(p);
            }
        }
        Ok(Self::from_app_config(&file_cfg, loaded.as_deref(), overrides))
    }

    /// Relative paths in the file resolve against the file's directory. When a file was
    /// loaded and names no working directory, the converter runs from that directory.
    pub fn from_app_config(
        file_cfg: &AppConfig,
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Self {
        let cfg_dir = config_path.map(|p| p.parent().unwrap_or_else(|| Path::new(".")));
        let anchor = |p: PathBuf| match cfg_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p,
        };

        let program = overrides
            .converter_program
            .clone()
            .or_else(|| file_cfg.converter.program.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONVERTER_PROGRAM.to_string());
        let args = if !overrides.converter_args.is_empty() {
            overrides.converter_args.clone()
        } else {
            file_cfg
                .converter
                .args
                .clone()
                .unwrap_or_else(|| vec![default_script_arg(cfg_dir)])
        };
        let working_dir = file_cfg
            .converter
            .working_dir
            .clone()
            .map(anchor)
            .or_else(|| cfg_dir.map(Path::to_path_buf));

        let tmp_dir = overrides
            .tmp_dir
            .clone()
            .or_else(|| file_cfg.converter.tmp_dir.clone().map(anchor))
            .unwrap_or_else(std::env::temp_dir);

        let max_upload_bytes = overrides
            .max_upload_bytes
            .or(file_cfg.limits.max_upload_bytes)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let max_stream_inventory = file_cfg
            .limits
            .max_stream_inventory
            .unwrap_or(DEFAULT_MAX_STREAM_INVENTORY)
            .min(DEFAULT_MAX_STREAM_INVENTORY);
        let fallback_html =
            !overrides.no_fallback_html && file_cfg.output.fallback_html.unwrap_or(true);

        Self {
            config_path: config_path.map(Path::to_path_buf),
            converter: CommandMarkupConverter {
                program,
                args,
                working_dir,
            },
            tmp_dir,
            max_upload_bytes,
            max_stream_inventory,
            fallback_html,
        }
    }
}

/// Absolute path of the bundled script when it can be found, so the converter does not
/// depend on the process working directory.
fn default_script_arg(cfg_dir: Option<&Path>) -> String {
    find_converter_script(cfg_dir)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONVERTER_SCRIPT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn defaults_without_a_file() {
        let cfg = ConvertConfig::default();
        assert_eq!(cfg.converter.program, "ruby");
        assert_eq!(cfg.converter.args.len(), 1);
        assert!(cfg.converter.args[0].ends_with("mt2mml.rb"));
        assert!(cfg.converter.working_dir.is_none());
        assert_eq!(cfg.max_upload_bytes, 15 * 1024 * 1024);
        assert_eq!(cfg.max_stream_inventory, 30);
        assert!(cfg.fallback_html);
        assert_eq!(cfg.tmp_dir, std::env::temp_dir());
    }

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let file = parse_config(
            "[converter]\nworking_dir = \"tools\"\ntmp_dir = \"/var/tmp\"\n[output]\nfallback_html = false\n",
        )
        .expect("parse");
        let cfg_path = Path::new("/etc/docx/docx-equations.toml");
        let cfg = ConvertConfig::from_app_config(&file, Some(cfg_path), &ConfigOverrides::default());
        assert_eq!(cfg.converter.working_dir, Some(PathBuf::from("/etc/docx/tools")));
        assert_eq!(cfg.tmp_dir, PathBuf::from("/var/tmp"));
        assert!(!cfg.fallback_html);
    }

    #[test]
    fn overrides_win_over_file() {
        let file = parse_config(
            "[converter]\nprogram = \"ruby\"\nargs = [\"a.rb\"]\n[limits]\nmax_upload_bytes = 10\n",
        )
        .expect("parse");
        let overrides = ConfigOverrides {
            converter_program: Some("mt2mml".to_string()),
            converter_args: vec!["--stdout".to_string()],
            tmp_dir: Some(PathBuf::from("scratch")),
            max_upload_bytes: Some(99),
            no_fallback_html: true,
        };
        let cfg = ConvertConfig::from_app_config(&file, None, &overrides);
        assert_eq!(cfg.converter.program, "mt2mml");
        assert_eq!(cfg.converter.args, vec!["--stdout".to_string()]);
        assert_eq!(cfg.tmp_dir, PathBuf::from("scratch"));
        assert_eq!(cfg.max_upload_bytes, 99);
        assert!(!cfg.fallback_html);
    }

    #[test]
    fn resolve_loads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[limits]\nmax_stream_inventory = 5\n").expect("write");
        let cfg = ConvertConfig::resolve(dir.path(), Some(path.clone()), &ConfigOverrides::default())
            .expect("resolve");
        assert_eq!(cfg.config_path, Some(path));
        assert_eq!(cfg.max_stream_inventory, 5);
        assert_eq!(cfg.converter.working_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn default_script_is_found_next_to_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("mt2mml.rb");
        std::fs::write(&script, "puts ''\n").expect("write script");
        let cfg_path = dir.path().join("docx-equations.toml");
        let cfg = ConvertConfig::from_app_config(
            &AppConfig::default(),
            Some(&cfg_path),
            &ConfigOverrides::default(),
        );
        assert_eq!(cfg.converter.args, vec![script.to_string_lossy().into_owned()]);
    }

    #[test]
    fn stream_inventory_is_capped() {
        let file = parse_config("[limits]\nmax_stream_inventory = 500\n").expect("parse");
        let cfg = ConvertConfig::from_app_config(&file, None, &ConfigOverrides::default());
        assert_eq!(cfg.max_stream_inventory, 30);
    }
}
