use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docx_equations::config::init_default_config;
use docx_equations::pipeline::{
    convert_docx_file, ConfigOverrides, ConvertConfig, ConvertResponse, ErrorResponse,
};
use docx_equations::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "docx-equations")]
#[command(about = "Extract embedded OLE equations from a DOCX as MathML/LaTeX and re-render the body with them inline", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Response JSON (default: <input_stem>.equations.json)
    #[arg(short, long, value_name = "JSON")]
    output: Option<PathBuf>,

    /// Also write the inline HTML rendering
    #[arg(long, value_name = "HTML")]
    html: Option<PathBuf>,

    /// Also write the plain-text rendering
    #[arg(long, value_name = "TXT")]
    text: Option<PathBuf>,

    /// Config file path (default: search for docx-equations.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Program that converts a staged OLE equation file to MathML
    #[arg(long, value_name = "PROGRAM")]
    converter_program: Option<String>,

    /// Argument placed before the staged file path (repeatable)
    #[arg(long = "converter-arg", value_name = "ARG", allow_hyphen_values = true)]
    converter_args: Vec<String>,

    /// Directory for staged equation payloads
    #[arg(long, value_name = "DIR")]
    tmp_dir: Option<PathBuf>,

    /// Reject inputs larger than this many bytes
    #[arg(long)]
    max_upload_bytes: Option<u64>,

    /// Skip the generic HTML rendering
    #[arg(long)]
    no_fallback_html: bool,

    /// Do not print progress to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);
    match run(args, &progress) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = ErrorResponse::from_error(&err);
            match serde_json::to_string(&payload) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args, progress: &ConsoleProgress) -> anyhow::Result<()> {
    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docx-equations <input.docx>\n\nTIPS:\n  - Default config search: docx-equations.toml (upwards), or set DOCX_EQUATIONS_CONFIG.\n  - Run with --init-config to write a starter config.\n"
            );
            return Ok(());
        }
    };
    let output = args.output.unwrap_or_else(|| default_output_for(&input));

    let workdir = input
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let workdir = workdir.canonicalize().unwrap_or(workdir);
    let overrides = ConfigOverrides {
        converter_program: args.converter_program,
        converter_args: args.converter_args,
        tmp_dir: args.tmp_dir,
        max_upload_bytes: args.max_upload_bytes,
        no_fallback_html: args.no_fallback_html,
    };
    let cfg = ConvertConfig::resolve(&workdir, args.config, &overrides).context("build config")?;
    if let Some(p) = cfg.config_path.as_ref() {
        progress.info(format!("Config: {}", p.display()));
    }

    progress.info(format!("Read: {}", input.display()));
    let resp = convert_docx_file(&input, &cfg, progress)?;
    write_outputs(&resp, &output, args.html.as_deref(), args.text.as_deref(), progress)
}

fn default_output_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    input.with_file_name(format!("{stem}.equations.json"))
}

fn write_outputs(
    resp: &ConvertResponse,
    json_path: &Path,
    html_path: Option<&Path>,
    text_path: Option<&Path>,
    progress: &ConsoleProgress,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(resp).context("serialize response")?;
    std::fs::write(json_path, json)
        .with_context(|| format!("write json: {}", json_path.display()))?;
    progress.info(format!("Wrote: {}", json_path.display()));
    if let Some(p) = html_path {
        std::fs::write(p, &resp.inline_html)
            .with_context(|| format!("write html: {}", p.display()))?;
        progress.info(format!("Wrote: {}", p.display()));
    }
    if let Some(p) = text_path {
        std::fs::write(p, &resp.plain_text)
            .with_context(|| format!("write text: {}", p.display()))?;
        progress.info(format!("Wrote: {}", p.display()));
    }
    Ok(())
}
