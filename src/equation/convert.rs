use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use encoding_rs::UTF_8;
use serde::Serializer;

use crate::textutil::{non_blank, truncate_chars};

const DETAIL_MAX_CHARS: usize = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionErrorKind {
    /// The converter ran but produced nothing that looks like markup.
    ConverterEmptyMathml,
    /// The converter process could not be started or exited unsuccessfully.
    ConverterProcess,
    /// MathML was obtained but could not be turned into LaTeX.
    LatexConvertFailed,
    /// The payload could not be written to a temporary file.
    StagingFailed,
}

impl ConversionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConverterEmptyMathml => "converter_empty_mathml",
            Self::ConverterProcess => "ruby_converter_error",
            Self::LatexConvertFailed => "latex_convert_failed",
            Self::StagingFailed => "staging_failed",
        }
    }
}

/// Serializes `None` as `""`, which is what API consumers compare against.
pub fn serialize_error_kind<S: Serializer>(
    kind: &Option<ConversionErrorKind>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.map(ConversionErrorKind::as_str).unwrap_or(""))
}

/// Failure reported by a [`MarkupConverter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConverterFailure {
    pub detail: String,
}

/// Outcome of one conversion stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageResult {
    pub value: String,
    pub error: Option<ConversionErrorKind>,
    pub detail: String,
}

impl StageResult {
    fn ok(value: String) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    fn failed(kind: ConversionErrorKind, detail: impl Into<String>) -> Self {
        Self {
            value: String::new(),
            error: Some(kind),
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversion {
    pub mathml: String,
    pub latex: String,
    pub error: Option<ConversionErrorKind>,
    pub error_detail: String,
}

/// Turns a staged OLE equation file into MathML text.
pub trait MarkupConverter {
    fn convert_file(&self, path: &Path) -> Result<String, ConverterFailure>;
}

/// Turns MathML into a LaTeX formula.
pub trait FormulaConverter {
    fn convert(&self, mathml: &str) -> anyhow::Result<String>;
}

/// Runs an external program with the staged file path appended to its arguments and reads
/// MathML from its stdout (e.g. `ruby mt2mml.rb <file>`).
#[derive(Clone, Debug)]
pub struct CommandMarkupConverter {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl MarkupConverter for CommandMarkupConverter {
    fn convert_file(&self, path: &Path) -> Result<String, ConverterFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = self.working_dir.as_ref() {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|e| ConverterFailure {
            detail: format!("spawn {}: {e}", self.program),
        })?;
        if !output.status.success() {
            let (stderr, _) = UTF_8.decode_with_bom_removal(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.into_owned()
            };
            return Err(ConverterFailure { detail });
        }
        let (stdout, _) = UTF_8.decode_with_bom_removal(&output.stdout);
        Ok(stdout.into_owned())
    }
}

pub struct EquationConverter<'a> {
    markup: &'a dyn MarkupConverter,
    formula: &'a dyn FormulaConverter,
    tmp_dir: PathBuf,
}

impl<'a> EquationConverter<'a> {
    pub fn new(
        markup: &'a dyn MarkupConverter,
        formula: &'a dyn FormulaConverter,
        tmp_dir: PathBuf,
    ) -> Self {
        Self {
            markup,
            formula,
            tmp_dir,
        }
    }

    /// Converts one embedded OLE payload. `name` only seeds the temporary file name.
    pub fn convert(&self, ole_bytes: &[u8], name: &str) -> Conversion {
        let mathml = self.to_mathml(ole_bytes, name);
        let Some(markup) = non_blank(&mathml.value).map(str::to_string) else {
            return Conversion {
                error: mathml.error,
                error_detail: mathml.detail,
                ..Conversion::default()
            };
        };
        let latex = self.to_latex(&markup);
        Conversion {
            mathml: markup,
            latex: latex.value,
            error: latex.error,
            error_detail: latex.detail,
        }
    }

    fn to_mathml(&self, ole_bytes: &[u8], name: &str) -> StageResult {
        // Dropping the handle removes the file, whichever way this function returns.
        let staged = match stage_payload(&self.tmp_dir, name, ole_bytes) {
            Ok(f) => f,
            Err(err) => {
                return StageResult::failed(ConversionErrorKind::StagingFailed, format!("{err:#}"))
            }
        };
        match self.markup.convert_file(staged.path()) {
            Ok(out) => {
                let trimmed = out.trim();
                if trimmed.starts_with('<') {
                    StageResult::ok(trimmed.to_string())
                } else {
                    StageResult::failed(
                        ConversionErrorKind::ConverterEmptyMathml,
                        truncate_chars(trimmed, DETAIL_MAX_CHARS),
                    )
                }
            }
            Err(failure) => StageResult::failed(
                ConversionErrorKind::ConverterProcess,
                truncate_chars(&failure.detail, DETAIL_MAX_CHARS),
            ),
        }
    }

    fn to_latex(&self, mathml: &str) -> StageResult {
        match self.formula.convert(mathml) {
            Ok(latex) => match non_blank(&latex) {
                Some(v) => StageResult::ok(v.to_string()),
                None => StageResult::failed(
                    ConversionErrorKind::LatexConvertFailed,
                    "empty formula",
                ),
            },
            Err(err) => StageResult::failed(
                ConversionErrorKind::LatexConvertFailed,
                truncate_chars(&format!("{err:#}"), DETAIL_MAX_CHARS),
            ),
        }
    }
}

fn stage_payload(
    tmp_dir: &Path,
    name: &str,
    bytes: &[u8],
) -> anyhow::Result<tempfile::NamedTempFile> {
    let stem = sanitize_stem(name);
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{stem}-"))
        .suffix(".bin")
        .tempfile_in(tmp_dir)
        .with_context(|| format!("create temp file in {}", tmp_dir.display()))?;
    file.write_all(bytes).context("write temp file")?;
    file.flush().context("flush temp file")?;
    Ok(file)
}

fn sanitize_stem(name: &str) -> String {
    let stem = name.strip_suffix(".bin").unwrap_or(name);
    let cleaned: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "ole".to_string()
    } else {
        cleaned
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeFormula, FakeMarkup};
    use super::*;

    const MML: &str = "<math><msup><mi>x</mi><mn>2</mn></msup></math>";

    #[test]
    fn converts_both_tiers_and_removes_staged_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let padded = format!("\n{MML}\n");
        let markup = FakeMarkup::default().with(b"ole", Ok(padded.as_str()));
        let formula = FakeFormula::default().with(MML, "x^{2}");
        let conv = EquationConverter::new(&markup, &formula, dir.path().to_path_buf());

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert_eq!(out.mathml, MML);
        assert_eq!(out.latex, "x^{2}");
        assert_eq!(out.error, None);

        let seen = markup.seen.borrow();
        assert_eq!(seen.len(), 1);
        let staged_name = seen[0].file_name().and_then(|s| s.to_str()).expect("name");
        assert!(staged_name.starts_with("oleObject1-"));
        assert!(staged_name.ends_with(".bin"));
        assert!(!seen[0].exists(), "staged file must be removed");
    }

    #[test]
    fn process_failure_skips_formula_tier() {
        let dir = tempfile::tempdir().expect("tempdir");
        let markup = FakeMarkup::default().with(b"ole", Err("LoadError: mathtype_to_mathml"));
        let formula = FakeFormula::default();
        let conv = EquationConverter::new(&markup, &formula, dir.path().to_path_buf());

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert_eq!(out.error, Some(ConversionErrorKind::ConverterProcess));
        assert!(out.error_detail.contains("LoadError"));
        assert!(out.mathml.is_empty() && out.latex.is_empty());
        assert!(!markup.seen.borrow()[0].exists());
    }

    #[test]
    fn non_markup_output_is_treated_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let markup = FakeMarkup::default().with(b"ole", Ok("  garbage output "));
        let formula = FakeFormula::default();
        let conv = EquationConverter::new(&markup, &formula, dir.path().to_path_buf());

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert_eq!(out.error, Some(ConversionErrorKind::ConverterEmptyMathml));
        assert!(out.mathml.is_empty());
        assert_eq!(out.error_detail, "garbage output");
    }

    #[test]
    fn formula_failure_keeps_markup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let markup = FakeMarkup::default().with(b"ole", Ok(MML));
        let formula = FakeFormula::default();
        let conv = EquationConverter::new(&markup, &formula, dir.path().to_path_buf());

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert_eq!(out.mathml, MML);
        assert!(out.latex.is_empty());
        assert_eq!(out.error, Some(ConversionErrorKind::LatexConvertFailed));
    }

    #[test]
    fn blank_formula_counts_as_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let markup = FakeMarkup::default().with(b"ole", Ok(MML));
        let formula = FakeFormula::default().with(MML, "   ");
        let conv = EquationConverter::new(&markup, &formula, dir.path().to_path_buf());

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert!(out.latex.is_empty());
        assert_eq!(out.error, Some(ConversionErrorKind::LatexConvertFailed));
    }

    #[test]
    fn missing_tmp_dir_is_a_staging_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let markup = FakeMarkup::default().with(b"ole", Ok(MML));
        let formula = FakeFormula::default();
        let conv = EquationConverter::new(&markup, &formula, dir.path().join("missing"));

        let out = conv.convert(b"ole", "oleObject1.bin");
        assert_eq!(out.error, Some(ConversionErrorKind::StagingFailed));
        assert!(markup.seen.borrow().is_empty());
    }

    #[test]
    fn command_converter_reports_spawn_failure() {
        let conv = CommandMarkupConverter {
            program: "definitely-not-a-real-converter-binary".to_string(),
            args: Vec::new(),
            working_dir: None,
        };
        let err = conv
            .convert_file(Path::new("x.bin"))
            .err()
            .expect("spawn failure");
        assert!(err.detail.contains("definitely-not-a-real-converter-binary"));
    }

    #[test]
    fn staged_names_are_sanitized() {
        assert_eq!(sanitize_stem("oleObject1.bin"), "oleObject1");
        assert_eq!(sanitize_stem("a b/c.bin"), "a_b_c");
        assert_eq!(sanitize_stem(""), "ole");
        assert_eq!(ConversionErrorKind::ConverterProcess.as_str(), "ruby_converter_error");
    }
}
