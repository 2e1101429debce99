use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use once_cell::sync::Lazy;

use crate::pipeline::{convert_docx_file, ConfigOverrides, ConvertConfig};
use crate::progress::ConsoleProgress;

static LAST_ERROR: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));

fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(c);
}

fn clear_last_error() {
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

fn take_cstr(ptr: *const c_char, name: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

fn convert_file(config_path: Option<PathBuf>, input: &Path, output: &Path) -> anyhow::Result<()> {
    let workdir = input
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = ConvertConfig::resolve(&workdir, config_path, &ConfigOverrides::default())
        .context("build config")?;
    let resp = convert_docx_file(input, &cfg, &ConsoleProgress::silent())?;
    let json = serde_json::to_string(&resp).context("serialize response")?;
    std::fs::write(output, json).with_context(|| format!("write json: {}", output.display()))?;
    Ok(())
}

/// Convert a DOCX file and write the response JSON to `output_json`.
/// `config_path` may be null to use the default config lookup.
///
/// Returns 0 on success; non-zero on failure (see `de_last_error_utf8()`).
#[no_mangle]
pub extern "C" fn de_convert_docx(
    config_path: *const c_char,
    input_docx: *const c_char,
    output_json: *const c_char,
) -> i32 {
    clear_last_error();
    let cfg = if config_path.is_null() {
        None
    } else {
        match take_cstr(config_path, "config_path") {
            Ok(v) => Some(PathBuf::from(v)),
            Err(e) => {
                set_last_error(&e);
                return 2;
            }
        }
    };
    let input = match take_cstr(input_docx, "input_docx") {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&e);
            return 3;
        }
    };
    let output = match take_cstr(output_json, "output_json") {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&e);
            return 4;
        }
    };

    match convert_file(cfg, Path::new(&input), Path::new(&output)) {
        Ok(()) => 0,
        Err(err) => {
            set_last_error(&format!("{err:#}"));
            10
        }
    }
}

/// Returns the last error message as a UTF-8 C string pointer (or null if none).
/// The pointer is valid until the next `de_convert_docx` call.
#[no_mangle]
pub extern "C" fn de_last_error_utf8() -> *const c_char {
    let guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    }
}
