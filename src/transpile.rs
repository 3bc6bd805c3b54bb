//! Per-file transpile stage.
//!
//! Runs once per source file during the compile phase: resolve paths, merge
//! compiler options, invoke the compiler, then prepend the runtime helper
//! import without losing the debug map.

use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::ScriptCompiler;
use crate::config::{resolve_compiler_options, HostConfig, PluginOptions, HELPER_MODULE};
use crate::error::PipelineError;
use crate::sourcemap;
use crate::trace::Trace;

lazy_static! {
    /// `.imba` / `.imba2` suffix replaced by the script extension.
    static ref SOURCE_EXT_RE: Regex = Regex::new(r"\.imba\d?$").unwrap();
}

/// Result of transpiling one source file. Writing it to disk is the host's
/// job; nothing here is mutated afterwards.
#[derive(Debug)]
pub struct TranspiledFile {
    pub output_path: PathBuf,
    pub code: String,
}

/// Derive the output path for a source file: same location, script extension.
pub fn output_path_for(source_path: &Path) -> PathBuf {
    let text = source_path.to_string_lossy();
    PathBuf::from(SOURCE_EXT_RE.replace(&text, ".js").into_owned())
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => path
            .strip_prefix(&cwd)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn helper_import(web_modules_url: &str) -> String {
    let path = if web_modules_url.is_empty() {
        HELPER_MODULE.to_string()
    } else {
        format!("{}/{}", web_modules_url.trim_end_matches('/'), HELPER_MODULE)
    };
    format!("import '{}';\n", path)
}

/// Transpile one source file and inject the runtime helper import.
///
/// Compiler rejections propagate unmodified; an unreadable source file is a
/// filesystem failure. Sourcemap trouble never surfaces here.
pub fn transpile(
    compiler: &dyn ScriptCompiler,
    source_path: &Path,
    plugin: &PluginOptions,
    host: &HostConfig,
    trace: &Trace,
) -> Result<TranspiledFile, PipelineError> {
    let source_path = relative_to_cwd(source_path);
    let output_path = output_path_for(&source_path);
    let options = resolve_compiler_options(host, &plugin.compiler, &source_path, &output_path);

    trace.debug(format!("compiling {}", source_path.display()));
    let source = fs::read_to_string(&source_path)
        .map_err(|e| PipelineError::filesystem(&source_path, e))?;

    let mut compiled =
        compiler
            .compile(&source, &options)
            .map_err(|failure| PipelineError::Compile {
                file: source_path.to_string_lossy().into_owned(),
                message: failure.message,
            })?;

    // Some compiler builds attach a stray `maps` key next to the real map.
    if let Some(map) = compiled.source_map.as_object_mut() {
        map.remove("maps");
    }

    let code = sourcemap::stitch(
        &compiled.code,
        &compiled.source_map,
        &helper_import(&host.web_modules_url),
        trace,
    );

    Ok(TranspiledFile { output_path, code })
}
