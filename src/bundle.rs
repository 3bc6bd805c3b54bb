//! Bundle stage and output reconciliation.
//!
//! Runs once per project after every source file has been transpiled and
//! written. The bundler works in an isolated temporary directory; its flat
//! output is then mapped back onto the original layout by correlating
//! basenames through the manifest, and directories emptied by the file
//! moves are pruned.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{HostConfig, PluginOptions};
use crate::entrypoints::resolve_entrypoints;
use crate::error::PipelineError;
use crate::trace::Trace;

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLER SEAM
// ═══════════════════════════════════════════════════════════════════════════════

/// One bundler invocation, fully merged from plugin and host configuration.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub entry_points: Vec<PathBuf>,
    pub metafile: PathBuf,
    pub outdir: PathBuf,
    pub bundle: bool,
    pub splitting: bool,
    pub platform: String,
    pub format: String,
    pub target: String,
    pub sourcemap: bool,
    pub minify: bool,
    pub log_level: String,
}

/// Position a bundler message points at, when the bundler attached one.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleMessage {
    pub text: String,
    pub location: Option<MessageLocation>,
}

/// Warnings from a successful bundler run.
#[derive(Debug, Default)]
pub struct BundleReport {
    pub warnings: Vec<BundleMessage>,
}

/// A failed bundler run; fatal for the whole optimize phase.
#[derive(Debug, Default)]
pub struct BundleFailure {
    pub errors: Vec<BundleMessage>,
    pub warnings: Vec<BundleMessage>,
}

pub trait Bundler {
    fn build(&self, request: &BundleRequest) -> Result<BundleReport, BundleFailure>;
}

/// `<file>:<line>:<column> bundler <kind>: <text>`, or the bare message when
/// no location is known.
pub fn format_bundle_message(kind: &str, message: &BundleMessage) -> String {
    match &message.location {
        Some(loc) => format!(
            "{}:{}:{} bundler {}: {}",
            loc.file, loc.line, loc.column, kind, message.text
        ),
        None => format!("bundler {}: {}", kind, message.text),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANIFEST
// ═══════════════════════════════════════════════════════════════════════════════

/// The bundler's metafile: which outputs were produced from which inputs.
/// Read once per optimize run, then discarded with the temp directory.
#[derive(Debug, Default, Deserialize)]
pub struct BundleManifest {
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILESYSTEM RECONCILIATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Delete `file` if present, then walk upward removing each directory the
/// deletion left empty. Stops at the first non-empty directory, and never
/// touches `stop` itself or anything outside it.
pub(crate) fn remove_file_prune_parents(file: &Path, stop: &Path) {
    // Unlinking a file that does not exist is not an error.
    let _ = fs::remove_file(file);

    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == stop || !current.starts_with(stop) {
            break;
        }
        match fs::read_dir(current) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(_) => break,
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

/// Move with overwrite, creating destination directories as needed. Falls
/// back to copy-and-remove when the rename crosses filesystems.
fn move_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

fn join_host_path(base: &Path, part: &str) -> PathBuf {
    base.join(part.trim_start_matches('/'))
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIMIZE PHASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Bundle the build tree in place.
///
/// Resolves entrypoints, runs the bundler into an isolated temp directory,
/// then reconciles: manifest inputs are deleted (pruning emptied parents),
/// every bundler output moves to the directory of the input sharing its
/// basename (or flat into the build root when nothing correlates), and the
/// host's transient resolution artifacts go away. A bundler rejection is
/// fatal and leaves the build tree exactly as the transpile phase wrote it.
pub fn optimize(
    bundler: &dyn Bundler,
    plugin: &PluginOptions,
    host: &mut HostConfig,
    build_root: &Path,
    trace: &Trace,
) -> Result<(), PipelineError> {
    if !host.bundle {
        trace.debug("bundling disabled by the host configuration");
        return Ok(());
    }

    let entry_points =
        resolve_entrypoints(&plugin.entrypoints, build_root, plugin.smartscan, trace)?;

    let outdir = tempfile::Builder::new()
        .prefix("esbuild_")
        .tempdir()
        .map_err(|e| PipelineError::filesystem(std::env::temp_dir(), e))?;
    let metafile = outdir.path().join("meta.json");

    let request = BundleRequest {
        entry_points,
        metafile: metafile.clone(),
        outdir: outdir.path().to_path_buf(),
        bundle: true,
        splitting: plugin.splitting,
        platform: "browser".to_string(),
        format: "esm".to_string(),
        target: plugin.target.clone(),
        sourcemap: false,
        minify: plugin.minify.unwrap_or(host.minify),
        log_level: "silent".to_string(),
    };

    trace.debug(format!(
        "bundling {} entrypoint(s)",
        request.entry_points.len()
    ));
    let report = match bundler.build(&request) {
        Ok(report) => report,
        Err(failure) => {
            for error in &failure.errors {
                trace.report(format_bundle_message("error", error));
            }
            for warning in &failure.warnings {
                trace.report(format_bundle_message("warning", warning));
            }
            return Err(PipelineError::Bundle {
                errors: failure.errors.len(),
            });
        }
    };
    for warning in &report.warnings {
        trace.report(format_bundle_message("warning", warning));
    }

    let manifest_text =
        fs::read_to_string(&metafile).map_err(|e| PipelineError::filesystem(&metafile, e))?;
    let manifest: BundleManifest = serde_json::from_str(&manifest_text).map_err(|e| {
        PipelineError::filesystem(&metafile, io::Error::new(io::ErrorKind::InvalidData, e))
    })?;

    // Basename to original input path.
    let mut lookup: HashMap<String, PathBuf> = HashMap::new();
    for input in manifest.inputs.keys() {
        if let Some(name) = Path::new(input).file_name() {
            lookup.insert(name.to_string_lossy().into_owned(), PathBuf::from(input));
        }
    }

    // Every output gets exactly one destination; uncorrelated outputs drop
    // flat into the build root.
    let mut plan: Vec<(PathBuf, PathBuf)> = Vec::new();
    for output in manifest.outputs.keys() {
        let output = PathBuf::from(output);
        let name = match output.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let destination = lookup
            .get(&name)
            .cloned()
            .unwrap_or_else(|| build_root.join(&name));
        plan.push((output, destination));
    }

    for input in manifest.inputs.keys() {
        remove_file_prune_parents(Path::new(input), build_root);
    }

    // Transient per-module resolution artifacts from the host tool.
    remove_file_prune_parents(
        &join_host_path(&host.out, &host.web_modules_url).join("import-map.json"),
        &host.out,
    );
    remove_file_prune_parents(
        &join_host_path(&host.out, &host.meta_dir).join("env.js"),
        &host.out,
    );

    for (from, to) in &plan {
        trace.debug(format!("{} -> {}", from.display(), to.display()));
        if let Err(e) = move_overwrite(from, to) {
            trace.warn(format!(
                "could not move {} to {}: {}",
                from.display(),
                to.display(),
                e
            ));
        }
    }

    // Temp directory and its manifest go away together.
    drop(outdir);

    // Minification already happened; later stages must not repeat it.
    host.minify = false;
    Ok(())
}
