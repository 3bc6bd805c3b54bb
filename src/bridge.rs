//! napi bridge for the JS host build tool.
//!
//! Thin wrappers over the internal Rust API: the host's lifecycle hooks call
//! these with its own configuration records serialized to JSON. Everything
//! interesting happens in the stage modules.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::path::{Path, PathBuf};

use crate::bundle::optimize;
use crate::compiler::CommandCompiler;
use crate::config::{HostConfig, PluginOptions, PluginSpec};
use crate::esbuild::EsbuildCli;
use crate::trace::Trace;
use crate::transpile::transpile;

fn parse_options(value: serde_json::Value) -> Result<PluginOptions> {
    serde_json::from_value(value)
        .map_err(|e| Error::from_reason(format!("invalid plugin options: {}", e)))
}

fn parse_host(value: serde_json::Value) -> Result<HostConfig> {
    serde_json::from_value(value)
        .map_err(|e| Error::from_reason(format!("invalid host configuration: {}", e)))
}

/// Plugin registration record for the host.
#[napi]
pub fn plugin_spec_native() -> serde_json::Value {
    serde_json::to_value(PluginSpec::current()).unwrap_or(serde_json::Value::Null)
}

/// Prepend a prefix to compiled code, carrying the debug map along.
#[napi]
pub fn prepend_code_native(
    code: String,
    source_map: serde_json::Value,
    prefix: String,
    debug: bool,
) -> String {
    crate::sourcemap::stitch(&code, &source_map, &prefix, &Trace::new(debug))
}

/// Compile one source file through an external compiler command and return
/// `{outputPath, code}` with the helper import already injected.
#[napi]
pub fn transpile_native(
    source_path: String,
    compiler_command: Vec<String>,
    plugin_options: serde_json::Value,
    host_config: serde_json::Value,
) -> Result<serde_json::Value> {
    let plugin = parse_options(plugin_options)?;
    let host = parse_host(host_config)?;
    let trace = Trace::new(plugin.debug);

    let mut command = compiler_command.into_iter();
    let program = command
        .next()
        .ok_or_else(|| Error::from_reason("empty compiler command".to_string()))?;
    let compiler = CommandCompiler {
        program: PathBuf::from(program),
        args: command.collect(),
    };

    let transpiled = transpile(&compiler, Path::new(&source_path), &plugin, &host, &trace)
        .map_err(|e| Error::from_reason(e.to_string()))?;

    Ok(serde_json::json!({
        "outputPath": transpiled.output_path.to_string_lossy(),
        "code": transpiled.code,
    }))
}

/// Run the optimize phase against a finished build directory. Returns the
/// host configuration with the consumed minify flag reset.
#[napi]
pub fn optimize_native(
    build_directory: String,
    plugin_options: serde_json::Value,
    host_config: serde_json::Value,
) -> Result<serde_json::Value> {
    let plugin = parse_options(plugin_options)?;
    let mut host = parse_host(host_config)?;
    let trace = Trace::new(plugin.debug);

    optimize(
        &EsbuildCli::default(),
        &plugin,
        &mut host,
        Path::new(&build_directory),
        &trace,
    )
    .map_err(|e| Error::from_reason(e.to_string()))?;

    Ok(serde_json::json!({
        "minify": host.minify,
        "bundle": host.bundle,
    }))
}
