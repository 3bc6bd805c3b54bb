//! Native pipeline core for the Imba bundler plugin.
//!
//! Two host-driven phases:
//!
//! 1. **Transpile** — once per source file: the black-box compiler turns
//!    `.imba` source into a JS module, then the runtime helper import is
//!    prepended without invalidating the debug map (`sourcemap::stitch`).
//! 2. **Optimize** — once per project, after every file is written:
//!    entrypoints are discovered from configuration and generated markup,
//!    an external bundler runs into an isolated temp directory, and its
//!    flat output is reconciled back onto the original layout, pruning the
//!    directories the moves emptied.
//!
//! The compiler and the bundler are external collaborators behind the
//! `ScriptCompiler` and `Bundler` seams; the napi bridge (feature `napi`)
//! exposes the stages to the JS host.

mod bundle;
mod compiler;
mod config;
mod entrypoints;
mod error;
mod esbuild;
mod scan;
mod sourcemap;
mod trace;
mod transpile;
mod walk;

#[cfg(feature = "napi")]
mod bridge;

pub use bundle::{
    format_bundle_message, optimize, BundleFailure, BundleManifest, BundleMessage, BundleReport,
    BundleRequest, Bundler, MessageLocation,
};
pub use compiler::{CommandCompiler, CompileFailure, CompiledModule, ScriptCompiler};
pub use config::{
    resolve_compiler_options, CompilerOptions, CompilerOverrides, HostConfig, PluginOptions,
    PluginSpec, HELPER_MODULE, MARKUP_EXTENSION, SCRIPT_EXTENSION, SOURCE_EXTENSIONS,
};
pub use entrypoints::resolve_entrypoints;
pub use error::PipelineError;
pub use esbuild::{build_args, EsbuildCli};
pub use scan::scan_markup;
pub use sourcemap::{stitch, SourceMap};
pub use trace::Trace;
pub use transpile::{output_path_for, transpile, TranspiledFile};
pub use walk::{walk, BuildTreeIndex};

#[cfg(test)]
mod pipeline_tests;
