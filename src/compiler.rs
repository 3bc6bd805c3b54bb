//! Seam to the black-box source compiler.
//!
//! The pipeline only needs one operation from the compiler: source text in,
//! generated code plus a debug map out. `CommandCompiler` adapts any
//! external compiler process to that contract.

use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::config::CompilerOptions;

/// Output of one compiler invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct CompiledModule {
    #[serde(rename = "js")]
    pub code: String,
    #[serde(rename = "sourcemap", default)]
    pub source_map: Value,
}

/// A compiler rejection; the message reaches the caller unmodified.
#[derive(Debug)]
pub struct CompileFailure {
    pub message: String,
}

pub trait ScriptCompiler {
    fn compile(&self, source: &str, options: &CompilerOptions)
        -> Result<CompiledModule, CompileFailure>;
}

/// Adapter for an external compiler command: source text on stdin, resolved
/// options as a JSON argument, and a `{"js": ..., "sourcemap": ...}` record
/// on stdout.
pub struct CommandCompiler {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandCompiler {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

impl ScriptCompiler for CommandCompiler {
    fn compile(
        &self,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<CompiledModule, CompileFailure> {
        let options_json = serde_json::to_string(options).map_err(|e| CompileFailure {
            message: format!("unserializable compiler options: {}", e),
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(options_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CompileFailure {
                message: format!("failed to spawn {}: {}", self.program.display(), e),
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(source.as_bytes()).map_err(|e| CompileFailure {
                message: format!("failed to feed compiler stdin: {}", e),
            })?;
        }

        let output = child.wait_with_output().map_err(|e| CompileFailure {
            message: format!("compiler did not finish: {}", e),
        })?;

        if !output.status.success() {
            return Err(CompileFailure {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| CompileFailure {
            message: format!("unreadable compiler output: {}", e),
        })
    }
}
