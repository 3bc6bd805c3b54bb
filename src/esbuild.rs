//! esbuild CLI adapter for the bundler seam.
//!
//! Drives the standalone `esbuild` binary. The CLI does not expose the
//! structured error objects its API has, so stderr lines are mapped back
//! into messages best-effort, recognizing the `file:line:col:` prefix when
//! present.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;

use crate::bundle::{
    BundleFailure, BundleMessage, BundleReport, BundleRequest, Bundler, MessageLocation,
};

lazy_static! {
    /// `path/to/file.js:12:3: error: message` stderr shape.
    static ref LOCATED_LINE_RE: Regex =
        Regex::new(r"^(.+?):(\d+):(\d+):\s*(?:error:|warning:)?\s*(.*)$").unwrap();
}

pub struct EsbuildCli {
    pub program: PathBuf,
}

impl Default for EsbuildCli {
    fn default() -> Self {
        EsbuildCli {
            program: PathBuf::from("esbuild"),
        }
    }
}

/// Flag list for one request; separate from the spawn so it can be checked
/// without running anything.
pub fn build_args(request: &BundleRequest) -> Vec<String> {
    let mut args: Vec<String> = request
        .entry_points
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    if request.bundle {
        args.push("--bundle".to_string());
    }
    args.push(format!("--metafile={}", request.metafile.display()));
    args.push(format!("--outdir={}", request.outdir.display()));
    if request.splitting {
        args.push("--splitting".to_string());
    }
    args.push(format!("--platform={}", request.platform));
    args.push(format!("--format={}", request.format));
    args.push(format!("--target={}", request.target));
    if request.sourcemap {
        args.push("--sourcemap".to_string());
    }
    if request.minify {
        args.push("--minify".to_string());
    }
    args.push(format!("--log-level={}", request.log_level));
    args
}

fn parse_stderr(stderr: &str) -> Vec<BundleMessage> {
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match LOCATED_LINE_RE.captures(line) {
            Some(captures) => BundleMessage {
                text: captures[4].to_string(),
                location: Some(MessageLocation {
                    file: captures[1].to_string(),
                    line: captures[2].parse().unwrap_or(0),
                    column: captures[3].parse().unwrap_or(0),
                }),
            },
            None => BundleMessage {
                text: line.trim().to_string(),
                location: None,
            },
        })
        .collect()
}

impl Bundler for EsbuildCli {
    fn build(&self, request: &BundleRequest) -> Result<BundleReport, BundleFailure> {
        let output = match Command::new(&self.program).args(build_args(request)).output() {
            Ok(output) => output,
            Err(e) => {
                return Err(BundleFailure {
                    errors: vec![BundleMessage {
                        text: format!("failed to run {}: {}", self.program.display(), e),
                        location: None,
                    }],
                    warnings: Vec::new(),
                })
            }
        };

        let messages = parse_stderr(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            Ok(BundleReport { warnings: messages })
        } else {
            Err(BundleFailure {
                errors: messages,
                warnings: Vec::new(),
            })
        }
    }
}
