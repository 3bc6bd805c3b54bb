//! Configuration records for the bundler plugin.
//!
//! Three layers feed the compiler configuration: fixed defaults, the host
//! build configuration, then plugin-level overrides — each layer only
//! touching what it actually sets. Path-derived fields are applied last and
//! are never overridable.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Runtime helper module injected into every transpiled file.
pub const HELPER_MODULE: &str = "imba/dist/imba.js";

/// Source extensions routed to the transpile stage.
pub const SOURCE_EXTENSIONS: [&str; 2] = [".imba", ".imba2"];

/// Extension of transpiled script output, and the suffix the build-tree walk
/// classifies scripts by.
pub const SCRIPT_EXTENSION: &str = ".js";

/// Extension of markup files consulted by smartscan.
pub const MARKUP_EXTENSION: &str = ".html";

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN SURFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Static description of the plugin, reported to the host so it can route
/// source files to the transpile stage and pre-install the runtime helper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    pub name: String,
    pub input_extensions: Vec<String>,
    pub output_extension: String,
    pub known_entrypoints: Vec<String>,
}

impl PluginSpec {
    pub fn current() -> Self {
        PluginSpec {
            name: "imba-bundler".to_string(),
            input_extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            output_extension: SCRIPT_EXTENSION.to_string(),
            known_entrypoints: vec![HELPER_MODULE.to_string()],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn deserialize_entrypoints<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
    })
}

/// Options supplied by the project configuration for this plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginOptions {
    /// Entrypoint names or paths. A single bare string is accepted and
    /// treated as a one-element list.
    #[serde(deserialize_with = "deserialize_entrypoints")]
    pub entrypoints: Vec<String>,
    /// Code splitting in the bundler.
    pub splitting: bool,
    /// Bundler syntax target.
    pub target: String,
    /// Minify override; `None` inherits the host build setting.
    pub minify: Option<bool>,
    /// Numbered diagnostic tracing.
    pub debug: bool,
    /// Scan generated markup for additional entrypoint references.
    pub smartscan: bool,
    /// Compiler option overrides.
    pub compiler: CompilerOverrides,
}

impl Default for PluginOptions {
    fn default() -> Self {
        PluginOptions {
            entrypoints: Vec::new(),
            splitting: false,
            target: "es2017".to_string(),
            minify: None,
            debug: false,
            smartscan: true,
            compiler: CompilerOverrides::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST BUILD CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// The slice of the host build tool's configuration the plugin consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Install-phase source map preference; the compiler default applies
    /// when unset.
    pub source_map: Option<bool>,
    /// Whether the optimize phase bundles at all.
    pub bundle: bool,
    /// Project-wide minify setting; consumed (and reset) by the bundle stage.
    pub minify: bool,
    /// URL prefix the host serves installed web modules under.
    pub web_modules_url: String,
    /// Directory of the host's generated runtime metadata.
    pub meta_dir: String,
    /// Root of the final build output on disk.
    pub out: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            source_map: None,
            bundle: true,
            minify: false,
            web_modules_url: "web_modules".to_string(),
            meta_dir: "meta".to_string(),
            out: PathBuf::from("build"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fully resolved options handed to the compiler for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub standalone: bool,
    pub source_map: bool,
    pub evaling: bool,
    pub target: String,
    pub format: String,
    pub es6: bool,
    pub source_root: String,
    pub filename: String,
    pub source_path: String,
    pub target_path: String,
}

/// Plugin-level compiler overrides. Each field only applies when set; the
/// path-derived fields have no override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOverrides {
    pub standalone: Option<bool>,
    pub source_map: Option<bool>,
    pub evaling: Option<bool>,
    pub target: Option<String>,
    pub format: Option<String>,
    pub es6: Option<bool>,
    pub source_root: Option<String>,
}

/// Layered option resolution: fixed defaults, then the host build
/// configuration, then plugin overrides, then the path-derived fields.
pub fn resolve_compiler_options(
    host: &HostConfig,
    overrides: &CompilerOverrides,
    source_path: &Path,
    target_path: &Path,
) -> CompilerOptions {
    let mut options = CompilerOptions {
        standalone: true,
        source_map: true,
        evaling: true,
        target: "web".to_string(),
        format: "esm".to_string(),
        es6: true,
        source_root: String::new(),
        filename: String::new(),
        source_path: String::new(),
        target_path: String::new(),
    };

    if let Some(source_map) = host.source_map {
        options.source_map = source_map;
    }

    if let Some(standalone) = overrides.standalone {
        options.standalone = standalone;
    }
    if let Some(source_map) = overrides.source_map {
        options.source_map = source_map;
    }
    if let Some(evaling) = overrides.evaling {
        options.evaling = evaling;
    }
    if let Some(target) = &overrides.target {
        options.target = target.clone();
    }
    if let Some(format) = &overrides.format {
        options.format = format.clone();
    }
    if let Some(es6) = overrides.es6 {
        options.es6 = es6;
    }
    if let Some(source_root) = &overrides.source_root {
        options.source_root = source_root.clone();
    }

    options.filename = source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    options.source_path = source_path.to_string_lossy().into_owned();
    options.target_path = target_path.to_string_lossy().into_owned();

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_options_defaults() {
        let options: PluginOptions = serde_json::from_str("{}").unwrap();
        assert!(options.entrypoints.is_empty());
        assert!(!options.splitting);
        assert_eq!(options.target, "es2017");
        assert_eq!(options.minify, None);
        assert!(!options.debug);
        assert!(options.smartscan);
    }

    #[test]
    fn test_entrypoints_accept_bare_string() {
        let options: PluginOptions =
            serde_json::from_str(r#"{"entrypoints": "main.imba"}"#).unwrap();
        assert_eq!(options.entrypoints, vec!["main.imba"]);
    }

    #[test]
    fn test_entrypoints_accept_list() {
        let options: PluginOptions =
            serde_json::from_str(r#"{"entrypoints": ["main.imba", "admin"]}"#).unwrap();
        assert_eq!(options.entrypoints, vec!["main.imba", "admin"]);
    }

    #[test]
    fn test_compiler_defaults() {
        let host = HostConfig::default();
        let options = resolve_compiler_options(
            &host,
            &CompilerOverrides::default(),
            Path::new("src/app/main.imba"),
            Path::new("src/app/main.js"),
        );
        assert!(options.standalone);
        assert!(options.source_map);
        assert!(options.evaling);
        assert_eq!(options.target, "web");
        assert_eq!(options.format, "esm");
        assert!(options.es6);
        assert_eq!(options.filename, "main.imba");
        assert_eq!(options.source_path, "src/app/main.imba");
        assert_eq!(options.target_path, "src/app/main.js");
    }

    #[test]
    fn test_host_source_map_fills_unset_layer() {
        let host = HostConfig {
            source_map: Some(false),
            ..HostConfig::default()
        };
        let options = resolve_compiler_options(
            &host,
            &CompilerOverrides::default(),
            Path::new("a.imba"),
            Path::new("a.js"),
        );
        assert!(!options.source_map);
    }

    #[test]
    fn test_plugin_override_wins_over_host() {
        let host = HostConfig {
            source_map: Some(false),
            ..HostConfig::default()
        };
        let overrides = CompilerOverrides {
            source_map: Some(true),
            target: Some("node".to_string()),
            ..CompilerOverrides::default()
        };
        let options =
            resolve_compiler_options(&host, &overrides, Path::new("a.imba"), Path::new("a.js"));
        assert!(options.source_map);
        assert_eq!(options.target, "node");
    }

    #[test]
    fn test_path_fields_are_not_overridable() {
        // Overrides carry no path fields at all; the derived values always win.
        let overrides: CompilerOverrides =
            serde_json::from_str(r#"{"filename": "spoofed.imba", "targetPath": "x.js"}"#)
                .unwrap_or_default();
        let options = resolve_compiler_options(
            &HostConfig::default(),
            &overrides,
            Path::new("real.imba"),
            Path::new("real.js"),
        );
        assert_eq!(options.filename, "real.imba");
        assert_eq!(options.target_path, "real.js");
    }
}
