//! Entrypoint discovery for the optimize phase.
//!
//! Three sources feed the candidate list: names from the plugin
//! configuration, references scanned out of generated markup, and the
//! build-tree index that both are matched against. Candidates that resolve
//! to nothing are dropped silently; a dangling markup reference to a CDN
//! script is common and must not abort the build.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::scan::scan_markup;
use crate::trace::Trace;
use crate::walk::walk;

/// Reduce a configured name or scanned reference to its lookup key:
/// directory stripped, extension stripped, lowercased.
fn candidate_key(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    };
    stem.to_lowercase()
}

/// Resolve the final, deduplicated, order-stable list of absolute script
/// paths to hand to the bundler.
///
/// Raises a configuration error only when nothing resolved AND nothing was
/// configured; an empty result after filtering unresolvable scanned
/// references is legitimate.
pub fn resolve_entrypoints(
    configured: &[String],
    build_root: &Path,
    smartscan: bool,
    trace: &Trace,
) -> Result<Vec<PathBuf>, PipelineError> {
    let index = walk(build_root)?;

    let mut candidates: Vec<String> = configured.to_vec();
    if smartscan {
        for markup in &index.markup_files {
            let text =
                fs::read_to_string(markup).map_err(|e| PipelineError::filesystem(markup, e))?;
            let references = scan_markup(&text);
            trace.debug(format!(
                "{}: {} script reference(s)",
                markup.display(),
                references.len()
            ));
            candidates.extend(references);
        }
    }

    let mut resolved: Vec<PathBuf> = Vec::new();
    for candidate in &candidates {
        match index.scripts_by_basename.get(&candidate_key(candidate)) {
            Some(path) => {
                if !resolved.iter().any(|seen| seen == path) {
                    resolved.push(path.clone());
                }
            }
            None => trace.debug(format!(
                "no script in the build tree matches '{}'",
                candidate
            )),
        }
    }

    if resolved.is_empty() && configured.is_empty() {
        return Err(PipelineError::Config {
            reason: "no entrypoints configured and none discovered in markup".to_string(),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_candidate_key_strips_directory_and_extension() {
        assert_eq!(candidate_key("main"), "main");
        assert_eq!(candidate_key("Main.imba"), "main");
        assert_eq!(candidate_key("src/app/Main.js"), "main");
        assert_eq!(candidate_key("https://cdn.example/lib.js"), "lib");
        assert_eq!(candidate_key(".env"), ".env");
    }

    #[test]
    fn test_configured_names_dedup_to_one_path() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("static/main.js"), "");

        let resolved = resolve_entrypoints(
            &["main".to_string(), "main.imba".to_string()],
            root.path(),
            false,
            &Trace::default(),
        )
        .unwrap();
        assert_eq!(resolved, vec![root.path().join("static/main.js")]);
    }

    #[test]
    fn test_markup_references_append_after_configured() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("app.js"), "");
        write(&root.path().join("extra.js"), "");
        write(
            &root.path().join("index.html"),
            r#"<script src="extra.js"></script>"#,
        );

        let resolved = resolve_entrypoints(
            &["app".to_string()],
            root.path(),
            true,
            &Trace::default(),
        )
        .unwrap();
        assert_eq!(
            resolved,
            vec![root.path().join("app.js"), root.path().join("extra.js")]
        );
    }

    #[test]
    fn test_unresolvable_reference_is_tolerated() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("app.js"), "");
        write(
            &root.path().join("index.html"),
            r#"<script src="https://cdn.example/lib.js"></script>"#,
        );

        let resolved = resolve_entrypoints(
            &["app".to_string()],
            root.path(),
            true,
            &Trace::default(),
        )
        .unwrap();
        assert_eq!(resolved, vec![root.path().join("app.js")]);
    }

    #[test]
    fn test_scanning_disabled_ignores_markup() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("app.js"), "");
        write(&root.path().join("extra.js"), "");
        write(
            &root.path().join("index.html"),
            r#"<script src="extra.js"></script>"#,
        );

        let resolved = resolve_entrypoints(
            &["app".to_string()],
            root.path(),
            false,
            &Trace::default(),
        )
        .unwrap();
        assert_eq!(resolved, vec![root.path().join("app.js")]);
    }

    #[test]
    fn test_empty_configuration_and_empty_tree_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err =
            resolve_entrypoints(&[], root.path(), false, &Trace::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_configured_but_unresolved_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let resolved = resolve_entrypoints(
            &["ghost".to_string()],
            root.path(),
            false,
            &Trace::default(),
        )
        .unwrap();
        assert!(resolved.is_empty());
    }
}
