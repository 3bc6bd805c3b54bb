//! End-to-end tests for the optimize phase against a real temp build tree.
//!
//! The bundler is faked: it writes flat outputs plus a manifest into the
//! request's temp directory, which is all the reconciliation logic ever
//! sees from the real one.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::{
        optimize, BundleFailure, BundleMessage, BundleReport, BundleRequest, Bundler, HostConfig,
        PipelineError, PluginOptions, Trace,
    };

    /// Writes fixed outputs and a manifest naming the given inputs.
    struct FakeBundler {
        inputs: Vec<PathBuf>,
        outputs: Vec<(&'static str, &'static str)>,
    }

    impl Bundler for FakeBundler {
        fn build(&self, request: &BundleRequest) -> Result<BundleReport, BundleFailure> {
            let mut inputs = serde_json::Map::new();
            for input in &self.inputs {
                inputs.insert(
                    input.to_string_lossy().into_owned(),
                    serde_json::json!({"bytes": 1}),
                );
            }
            let mut outputs = serde_json::Map::new();
            for (name, contents) in &self.outputs {
                let path = request.outdir.join(name);
                fs::write(&path, contents).unwrap();
                outputs.insert(
                    path.to_string_lossy().into_owned(),
                    serde_json::json!({"bytes": contents.len()}),
                );
            }
            let manifest = serde_json::json!({"inputs": inputs, "outputs": outputs});
            fs::write(&request.metafile, manifest.to_string()).unwrap();
            Ok(BundleReport::default())
        }
    }

    struct FailingBundler;

    impl Bundler for FailingBundler {
        fn build(&self, _request: &BundleRequest) -> Result<BundleReport, BundleFailure> {
            Err(BundleFailure {
                errors: vec![BundleMessage {
                    text: "could not resolve entry".to_string(),
                    location: None,
                }],
                warnings: Vec::new(),
            })
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn options_with_entry(name: &str) -> PluginOptions {
        PluginOptions {
            entrypoints: vec![name.to_string()],
            ..PluginOptions::default()
        }
    }

    #[test]
    fn test_outputs_are_reconciled_onto_the_input_layout() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        write(&build.join("app/main.js"), "unbundled main");
        write(&build.join("app/lib/util.js"), "unbundled util");
        write(
            &build.join("index.html"),
            r#"<script src="app/main.js"></script>"#,
        );

        let bundler = FakeBundler {
            inputs: vec![build.join("app/main.js"), build.join("app/lib/util.js")],
            outputs: vec![
                ("main.js", "bundled main"),
                ("chunk-ABC123.js", "shared chunk"),
            ],
        };

        let mut host = HostConfig {
            minify: true,
            out: build.clone(),
            ..HostConfig::default()
        };
        optimize(
            &bundler,
            &options_with_entry("main"),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap();

        // The bundled entry lands where its input used to live.
        assert_eq!(
            fs::read_to_string(build.join("app/main.js")).unwrap(),
            "bundled main"
        );
        // Nothing correlates with the chunk, so it drops flat into the root.
        assert_eq!(
            fs::read_to_string(build.join("chunk-ABC123.js")).unwrap(),
            "shared chunk"
        );
        // The consumed input with no matching output is gone, along with the
        // directory its deletion emptied.
        assert!(!build.join("app/lib").exists());
        assert!(build.join("index.html").exists());
        // Minification happened inside the bundler; later stages must skip it.
        assert!(!host.minify);
    }

    #[test]
    fn test_transient_host_artifacts_are_removed() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        write(&build.join("main.js"), "code");
        write(&build.join("web_modules/import-map.json"), "{}");
        write(&build.join("meta/env.js"), "export default {};");

        let bundler = FakeBundler {
            inputs: vec![build.join("main.js")],
            outputs: vec![("main.js", "bundled")],
        };
        let mut host = HostConfig {
            out: build.clone(),
            ..HostConfig::default()
        };
        optimize(
            &bundler,
            &options_with_entry("main"),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap();

        assert!(!build.join("web_modules").exists());
        assert!(!build.join("meta").exists());
        assert_eq!(fs::read_to_string(build.join("main.js")).unwrap(), "bundled");
    }

    #[test]
    fn test_one_failed_move_does_not_abort_the_rest() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        write(&build.join("ok.js"), "old ok");
        // A plain file where a destination directory would have to go.
        write(&build.join("blocked"), "in the way");

        let bundler = FakeBundler {
            inputs: vec![build.join("ok.js"), build.join("blocked/main.js")],
            outputs: vec![("main.js", "unplaceable"), ("ok.js", "new ok")],
        };
        let mut host = HostConfig {
            out: build.clone(),
            ..HostConfig::default()
        };
        optimize(
            &bundler,
            &options_with_entry("ok"),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap();

        // The blocked move was logged and skipped; the other one landed.
        assert_eq!(fs::read_to_string(build.join("ok.js")).unwrap(), "new ok");
        assert_eq!(
            fs::read_to_string(build.join("blocked")).unwrap(),
            "in the way"
        );
    }

    #[test]
    fn test_bundler_failure_leaves_the_build_tree_alone() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        write(&build.join("app/main.js"), "unbundled main");

        let mut host = HostConfig {
            minify: true,
            out: build.clone(),
            ..HostConfig::default()
        };
        let err = optimize(
            &FailingBundler,
            &options_with_entry("main"),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Bundle { errors: 1 }));
        assert_eq!(
            fs::read_to_string(build.join("app/main.js")).unwrap(),
            "unbundled main"
        );
        // The flag is only reset once bundling actually minified something.
        assert!(host.minify);
    }

    #[test]
    fn test_bundling_disabled_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        write(&build.join("main.js"), "code");

        let mut host = HostConfig {
            bundle: false,
            out: build.clone(),
            ..HostConfig::default()
        };
        optimize(
            &FailingBundler,
            &options_with_entry("main"),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap();
        assert_eq!(fs::read_to_string(build.join("main.js")).unwrap(), "code");
    }

    #[test]
    fn test_missing_entrypoints_abort_before_bundling() {
        let root = tempfile::tempdir().unwrap();
        let build = root.path().join("build");
        fs::create_dir_all(&build).unwrap();

        let mut host = HostConfig {
            out: build.clone(),
            ..HostConfig::default()
        };
        let err = optimize(
            &FailingBundler,
            &PluginOptions::default(),
            &mut host,
            &build,
            &Trace::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
