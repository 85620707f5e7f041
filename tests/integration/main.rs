//! Integration tests for stepcache

use std::path::Path;

const MANIFEST: &str = "cache_manifest.json";

/// Artifact file names in a cache root, excluding the manifest
fn artifact_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = std::fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != MANIFEST)
        .collect();
    files.sort();
    files
}

mod pipeline {
    use stepcache::{CallArgs, CheckpointCache, StepCacheError, StepCacheResult};

    pub const INPUT: &str = "Initial input from user.";

    pub const EXPECTED_SUMMARY: &str = "Summary of documents: \
        Document based on: INITIAL INPUT FROM USER. - Version 0, \
        Document based on: INITIAL INPUT FROM USER. - Version 1, \
        Document based on: INITIAL INPUT FROM USER. - Version 2";

    pub const STEPS: [&str; 5] = [
        "step1_user_input",
        "step2_enhance_text",
        "step3_produce_document",
        "step4_generate_additional_documents",
        "step5_summarize_documents",
    ];

    /// Five chained steps, each consuming the previous step's output
    pub async fn run(cache: &CheckpointCache, user_text: &str) -> StepCacheResult<String> {
        let text: String = cache
            .checkpoint(STEPS[0])
            .run(CallArgs::new().arg(user_text), || async {
                Ok::<_, StepCacheError>(user_text.to_string())
            })
            .await?;

        let enhanced: String = cache
            .checkpoint(STEPS[1])
            .run(CallArgs::new().arg(&text), || async {
                Ok::<_, StepCacheError>(text.to_uppercase())
            })
            .await?;

        let document: String = cache
            .checkpoint(STEPS[2])
            .run(CallArgs::new().arg(&enhanced), || async {
                Ok::<_, StepCacheError>(format!("Document based on: {}", enhanced))
            })
            .await?;

        let documents: Vec<String> = cache
            .checkpoint(STEPS[3])
            .run(CallArgs::new().arg(&document), || async {
                Ok::<_, StepCacheError>(
                    (0..3)
                        .map(|i| format!("{} - Version {}", document, i))
                        .collect(),
                )
            })
            .await?;

        cache
            .checkpoint(STEPS[4])
            .run(CallArgs::new().arg(&documents), || async {
                Ok::<_, StepCacheError>(format!("Summary of documents: {}", documents.join(", ")))
            })
            .await
    }
}

mod library_tests {
    use super::{artifact_files, pipeline, MANIFEST};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stepcache::{checkpoint, CallArgs, Checkpoint, CheckpointCache, StepCacheError};
    use tempfile::TempDir;

    fn examine_input() -> &'static str {
        "input"
    }

    fn open_document() -> &'static str {
        "document"
    }

    fn process_details() -> &'static str {
        "details"
    }

    fn analyze_result() -> &'static str {
        "result"
    }

    #[tokio::test]
    async fn pipeline_truncate_and_rerun() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();

        let summary = pipeline::run(&cache, pipeline::INPUT).await.unwrap();
        assert_eq!(summary, pipeline::EXPECTED_SUMMARY);
        assert_eq!(artifact_files(temp.path()).len(), 5);
        assert_eq!(cache.list_checkpoints().await.unwrap(), pipeline::STEPS);

        let report = cache.truncate("step3_produce_document").await.unwrap();
        assert_eq!(report.removed, &pipeline::STEPS[2..]);
        assert_eq!(report.artifacts, 3);

        let remaining = artifact_files(temp.path());
        assert_eq!(remaining.len(), 2);
        assert!(remaining[0].starts_with("step1_user_input__"));
        assert!(remaining[1].starts_with("step2_enhance_text__"));
        assert_eq!(cache.list_checkpoints().await.unwrap(), &pipeline::STEPS[..2]);

        let summary = pipeline::run(&cache, pipeline::INPUT).await.unwrap();
        assert_eq!(summary, pipeline::EXPECTED_SUMMARY);
        assert_eq!(artifact_files(temp.path()).len(), 5);
        assert_eq!(cache.list_checkpoints().await.unwrap(), pipeline::STEPS);
    }

    #[tokio::test]
    async fn pipeline_with_different_input() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();

        let first = pipeline::run(&cache, "First input from user.").await.unwrap();
        assert_eq!(artifact_files(temp.path()).len(), 5);

        let second = pipeline::run(&cache, "Second input from user.").await.unwrap();
        assert_eq!(artifact_files(temp.path()).len(), 10);
        assert_ne!(first, second);

        // Each identity is recorded once however many argument sets it has
        assert_eq!(cache.list_checkpoints().await.unwrap(), pipeline::STEPS);
    }

    #[tokio::test]
    async fn truncate_then_rebuild_restores_order() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();

        let steps: [(Checkpoint<'_>, fn() -> &'static str); 4] = [
            (checkpoint!(cache, examine_input), examine_input),
            (checkpoint!(cache, open_document), open_document),
            (checkpoint!(cache, process_details), process_details),
            (checkpoint!(cache, analyze_result), analyze_result),
        ];
        for (step, f) in &steps {
            let _: String = step
                .run(CallArgs::new(), || async { Ok::<_, StepCacheError>(f().to_string()) })
                .await
                .unwrap();
        }

        let expected = [
            "examine_input",
            "open_document",
            "process_details",
            "analyze_result",
        ];
        assert_eq!(cache.list_checkpoints().await.unwrap(), expected);

        cache.truncate("open_document").await.unwrap();
        assert_eq!(cache.list_checkpoints().await.unwrap(), ["examine_input"]);
        let files = artifact_files(temp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("examine_input__"));

        for (step, f) in &steps[1..] {
            let _: String = step
                .run(CallArgs::new(), || async { Ok::<_, StepCacheError>(f().to_string()) })
                .await
                .unwrap();
        }
        assert_eq!(cache.list_checkpoints().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn reopened_cache_serves_hits() {
        let temp = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let cache = CheckpointCache::open(temp.path()).await.unwrap();
            let squared: i64 = cache
                .checkpoint("test_function")
                .run(CallArgs::new().arg(&3), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StepCacheError>(9)
                })
                .await
                .unwrap();
            assert_eq!(squared, 9);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifact_files(temp.path()).len(), 1);
    }

    #[tokio::test]
    async fn truncating_unknown_checkpoint_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();
        pipeline::run(&cache, pipeline::INPUT).await.unwrap();

        let report = cache.truncate("never_ran").await.unwrap();
        assert!(report.is_noop());
        assert_eq!(artifact_files(temp.path()).len(), 5);
        assert_eq!(cache.list_checkpoints().await.unwrap(), pipeline::STEPS);
    }

    #[tokio::test]
    async fn clear_keeps_foreign_files() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();
        pipeline::run(&cache, pipeline::INPUT).await.unwrap();
        std::fs::write(temp.path().join("notes.txt"), "keep me").unwrap();

        let report = cache.clear().await.unwrap();
        assert_eq!(report.artifacts, 5);
        assert_eq!(report.removed, pipeline::STEPS);

        assert_eq!(artifact_files(temp.path()), ["notes.txt"]);
        assert!(cache.list_checkpoints().await.unwrap().is_empty());
        assert!(temp.path().join(MANIFEST).exists());
    }

    #[tokio::test]
    async fn corrupt_manifest_is_recovered() {
        let temp = TempDir::new().unwrap();
        let cache = CheckpointCache::open(temp.path()).await.unwrap();
        pipeline::run(&cache, pipeline::INPUT).await.unwrap();

        std::fs::write(temp.path().join(MANIFEST), "{ truncated").unwrap();

        let mut recovered = cache.list_checkpoints().await.unwrap();
        recovered.sort();
        let mut expected = pipeline::STEPS.to_vec();
        expected.sort();
        assert_eq!(recovered, expected);

        // Hits still work and truncation still finds its tail
        let summary = pipeline::run(&cache, pipeline::INPUT).await.unwrap();
        assert_eq!(summary, pipeline::EXPECTED_SUMMARY);
        cache.clear().await.unwrap();
        assert!(artifact_files(temp.path()).is_empty());
    }
}

mod cli_tests {
    use super::{artifact_files, pipeline};
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use stepcache::CheckpointCache;
    use tempfile::TempDir;

    /// Command isolated from the user's config and environment
    fn stepcache(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("stepcache");
        cmd.current_dir(temp.path())
            .env_remove("STEPCACHE_ROOT")
            .env_remove("STEPCACHE_CONFIG")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .arg("--root")
            .arg(temp.path().join("pipeline_cache"));
        cmd
    }

    fn seed(root: &Path) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let cache = CheckpointCache::open(root).await.unwrap();
            pipeline::run(&cache, pipeline::INPUT).await.unwrap();
        });
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("checkpoint cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stepcache"));
    }

    #[test]
    fn list_missing_root() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache found"));
        assert!(!temp.path().join("pipeline_cache").exists());
    }

    #[test]
    fn list_plain_in_execution_order() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("pipeline_cache"));

        let output = stepcache(&temp)
            .args(["list", "--format", "plain"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let names: Vec<&str> = stdout.lines().collect();
        assert_eq!(names, pipeline::STEPS);
    }

    #[test]
    fn list_json() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("pipeline_cache"));

        let output = stepcache(&temp)
            .args(["list", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["name"], "step1_user_input");
        assert_eq!(rows[0]["position"], 1);
        assert_eq!(rows[4]["artifacts"], 1);
        assert!(rows[4]["bytes"].as_u64().unwrap() > 0);
    }

    #[test]
    fn truncate_requires_yes_without_terminal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pipeline_cache");
        seed(&root);

        stepcache(&temp)
            .args(["truncate", "step3_produce_document"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--yes"));
        assert_eq!(artifact_files(&root).len(), 5);
    }

    #[test]
    fn truncate_with_yes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pipeline_cache");
        seed(&root);

        stepcache(&temp)
            .args(["truncate", "step3_produce_document", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 3 checkpoint(s), 3 artifact(s)"))
            .stdout(predicate::str::contains("2 checkpoint(s) remain"));
        assert_eq!(artifact_files(&root).len(), 2);

        stepcache(&temp)
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout("step1_user_input\nstep2_enhance_text\n");
    }

    #[test]
    fn truncate_unknown_checkpoint() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pipeline_cache");
        seed(&root);

        stepcache(&temp)
            .args(["truncate", "never_ran", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not recorded"));
        assert_eq!(artifact_files(&root).len(), 5);
    }

    #[test]
    fn clear_with_yes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pipeline_cache");
        seed(&root);

        stepcache(&temp)
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache cleared"));
        assert!(artifact_files(&root).is_empty());

        stepcache(&temp)
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already empty"));
    }

    #[test]
    fn info_summarizes_root() {
        let temp = TempDir::new().unwrap();
        seed(&temp.path().join("pipeline_cache"));

        stepcache(&temp)
            .arg("info")
            .assert()
            .success()
            .stdout(predicate::str::contains("Checkpoints: 5"))
            .stdout(predicate::str::contains("Artifacts: 5"))
            .stdout(predicate::str::contains("Manifest: ok"));
    }

    #[test]
    fn root_from_config_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "[cache]\nroot = \"from_config\"\n",
        )
        .unwrap();
        seed(&temp.path().join("from_config"));

        let mut cmd = cargo_bin_cmd!("stepcache");
        cmd.current_dir(temp.path())
            .env_remove("STEPCACHE_ROOT")
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("step5_summarize_documents"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp).args(["config", "init"]).assert().success();

        let written = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
        assert!(written.contains("pipeline_cache"));

        stepcache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache\n").unwrap();

        stepcache(&temp)
            .arg("info")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn completions_generate() {
        let temp = TempDir::new().unwrap();
        stepcache(&temp)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stepcache"));
    }
}
