//! Integration tests for bundle-cache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Isolated workspace: a missing config file and a private cache root
    struct Workspace {
        temp: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir_all(temp.path().join("build")).unwrap();
            std::fs::write(temp.path().join("build/Main.class"), b"main bytecode").unwrap();
            std::fs::write(temp.path().join("build/app.conf"), b"key = value").unwrap();
            Self { temp }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn root(&self) -> PathBuf {
            self.path("cache")
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("bundle-cache");
            cmd.env_remove("BUNDLE_CACHE_CONFIG")
                .arg("--config")
                .arg(self.path("config.toml"))
                .arg("--root")
                .arg(self.root());
            cmd
        }

        fn produce(&self, target: &str) -> Command {
            let mut cmd = self.cmd();
            cmd.arg("produce")
                .arg("--target")
                .arg(self.path(target))
                .arg("--class")
                .arg(format!(
                    "app/Main.class={}",
                    self.path("build/Main.class").display()
                ))
                .arg("--resource")
                .arg(self.path("build/app.conf"));
            cmd
        }
    }

    fn children(dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("bundle-cache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("bundle-cache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bundle-cache"));
    }

    #[test]
    fn config_path() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("max_entries = 1000"));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let ws = Workspace::new();
        ws.cmd().args(["config", "init"]).assert().success();
        assert!(ws.path("config.toml").exists());

        ws.cmd()
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        ws.cmd().args(["config", "init", "--force"]).assert().success();
    }

    #[test]
    fn invalid_config_fails() {
        let ws = Workspace::new();
        std::fs::write(ws.path("config.toml"), "[cache]\ncleanup_secs = 0\n").unwrap();

        ws.cmd()
            .args(["sessions"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn produce_writes_bundle_and_closes_session() {
        let ws = Workspace::new();
        ws.produce("out.tar")
            .assert()
            .success()
            .stdout(predicate::str::contains("Bundle written"));

        let bundle = std::fs::read(ws.path("out.tar")).unwrap();
        assert!(!bundle.is_empty());

        // One session holding one entry, marker removed on exit
        let sessions = children(&ws.root());
        assert_eq!(sessions.len(), 1);
        let entries = children(&sessions[0]);
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(&entries[0]).unwrap(), bundle);
    }

    #[test]
    fn produce_is_reproducible_across_sessions() {
        let ws = Workspace::new();
        ws.produce("a.tar").assert().success();
        ws.produce("b.tar").assert().success();

        assert_eq!(
            std::fs::read(ws.path("a.tar")).unwrap(),
            std::fs::read(ws.path("b.tar")).unwrap()
        );
    }

    #[test]
    fn produce_without_cache_leaves_root_alone() {
        let ws = Workspace::new();
        ws.produce("out.tar")
            .arg("--no-cache")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache disabled"));

        assert!(ws.path("out.tar").exists());
        assert!(!ws.root().exists());
    }

    #[test]
    fn produce_missing_class_fails() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["produce", "--target"])
            .arg(ws.path("out.tar"))
            .arg("--class")
            .arg(format!("Gone.class={}", ws.path("build/Gone.class").display()))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));

        assert!(!ws.path("out.tar").exists());
    }

    #[test]
    fn sessions_empty_root() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["sessions", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn finished_session_is_listed_as_orphaned() {
        let ws = Workspace::new();
        ws.produce("out.tar").assert().success();

        ws.cmd()
            .args(["sessions", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"orphaned\""))
            .stdout(predicate::str::contains("\"entries\": 1"));
    }

    #[test]
    fn gc_dry_run_keeps_sessions() {
        let ws = Workspace::new();
        ws.produce("out.tar").assert().success();

        ws.cmd()
            .args(["gc", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("orphaned"));

        assert_eq!(children(&ws.root()).len(), 1);
    }

    #[test]
    fn gc_removes_dead_sessions() {
        let ws = Workspace::new();
        for id in ["crashed-a", "crashed-b"] {
            let dir = ws.root().join(id);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("0123abcd"), b"bundle").unwrap();
        }

        ws.cmd()
            .arg("gc")
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 2 session(s)"));

        assert!(children(&ws.root()).is_empty());
    }

    #[test]
    fn gc_without_root() {
        let ws = Workspace::new();
        ws.cmd()
            .arg("gc")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache root"));
    }
}
