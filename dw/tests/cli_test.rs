//! Smoke tests for the dw binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;

fn dw(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dw").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("NO_COLOR", "1")
        .env_remove("ANTHROPIC_API_KEY");
    cmd
}

fn write_script(path: &Path) {
    let responses = vec![
        json!({
            "selectedDirectory": "docs",
            "reasoning": "conventional",
            "confidence": 0.8,
            "directoryPurpose": "guides"
        })
        .to_string(),
        json!({
            "action": "CREATE",
            "reasoning": "nothing exists yet",
            "contentOverlap": 0
        })
        .to_string(),
        json!({
            "patternId": "quickstart",
            "patternName": "Quickstart",
            "reasoning": "fast first result",
            "requiredSections": ["Prerequisites", "Procedure", "Next Steps"]
        })
        .to_string(),
        json!({
            "content": "# Widgets\n\n## Prerequisites\n\nA widget.\n\n## Procedure\n\nTurn it on.\n\n## Next Steps\n\nBuild more.\n",
            "title": "Widgets",
            "filename": "widgets"
        })
        .to_string(),
    ];
    fs::write(path, serde_yaml::to_string(&responses).unwrap()).unwrap();
}

#[test]
fn test_patterns_lists_builtin_catalog() {
    let temp = tempdir().unwrap();
    dw(temp.path())
        .arg("patterns")
        .assert()
        .success()
        .stdout(predicate::str::contains("quickstart"))
        .stdout(predicate::str::contains("troubleshooting"));
}

#[test]
fn test_analyze_prints_json() {
    let temp = tempdir().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(repo.join("docs")).unwrap();
    fs::write(repo.join("package.json"), "{}").unwrap();
    fs::write(repo.join("docs/intro.md"), "# Intro\n").unwrap();

    dw(temp.path())
        .args(["analyze", "--root"])
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"markdownFileCount\": 1"))
        .stdout(predicate::str::contains("\"projectType\": \"node\""));
}

#[test]
fn test_generate_with_simulated_oracle_writes_file() {
    let temp = tempdir().unwrap();
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    let script = temp.path().join("script.yml");
    write_script(&script);

    dw(temp.path())
        .args(["generate", "--goal", "Explain widgets", "--simulate"])
        .arg(&script)
        .arg("--root")
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed"))
        .stdout(predicate::str::contains("widgets.md"));

    let written = fs::read_to_string(repo.join("docs/widgets.md")).unwrap();
    assert!(written.contains("## Next Steps"));
}

#[test]
fn test_generate_failure_exits_nonzero() {
    let temp = tempdir().unwrap();
    let script = temp.path().join("script.yml");
    fs::write(&script, "- \"no json here\"\n").unwrap();

    dw(temp.path())
        .args(["generate", "--goal", "Explain widgets", "--format", "json", "--simulate"])
        .arg(&script)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"failed\""));

    assert!(!temp.path().join("docs").exists());
}

#[test]
fn test_generate_without_api_key_fails_fast() {
    let temp = tempdir().unwrap();
    dw(temp.path())
        .args(["generate", "--goal", "Explain widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
