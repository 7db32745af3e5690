use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn schemasync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("schemasync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let models_dir = root.join("models");
    fs::create_dir_all(&models_dir).unwrap();
    fs::write(
        models_dir.join("user.py"),
        r#"from typing import Optional

class UserProfile(Model):
    bio: Optional[str] = StringAttribute(size=500)
    age: int = IntegerAttribute(min=0, max=150, required=True)
"#,
    )
    .unwrap();
    fs::write(
        models_dir.join("post.py"),
        r#"class Post(Model):
    title: str = StringAttribute(size=120, required=True)
    published_at: datetime = DatetimeAttribute(default="Now")
"#,
    )
    .unwrap();
    fs::write(models_dir.join("broken.py"), "class Broken(\n").unwrap();

    let config_path = config_dir.join("schemasync.toml");
    fs::write(
        &config_path,
        r#"[scan]
include_globs = ["**/*.py"]
exclude_globs = []
"#,
    )
    .unwrap();

    (tmp, config_path)
}

fn run_schemasync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = schemasync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("API_ENDPOINT")
        .env_remove("PROJECT_ID")
        .env_remove("DATABASE_ID")
        .env_remove("API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run schemasync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_scan_summary() {
    let (tmp, config) = setup_test_env();
    let models = tmp.path().join("models");
    let (stdout, stderr, success) =
        run_schemasync(&config, &["scan", models.to_str().unwrap()]);
    assert!(success, "scan failed: {}", stderr);
    assert!(stdout.contains("files scanned: 3"));
    assert!(stdout.contains("classes found: 2"));
    assert!(stdout.contains("attributes found: 4"));
    assert!(stdout.contains("files skipped: 1"));
    assert!(stdout.contains("age: integer [required, min=0, max=150]"));
    assert!(stdout.trim_end().ends_with("ok"));
    assert!(stderr.contains("broken.py"));
}

#[test]
fn test_scan_json() {
    let (tmp, config) = setup_test_env();
    let models = tmp.path().join("models");
    let (stdout, stderr, success) =
        run_schemasync(&config, &["scan", models.to_str().unwrap(), "--json"]);
    assert!(success, "scan --json failed: {}", stderr);

    let classes: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let classes = classes.as_array().unwrap();
    assert_eq!(classes.len(), 2);
    // post.py sorts before user.py
    assert_eq!(classes[0]["name"], "Post");
    assert_eq!(classes[0]["attributes"][1]["key"], "publishedAt");
    assert_eq!(classes[0]["attributes"][1]["default"], "now");
    assert_eq!(classes[1]["name"], "UserProfile");
    assert_eq!(classes[1]["attributes"][0]["optional"], true);
    assert_eq!(classes[1]["attributes"][0]["constraints"]["size"], 500);
}

#[test]
fn test_plan_against_snapshot_file() {
    let (tmp, config) = setup_test_env();
    let snapshot = tmp.path().join("snapshot.json");
    fs::write(
        &snapshot,
        r#"{
  "total": 1,
  "collections": [
    {
      "$id": "profiles",
      "name": "UserProfile",
      "attributes": [
        {"key": "bio", "type": "string", "size": 255, "required": false, "array": false}
      ]
    }
  ]
}"#,
    )
    .unwrap();
    let models = tmp.path().join("models");

    let (stdout, stderr, success) = run_schemasync(
        &config,
        &[
            "plan",
            models.to_str().unwrap(),
            "--update",
            "--snapshot",
            snapshot.to_str().unwrap(),
        ],
    );
    assert!(success, "plan failed: {}", stderr);
    assert!(stdout.contains("(update)"));
    assert!(stdout.contains("+ create collection Post"));
    assert!(stdout.contains("~ update attribute UserProfile.bio (string)"));
    assert!(stdout.contains("+ create attribute UserProfile.age (integer)"));
    assert!(stdout.contains("collections to create: 1"));
    assert!(stdout.contains("attributes to update: 1"));

    let (stdout, _, success) = run_schemasync(
        &config,
        &[
            "plan",
            models.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ],
    );
    assert!(success);
    assert!(stdout.contains("(create-only)"));
    assert!(stdout.contains("- skip UserProfile: collection already exists"));
    assert!(stdout.contains("attributes to update: 0"));
}

#[test]
fn test_create_requires_store_settings() {
    let (tmp, config) = setup_test_env();
    let models = tmp.path().join("models");
    let (_, stderr, success) = run_schemasync(&config, &["create", models.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("missing store settings"));
    assert!(stderr.contains("API_KEY"));
}

#[test]
fn test_missing_root_fails() {
    let (tmp, config) = setup_test_env();
    let missing = tmp.path().join("nope");
    let (_, stderr, success) = run_schemasync(&config, &["scan", missing.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("cannot read scan root"));
}

#[test]
fn test_invalid_glob_is_a_config_error() {
    let (tmp, config) = setup_test_env();
    fs::write(&config, "[scan]\ninclude_globs = [\"**/*.{py\"]\n").unwrap();
    let models = tmp.path().join("models");
    let (_, stderr, success) = run_schemasync(&config, &["scan", models.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("invalid glob in scan.include_globs"));
    assert!(!stderr.contains("cannot read scan root"));
}

#[test]
fn test_missing_config_file_is_allowed() {
    let (tmp, _) = setup_test_env();
    let models = tmp.path().join("models");
    let (stdout, stderr, success) = run_schemasync(
        &tmp.path().join("absent.toml"),
        &["scan", models.join("user.py").to_str().unwrap()],
    );
    assert!(success, "scan failed: {}", stderr);
    assert!(stdout.contains("classes found: 1"));
}
