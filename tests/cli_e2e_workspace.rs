//! End-to-end tests for the `workspace info` and `version` commands.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_workspace_info() {
    let fixture = TestFixture::new().initialized();

    fixture
        .command()
        .args(["workspace", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workspace Information:"))
        .stdout(predicate::str::contains("Name: test-ws"))
        .stdout(predicate::str::contains("Device:   laptop"))
        .stdout(predicate::str::contains(format!("Serial:   {}", SERIAL)))
        .stdout(predicate::str::contains("Sync Configuration:"))
        .stdout(predicate::str::contains("vscode: .vscode/"))
        .stdout(predicate::str::contains("Repositories in manifest: 0"))
        .stdout(predicate::str::contains("Registered Devices: 1"))
        .stdout(predicate::str::contains("- laptop (current)"));
}

#[test]
fn test_workspace_info_from_subdirectory() {
    let fixture = TestFixture::new().initialized();
    std::fs::create_dir_all(fixture.path().join("deep/inside")).unwrap();

    fixture
        .command()
        .current_dir(fixture.path().join("deep/inside"))
        .args(["workspace", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: test-ws"));
}

#[test]
fn test_workspace_info_with_explicit_root() {
    let fixture = TestFixture::new().initialized();
    let elsewhere = TempDir::new().unwrap();

    fixture
        .command()
        .current_dir(elsewhere.path())
        .args(["workspace", "info", "--workspace"])
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: test-ws"));
}

#[test]
fn test_workspace_root_from_environment() {
    let fixture = TestFixture::new().initialized();
    let elsewhere = TempDir::new().unwrap();

    fixture
        .command()
        .current_dir(elsewhere.path())
        .env("METAREPO_WORKSPACE", fixture.path())
        .args(["workspace", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: test-ws"));
}

#[test]
fn test_workspace_info_warns_on_invalid_exclude() {
    let fixture = TestFixture::new().initialized();
    let mut config: serde_yaml::Value =
        serde_yaml::from_str(&fixture.read_metarepo_file("config.yaml")).unwrap();
    config["repos"] = serde_yaml::from_str("exclude: ['temp-[']").unwrap();
    let config = serde_yaml::to_string(&config).unwrap();
    std::fs::write(fixture.metarepo_file("config.yaml"), config).unwrap();

    fixture
        .command()
        .args(["workspace", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Excluded: temp-["))
        .stderr(predicate::str::contains("not a valid glob"));
}

#[test]
fn test_version_command() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("metarepo {}", env!("CARGO_PKG_VERSION"))))
        .stdout(predicate::str::contains("commit:"))
        .stdout(predicate::str::contains("built:"));
}
