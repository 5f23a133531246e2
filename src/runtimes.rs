//! # Runtime Detection
//!
//! Classifies which language ecosystems a repository uses by looking for
//! well-known marker files at its top level, and extracts a pinned version
//! where one can be found.
//!
//! Detection never fails. Each ecosystem is evaluated independently, in a
//! fixed order (python, node, go, rust), and every version lookup is best
//! effort: a file that cannot be read or parsed simply leaves the version
//! empty.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::process;

/// A language ecosystem detected in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
    /// Ecosystem tag: `python`, `node`, `go` or `rust`.
    pub language: String,
    /// Pinned version, empty when none could be determined.
    pub version: String,
    /// Marker files that were found, directories with a trailing `/`.
    pub files: Vec<String>,
}

/// Detect every ecosystem present in `repo`.
pub fn detect(repo: &Path) -> Vec<RuntimeInfo> {
    [detect_python, detect_node, detect_go, detect_rust]
        .iter()
        .filter_map(|detector| detector(repo))
        .collect()
}

/// Render runtimes as `lang:version, lang` for one-line listings.
pub fn summarize(runtimes: &[RuntimeInfo]) -> String {
    if runtimes.is_empty() {
        return "-".to_string();
    }
    runtimes
        .iter()
        .map(|rt| {
            if rt.version.is_empty() {
                rt.language.clone()
            } else {
                format!("{}:{}", rt.language, rt.version)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn present(repo: &Path, markers: &[&str]) -> Vec<String> {
    markers
        .iter()
        .filter(|m| repo.join(m).exists())
        .map(|m| m.to_string())
        .collect()
}

fn read_trimmed(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn runtime(language: &str, version: Option<String>, files: Vec<String>) -> Option<RuntimeInfo> {
    if files.is_empty() {
        return None;
    }
    Some(RuntimeInfo {
        language: language.to_string(),
        version: version.unwrap_or_default(),
        files,
    })
}

fn detect_python(repo: &Path) -> Option<RuntimeInfo> {
    let mut files = present(
        repo,
        &[
            "requirements.txt",
            "pyproject.toml",
            "setup.py",
            "Pipfile",
            ".python-version",
        ],
    );
    let venvs: Vec<&str> = [".venv", "venv"]
        .into_iter()
        .filter(|v| repo.join(v).is_dir())
        .collect();
    files.extend(venvs.iter().map(|v| format!("{v}/")));

    let version = read_trimmed(&repo.join(".python-version"))
        .or_else(|| pyproject_python(&repo.join("pyproject.toml")))
        .or_else(|| venv_python(repo, &venvs));

    runtime("python", version, files)
}

/// `requires-python` (PEP 621) or a Poetry `python = "..."` dependency.
fn pyproject_python(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;

    if let Ok(doc) = text.parse::<toml::Table>() {
        let pep621 = doc
            .get("project")
            .and_then(|p| p.get("requires-python"))
            .and_then(|v| v.as_str());
        let poetry = doc
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.get("python"))
            .and_then(|v| v.as_str());
        if let Some(version) = pep621.or(poetry) {
            return Some(version.to_string());
        }
    }

    // Not valid TOML, or an unusual layout: fall back to a plain text match.
    static PYTHON_PIN: OnceLock<Regex> = OnceLock::new();
    let re = PYTHON_PIN.get_or_init(|| Regex::new(r#"python\s*=\s*"([^"]+)""#).unwrap());
    re.captures(&text).map(|c| c[1].to_string())
}

/// Ask the interpreter inside the first virtualenv for its version.
fn venv_python(repo: &Path, venvs: &[&str]) -> Option<String> {
    let interpreter = venvs
        .iter()
        .map(|v| repo.join(v).join("bin").join("python"))
        .find(|p| p.exists())?;
    let output = process::capture(&interpreter.to_string_lossy(), ["--version"], None, None).ok()?;
    output.split_whitespace().nth(1).map(str::to_string)
}

fn detect_node(repo: &Path) -> Option<RuntimeInfo> {
    let files = present(
        repo,
        &[
            "package.json",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            ".nvmrc",
            ".node-version",
        ],
    );

    let version = read_trimmed(&repo.join(".nvmrc"))
        .or_else(|| read_trimmed(&repo.join(".node-version")))
        .or_else(|| package_json_engine(&repo.join("package.json")));

    runtime("node", version, files)
}

fn package_json_engine(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let doc: serde_json::Value = serde_json::from_str(&text).ok()?;
    doc.get("engines")?
        .get("node")?
        .as_str()
        .map(str::to_string)
}

fn detect_go(repo: &Path) -> Option<RuntimeInfo> {
    let files = present(repo, &["go.mod", "go.sum"]);

    static GO_DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    let re = GO_DIRECTIVE.get_or_init(|| Regex::new(r"(?m)^go\s+(\d+\.\d+(?:\.\d+)?)").unwrap());
    let version = fs::read_to_string(repo.join("go.mod"))
        .ok()
        .and_then(|text| re.captures(&text).map(|c| c[1].to_string()));

    runtime("go", version, files)
}

fn detect_rust(repo: &Path) -> Option<RuntimeInfo> {
    let files = present(
        repo,
        &[
            "Cargo.toml",
            "rust-toolchain.toml",
            "rust-toolchain",
            "Cargo.lock",
        ],
    );

    let version = toolchain_channel(&repo.join("rust-toolchain.toml"))
        .or_else(|| legacy_toolchain(&repo.join("rust-toolchain")))
        .or_else(|| cargo_rust_version(&repo.join("Cargo.toml")));

    runtime("rust", version, files)
}

fn toolchain_channel(path: &Path) -> Option<String> {
    let doc: toml::Table = fs::read_to_string(path).ok()?.parse().ok()?;
    doc.get("toolchain")?
        .get("channel")?
        .as_str()
        .map(str::to_string)
}

/// The legacy `rust-toolchain` file is either a bare channel name or TOML.
fn legacy_toolchain(path: &Path) -> Option<String> {
    let text = read_trimmed(path)?;
    if text.contains('=') {
        toolchain_channel(path)
    } else {
        Some(text)
    }
}

fn cargo_rust_version(path: &Path) -> Option<String> {
    let doc: toml::Table = fs::read_to_string(path).ok()?.parse().ok()?;
    doc.get("package")?
        .get("rust-version")?
        .as_str()
        .map(str::to_string)
}
