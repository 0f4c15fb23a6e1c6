/// Common test utilities and helpers for ghmirror tests
use std::path::{Path, PathBuf};
use std::process::Command;

use ghmirror::Config;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run git and fail the test if it does not succeed
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=ghmirror", "-c", "user.email=ghmirror@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Local bare repositories standing in for the hosted remotes, plus an empty
/// backup root
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub remotes: PathBuf,
    pub backup_root: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let remotes = temp_dir.path().join("remotes");
        let backup_root = temp_dir.path().join("backup");
        std::fs::create_dir_all(&remotes).expect("Failed to create remotes dir");

        Self {
            temp_dir,
            remotes,
            backup_root,
        }
    }

    /// Create `<name>.git` with one commit and return its clone URL
    pub fn create_remote(&self, name: &str) -> String {
        let work = self.work_dir(name);
        std::fs::create_dir_all(&work).expect("Failed to create work dir");
        git(&work, &["init", "-q"]);
        git(&work, &["commit", "-q", "--allow-empty", "-m", "initial"]);

        let bare = self.remotes.join(format!("{}.git", name));
        git(
            &self.remotes,
            &["clone", "-q", "--bare", work.to_str().unwrap(), bare.to_str().unwrap()],
        );
        bare.to_string_lossy().into_owned()
    }

    /// Add a commit to the remote `<name>.git` and return the new HEAD
    pub fn push_commit(&self, name: &str, message: &str) -> String {
        let work = self.work_dir(name);
        let bare = self.remotes.join(format!("{}.git", name));
        git(&work, &["commit", "-q", "--allow-empty", "-m", message]);
        git(&work, &["push", "-q", bare.to_str().unwrap(), "HEAD"]);
        git(&work, &["rev-parse", "HEAD"])
    }

    pub fn config(&self, server: &MockServer) -> Config {
        Config {
            backup_path: self.backup_root.to_string_lossy().into_owned(),
            username: Some("octocat".to_string()),
            secret: Some("token".to_string()),
            api_base: server.uri(),
            ..Default::default()
        }
    }

    /// Sorted names of the entries directly under `<backup_root>/<name>`
    pub fn entry_children(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.backup_root.join(name))
            .expect("Mirror entry missing")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn work_dir(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("work").join(name)
    }
}

/// Repository listing entry pointing at a local clone URL
pub fn descriptor(
    server: &MockServer,
    name: &str,
    clone_url: &str,
    has_wiki: bool,
    has_issues: bool,
) -> serde_json::Value {
    serde_json::json!({
        "id": 1296269,
        "name": name,
        "private": false,
        "html_url": format!("https://github.com/octocat/{}", name),
        "url": format!("{}/repos/octocat/{}", server.uri(), name),
        "clone_url": clone_url,
        "has_wiki": has_wiki,
        "has_issues": has_issues,
        "has_projects": true,
        "has_downloads": true,
        "has_pages": false
    })
}

pub async fn mount_listing(server: &MockServer, repos: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Array(repos)))
        .mount(server)
        .await;
}

pub async fn mount_issues(server: &MockServer, name: &str, payload: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/octocat/{}/issues", name)))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(payload.as_bytes().to_vec(), "application/json"),
        )
        .mount(server)
        .await;
}
