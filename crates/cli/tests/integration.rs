//! Integration tests for the bfs CLI
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! # Start a MinIO container
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! # Run tests
//! TEST_S3_ENDPOINT=http://localhost:9000 \
//! TEST_S3_ACCESS_KEY=accesskey \
//! TEST_S3_SECRET_KEY=secretkey \
//! cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::process::{Command, Output};
use std::time::Duration;
use tempfile::TempDir;

/// Path to the bfs binary built for this test run
fn bfs_binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_bfs"))
}

/// Run bfs with an isolated config directory
fn run_bfs(args: &[&str], config_dir: &std::path::Path) -> Output {
    Command::new(bfs_binary())
        .args(args)
        .env("BFS_CONFIG_DIR", config_dir)
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .output()
        .expect("Failed to execute bfs command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("valid JSON output")
}

/// Wait for the S3 service to answer a bucket listing
fn wait_for_s3_ready(config_dir: &std::path::Path) -> bool {
    for _ in 0..30 {
        let output = run_bfs(&["ls", "test", "--json"], config_dir);
        if output.status.success() {
            return true;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    false
}

/// Get S3 test configuration from environment
fn get_test_config() -> Option<(String, String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let access_key = std::env::var("TEST_S3_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("TEST_S3_SECRET_KEY").ok()?;
    Some((endpoint, access_key, secret_key))
}

/// Generate unique suffix for test resources
fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

/// Test helper: set up the alias and a fresh bucket
fn setup_with_bucket(name: &str) -> Option<(TempDir, String)> {
    let (endpoint, access_key, secret_key) = get_test_config()?;
    let config_dir = tempfile::tempdir().ok()?;
    let bucket = format!("bfs-{name}-{}", uuid_suffix());

    let output = run_bfs(
        &["alias", "set", "test", &endpoint, &access_key, &secret_key],
        config_dir.path(),
    );
    if !output.status.success() {
        eprintln!(
            "Failed to set alias: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }

    if !wait_for_s3_ready(config_dir.path()) {
        eprintln!("S3 service did not become ready in time");
        return None;
    }

    let output = run_bfs(&["mkdir", &format!("test/{bucket}")], config_dir.path());
    if !output.status.success() {
        eprintln!(
            "Failed to create bucket: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }

    Some((config_dir, bucket))
}

/// Cleanup helper: delete a bucket with everything in it
fn cleanup_bucket(config_dir: &std::path::Path, bucket: &str) {
    let _ = run_bfs(&["rm", "-r", &format!("test/{bucket}")], config_dir);
}

macro_rules! require_server {
    ($setup:expr) => {
        match $setup {
            Some(v) => v,
            None => {
                eprintln!("Skipping: S3 test config not available");
                return;
            }
        }
    };
}

mod directories {
    use super::*;

    #[test]
    fn test_bucket_appears_in_root_listing() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("root"));

        let output = run_bfs(&["ls", "test", "--json"], config_dir.path());
        assert!(output.status.success());
        let names: Vec<String> = json(&output)["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&bucket));

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_folder_create_list_remove() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("folder"));

        let folder = format!("test/{bucket}/reports");
        let output = run_bfs(&["mkdir", &folder], config_dir.path());
        assert!(output.status.success());

        let output = run_bfs(&["ls", &format!("test/{bucket}"), "--json"], config_dir.path());
        let items = json(&output)["items"].clone();
        assert_eq!(items[0]["name"], "reports");
        assert_eq!(items[0]["kind"], "directory");

        let output = run_bfs(&["rm", &folder], config_dir.path());
        assert_eq!(output.status.code(), Some(2), "folders need -r");

        let output = run_bfs(&["rm", "-r", &folder], config_dir.path());
        assert!(output.status.success());

        let output = run_bfs(&["ls", &folder], config_dir.path());
        assert_eq!(output.status.code(), Some(5));

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_missing_bucket_is_not_found() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("missing"));

        let output = run_bfs(
            &["ls", &format!("test/{bucket}-does-not-exist")],
            config_dir.path(),
        );
        assert_eq!(output.status.code(), Some(5));

        cleanup_bucket(config_dir.path(), &bucket);
    }
}

mod transfers {
    use super::*;

    #[test]
    fn test_upload_stat_download() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("transfer"));
        let work = tempfile::tempdir().unwrap();
        let local = work.path().join("hello.txt");
        std::fs::write(&local, b"hello, bucket").unwrap();

        let remote = format!("test/{bucket}/docs/hello.txt");
        let output = run_bfs(
            &["cp", local.to_str().unwrap(), &format!("test/{bucket}/docs/")],
            config_dir.path(),
        );
        assert!(
            output.status.success(),
            "upload failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let output = run_bfs(&["stat", &remote, "--json"], config_dir.path());
        assert!(output.status.success());
        let stat = json(&output);
        assert_eq!(stat["size_bytes"], 13);
        assert!(stat["permissions"]["summary"].as_str().unwrap().contains("O:F"));

        let copy = work.path().join("copy.txt");
        let output = run_bfs(&["cp", &remote, copy.to_str().unwrap()], config_dir.path());
        assert!(output.status.success());
        assert_eq!(std::fs::read(&copy).unwrap(), b"hello, bucket");

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_multipart_upload() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("multipart"));
        let work = tempfile::tempdir().unwrap();
        let local = work.path().join("big.bin");
        let data: Vec<u8> = (0..12 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(&local, &data).unwrap();

        let remote = format!("test/{bucket}/big.bin");
        let output = run_bfs(&["cp", local.to_str().unwrap(), &remote], config_dir.path());
        assert!(output.status.success());

        let back = work.path().join("back.bin");
        let output = run_bfs(&["cp", &remote, back.to_str().unwrap()], config_dir.path());
        assert!(output.status.success());
        assert_eq!(std::fs::read(&back).unwrap(), data);

        cleanup_bucket(config_dir.path(), &bucket);
    }

    #[test]
    fn test_rename_within_store() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("rename"));
        let work = tempfile::tempdir().unwrap();
        let local = work.path().join("a.txt");
        std::fs::write(&local, b"a").unwrap();

        let source = format!("test/{bucket}/a.txt");
        let target = format!("test/{bucket}/b.txt");
        assert!(run_bfs(&["cp", local.to_str().unwrap(), &source], config_dir.path())
            .status
            .success());

        let output = run_bfs(&["mv", &source, &target], config_dir.path());
        assert!(output.status.success());

        let output = run_bfs(&["ls", &format!("test/{bucket}")], config_dir.path());
        let listing = stdout(&output);
        assert!(listing.contains("b.txt"));
        assert!(!listing.contains("a.txt"));

        cleanup_bucket(config_dir.path(), &bucket);
    }
}

mod permissions {
    use super::*;

    #[test]
    fn test_grant_and_revoke_public_read() {
        let (config_dir, bucket) = require_server!(setup_with_bucket("acl"));
        let work = tempfile::tempdir().unwrap();
        let local = work.path().join("public.txt");
        std::fs::write(&local, b"public").unwrap();

        let remote = format!("test/{bucket}/public.txt");
        assert!(run_bfs(&["cp", local.to_str().unwrap(), &remote], config_dir.path())
            .status
            .success());

        let output = run_bfs(
            &["acl", "set", &remote, "--grant", "E:R", "--json"],
            config_dir.path(),
        );
        if output.status.code() == Some(7) || output.status.code() == Some(4) {
            eprintln!("Skipping: server does not support object ACLs");
            cleanup_bucket(config_dir.path(), &bucket);
            return;
        }
        assert!(output.status.success());
        assert!(json(&output)["summary"].as_str().unwrap().contains("E:R"));

        let output = run_bfs(
            &["acl", "set", &remote, "--revoke", "E:R", "--json"],
            config_dir.path(),
        );
        assert!(output.status.success());
        assert!(!json(&output)["summary"].as_str().unwrap().contains("E:"));

        cleanup_bucket(config_dir.path(), &bucket);
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_unknown_alias() {
        let config_dir = tempfile::tempdir().unwrap();
        let output = run_bfs(&["ls", "nowhere/bucket"], config_dir.path());
        assert_eq!(output.status.code(), Some(5));
    }

    #[test]
    fn test_unreachable_endpoint_is_network_error() {
        let config_dir = tempfile::tempdir().unwrap();
        let output = run_bfs(
            &[
                "alias",
                "set",
                "dead",
                "http://127.0.0.1:1",
                "key",
                "secret",
                "--timeout",
                "2",
            ],
            config_dir.path(),
        );
        assert!(output.status.success());

        let output = run_bfs(&["ls", "dead"], config_dir.path());
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_cross_alias_copy_is_unsupported() {
        let config_dir = tempfile::tempdir().unwrap();
        for name in ["one", "two"] {
            let output = run_bfs(
                &["alias", "set", name, "http://127.0.0.1:1", "key", "secret"],
                config_dir.path(),
            );
            assert!(output.status.success());
        }

        let output = run_bfs(&["cp", "one/a/b.txt", "two/a/b.txt"], config_dir.path());
        assert_eq!(output.status.code(), Some(7));
    }
}
