//! Command line behaviour that needs no network access

use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use tempfile::TempDir;

use trovebox_archiver::api::{Album, ArchiveManifest};
use trovebox_archiver::mock::mock_photos;

fn cargo_bin() -> Command {
    Command::cargo_bin("trovebox-archiver").expect("Failed to find trovebox-archiver binary")
}

const VALID_CONFIG: &str = r#"
consumerKey: ck
consumerSecret: cs
token: tok
tokenSecret: ts
host: photos.example.com
"#;

#[test]
fn test_config_generation() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("default.yml");

    cargo_bin()
        .arg("init")
        .current_dir(temp_dir.path())
        .assert()
        .success();

    assert!(config_path.exists(), "Config file should be created");

    let content = fs::read_to_string(&config_path)?;
    for key in ["consumerKey", "consumerSecret", "token", "tokenSecret", "host"] {
        assert!(content.contains(key), "Config should contain {key}");
    }

    Ok(())
}

#[test]
fn test_init_command_with_force() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("default.yml");

    let initial_content = "host: mine";
    fs::write(&config_path, initial_content)?;

    cargo_bin()
        .arg("init")
        .current_dir(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Config file already exists"));

    assert_eq!(fs::read_to_string(&config_path)?, initial_content);

    cargo_bin()
        .arg("init")
        .arg("--force")
        .current_dir(temp_dir.path())
        .assert()
        .success();

    let new_content = fs::read_to_string(&config_path)?;
    assert_ne!(new_content, initial_content);
    assert!(new_content.contains("consumerKey"));

    Ok(())
}

#[test]
fn test_missing_config_error() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let nonexistent_path = temp_dir.path().join("does_not_exist.yml");

    cargo_bin()
        .arg("archive")
        .arg("--config")
        .arg(&nonexistent_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));

    Ok(())
}

#[test]
fn test_incomplete_credentials_error() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("default.yml");
    fs::write(
        &config_path,
        "consumerKey: ck\nconsumerSecret: cs\ntoken: tok\ntokenSecret: ''\nhost: photos.example.com\n",
    )?;

    cargo_bin()
        .arg("archive")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tokenSecret"));

    Ok(())
}

#[test]
fn test_status_lists_archived_albums() -> Result<(), Box<dyn Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("default.yml");
    fs::write(&config_path, VALID_CONFIG)?;

    let out_dir = temp_dir.path().join("archive");
    let album_dir = out_dir.join("Trip");
    fs::create_dir_all(&album_dir)?;
    let manifest = ArchiveManifest::new(Album::new("a1", "Trip", 3), mock_photos("p", 2));
    fs::write(album_dir.join("album.json"), manifest.to_pretty_json()?)?;
    fs::create_dir_all(out_dir.join("Halfway"))?;

    cargo_bin()
        .arg("status")
        .arg("--config")
        .arg(&config_path)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Archived albums: 1 (2 photos)"))
        .stdout(predicate::str::contains("Trip - 2 photos (server reported 3)"))
        .stdout(predicate::str::contains("Halfway"));

    Ok(())
}
