use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rabbitlock_engine::config::{DOCUMENT_ENV, SEED_ENV, WORKERS_ENV};
use rabbitlock_engine::{EncryptOptions, LoaderConfig, RabbitlockError};
use serde_json::json;
use tempfile::tempdir;

const SEED: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn write_sealed(path: &Path) {
    let plaintext = json!({
        "db": {"password": "secret123", "replicas": ["r0", "r1"]},
        "debug": true,
        "timeout": 30,
        "motd": null
    });
    let sealed = rabbitlock_engine::encrypt(
        SEED,
        plaintext.to_string().as_bytes(),
        &EncryptOptions::default(),
    )
    .expect("encrypt");
    fs::write(path, sealed).expect("write sealed document");
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn load_env_flattens_document() {
    let temp_dir = tempdir().expect("create temp dir");
    let path = temp_dir.path().join("env.sops.json");
    write_sealed(&path);

    let env = LoaderConfig::new(SEED, &path).load_env().expect("load env");
    assert_eq!(
        env,
        pairs(&[
            ("DB_PASSWORD", "secret123"),
            ("DB_REPLICAS_0", "r0"),
            ("DB_REPLICAS_1", "r1"),
            ("DEBUG", "true"),
            ("TIMEOUT", "30"),
            ("MOTD", ""),
        ])
    );
}

#[test]
fn config_from_environment_lookup() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("secrets.json");
    write_sealed(&path);

    let vars: HashMap<&str, String> = [
        (SEED_ENV, SEED.to_owned()),
        (DOCUMENT_ENV, path.display().to_string()),
        (WORKERS_ENV, "2".to_owned()),
    ]
    .into_iter()
    .collect();

    let config = LoaderConfig::from_lookup(|name| vars.get(name).cloned())?;
    assert_eq!(config.document_path(), path.as_path());
    assert_eq!(config.options().workers, Some(2));

    let doc = config.load()?;
    assert_eq!(
        doc.get("db")
            .and_then(|db| db.get("password"))
            .and_then(|p| p.as_str()),
        Some("secret123")
    );
    Ok(())
}

#[test]
fn wrong_seed_in_config_fails() {
    let temp_dir = tempdir().expect("create temp dir");
    let path = temp_dir.path().join("env.sops.json");
    write_sealed(&path);

    let other = "ff".repeat(32);
    let err = LoaderConfig::new(other, &path).load_env().expect_err("wrong seed");
    assert!(matches!(err, RabbitlockError::IntegrityViolation { .. }));
}

#[test]
fn missing_document_is_an_io_error() {
    let temp_dir = tempdir().expect("create temp dir");
    let err = LoaderConfig::new(SEED, temp_dir.path().join("absent.json"))
        .load()
        .expect_err("missing document");
    assert!(matches!(err, RabbitlockError::Io(_)));
}
