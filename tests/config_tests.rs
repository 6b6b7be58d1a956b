//! Configuration loading tests

use keygate::config::{FileFormat, load_config, load_config_from_str};

const MINIMAL_CONFIG: &str = r#"
name = "test-server"
anon-access = "no-access"
"#;

const FULL_CONFIG: &str = r#"
name = "keygate-test"
host = "127.0.0.1"
port = 2222
anon-access = "read-write"
allow-keyless = false

[[users]]
name = "ops"
admin = true
keys = [
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEB ops@laptop",
]

[[users]]
name = "dev"
keys = ["ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgIC"]
collab-repos = ["infra", "tools"]

[[repos]]
name = "infra"
private = true
note = "Infrastructure"

[[repos]]
name = "tools"
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG, FileFormat::Toml).unwrap();

    assert_eq!(config.name, "test-server");
    assert_eq!(config.anon_access, "no-access");
    // Defaults
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 23231);
    assert!(config.allow_keyless);
    assert!(config.users.is_empty());
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG, FileFormat::Toml).unwrap();

    assert_eq!(config.name, "keygate-test");
    assert_eq!(config.listen_addr(), "127.0.0.1:2222");
    assert_eq!(config.anon_access, "read-write");
    assert!(!config.allow_keyless);

    assert_eq!(config.users.len(), 2);
    assert_eq!(config.users[0].name.as_deref(), Some("ops"));
    assert!(config.users[0].admin);
    assert_eq!(config.users[1].collab_repos, vec!["infra", "tools"]);

    assert_eq!(config.repos.len(), 2);
    assert!(config.repos[0].private);
    assert_eq!(config.repos[0].note.as_deref(), Some("Infrastructure"));
    assert!(!config.repos[1].private);
}

#[test]
fn test_malformed_key_is_not_a_load_error() {
    let config_str = r#"
[[users]]
keys = ["definitely not a key"]
"#;

    let config = load_config_from_str(config_str, FileFormat::Toml).unwrap();
    assert_eq!(config.users[0].keys, vec!["definitely not a key"]);
}

#[test]
fn test_duplicate_user_names_rejected() {
    let config_str = r#"
[[users]]
name = "dev"

[[users]]
name = "dev"
"#;

    assert!(load_config_from_str(config_str, FileFormat::Toml).is_err());
}

#[test]
fn test_invalid_toml() {
    assert!(load_config_from_str("name = ", FileFormat::Toml).is_err());
}

#[test]
fn test_missing_explicit_file() {
    let result = load_config(Some("/nonexistent/keygate.toml"));
    assert!(result.is_err());
}

#[test]
#[serial_test::serial]
fn test_load_yaml_file() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("keygate.yaml");
    fs::write(
        &config_path,
        r#"
name: from-yaml
anon-access: read-write
repos:
  - name: infra
    private: true
"#,
    )
    .unwrap();

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.name, "from-yaml");
    assert_eq!(config.anon_access, "read-write");
    assert!(config.repos[0].private);
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test-config.toml");
    fs::write(
        &config_path,
        r#"
anon-access = "read-only"
port = 2222
"#,
    )
    .unwrap();

    unsafe {
        env::set_var("KEYGATE__ANON_ACCESS", "no-access");
        env::set_var("KEYGATE__ALLOW_KEYLESS", "false");
        env::set_var("KEYGATE__PORT", "2022");
    }

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();

    assert_eq!(config.anon_access, "no-access");
    assert!(!config.allow_keyless);
    assert_eq!(config.port, 2022);

    unsafe {
        env::remove_var("KEYGATE__ANON_ACCESS");
        env::remove_var("KEYGATE__ALLOW_KEYLESS");
        env::remove_var("KEYGATE__PORT");
    }
}

#[test]
#[serial_test::serial]
fn test_keys_dir_users_appended() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let keys_dir = dir.path().join("keys");
    fs::create_dir(&keys_dir).unwrap();
    fs::write(
        keys_dir.join("carol"),
        concat!(
            "# carol's workstation\n",
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMD\n",
        ),
    )
    .unwrap();

    let config_path = dir.path().join("keygate.toml");
    fs::write(
        &config_path,
        format!(
            r#"
keys-dir = "{}"

[[users]]
name = "ops"
admin = true
"#,
            keys_dir.display()
        ),
    )
    .unwrap();

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    let names: Vec<_> = config
        .users
        .iter()
        .filter_map(|u| u.name.as_deref())
        .collect();
    assert_eq!(names, vec!["ops", "carol"]);
    assert!(!config.users[1].admin);
    assert_eq!(config.users[1].keys.len(), 1);

    let policy = keygate::Policy::from_config(&config);
    assert!(policy.diagnostics().is_empty());
}

#[test]
#[serial_test::serial]
fn test_keys_dir_name_clash_rejected() {
    use std::fs;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let keys_dir = dir.path().join("keys");
    fs::create_dir(&keys_dir).unwrap();
    fs::write(keys_dir.join("ops"), "ssh-ed25519 AAAA").unwrap();

    let config_path = dir.path().join("keygate.toml");
    fs::write(
        &config_path,
        format!(
            r#"
keys-dir = "{}"

[[users]]
name = "ops"
"#,
            keys_dir.display()
        ),
    )
    .unwrap();

    assert!(load_config(Some(config_path.to_str().unwrap())).is_err());
}
