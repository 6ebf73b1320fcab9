use std::sync::Mutex;

use tempfile::NamedTempFile;

use photoseal::config::StoreConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in ["PHOTOSEAL_CONFIG", "PHOTOSEAL_STORE_DIR"] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = StoreConfig::load().expect("load config");
    assert_eq!(cfg.store_dir, std::path::PathBuf::from("photoseal_store"));
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "store_dir": "/var/lib/photoseal" }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PHOTOSEAL_CONFIG", file.path());
    let cfg = StoreConfig::load().expect("load config");
    assert_eq!(cfg.store_dir, std::path::PathBuf::from("/var/lib/photoseal"));

    std::env::set_var("PHOTOSEAL_STORE_DIR", "/tmp/override");
    let cfg = StoreConfig::load().expect("load config");
    assert_eq!(cfg.store_dir, std::path::PathBuf::from("/tmp/override"));

    clear_env();
}

#[test]
fn rejects_unreadable_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PHOTOSEAL_CONFIG", "/nonexistent/photoseal.json");
    let result = StoreConfig::load();
    assert!(result.is_err());

    clear_env();
}
