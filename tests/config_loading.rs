// tests/config_loading.rs
use newsdesk_dispatch::config::{
    PipelineConfig, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH, ENV_DEDUP_THRESHOLD, ENV_PREMIUM_LIMIT,
};
use std::{env, fs};

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_DEDUP_THRESHOLD);
    env::remove_var(ENV_PREMIUM_LIMIT);
}

#[serial_test::serial]
#[test]
fn shipped_sample_matches_builtin_defaults() {
    let raw = fs::read_to_string(DEFAULT_CONFIG_PATH).unwrap();
    let cfg = PipelineConfig::from_toml_str(&raw).unwrap();
    assert_eq!(cfg, PipelineConfig::default());
}

#[test]
fn partial_file_keeps_defaults_elsewhere() {
    let cfg = PipelineConfig::from_toml_str(
        r#"
[quota]
premium_daily_limit = 30

[lanes]
item_delay_ms = 0
"#,
    )
    .unwrap();
    assert_eq!(cfg.quota.premium_daily_limit, 30);
    assert_eq!(cfg.quota.critical, 16);
    assert_eq!(cfg.lanes.item_delay_ms, 0);
    assert_eq!(cfg.lanes.call_timeout_secs, 90);
    assert_eq!(cfg.dedup.threshold, 0.55);
}

#[test]
fn unordered_thresholds_are_rejected() {
    let err = PipelineConfig::from_toml_str(
        r#"
[quota]
critical = 10
important = 14
standard = 12
"#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("ordered"));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) nothing on disk: built-in defaults
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg, PipelineConfig::default());

    // 2) fallback file under ./config/
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join(DEFAULT_CONFIG_PATH),
        "[quota]\npremium_daily_limit = 20\n",
    )
    .unwrap();
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.quota.premium_daily_limit, 20);

    // 3) env path wins over the fallback
    let custom = tmp.path().join("custom.toml");
    fs::write(&custom, "[quota]\npremium_daily_limit = 5\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &custom);
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.quota.premium_daily_limit, 5);

    // 4) env path to a missing file is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(PipelineConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_on_top_of_file() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("newsdesk.toml");
    fs::write(&p, "[dedup]\nthreshold = 0.7\n").unwrap();

    env::set_var(ENV_DEDUP_THRESHOLD, "1.8");
    env::set_var(ENV_PREMIUM_LIMIT, "3");
    let cfg = PipelineConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.dedup.threshold, 1.0);
    assert_eq!(cfg.quota.premium_daily_limit, 3);

    // malformed values are ignored
    env::set_var(ENV_DEDUP_THRESHOLD, "high");
    env::set_var(ENV_PREMIUM_LIMIT, "-2");
    let cfg = PipelineConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.dedup.threshold, 0.7);
    assert_eq!(cfg.quota.premium_daily_limit, 15);

    clear_env();
}
