//! Tests for the schedule loader module.

use std::fs;

use tempfile::TempDir;

use super::*;

const VALID_SCHEDULE_YAML: &str = r#"
apiVersion: v1
kind: RewardSchedule
metadata:
  id: daily-login
  name: Daily Login
  enabled: true
spec:
  cooldown: 1d
  expiration: 1d
  slots:
    - key: day-1
      payout:
        grants:
          - { type: currency, currency: gold, amount: 100 }
    - key: day-2
      payout:
        grants:
          - { type: unit_item, item: crown }
"#;

fn temp_loader() -> (TempDir, ScheduleLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let loader = ScheduleLoader::new(dir.path().to_path_buf());
    (dir, loader)
}

fn loaded_ids(results: &[LoadResult]) -> Vec<&str> {
    results
        .iter()
        .filter_map(|r| match &r.status {
            LoadStatus::Loaded { schedule_id } => Some(schedule_id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn load_schedule_from_file() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("daily-login.yml");
    fs::write(&path, VALID_SCHEDULE_YAML).unwrap();

    let doc = loader.load_file(&path).unwrap();
    assert_eq!(doc.metadata.id, "daily-login");
    assert_eq!(doc.metadata.name, "Daily Login");
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, loader) = temp_loader();

    fs::write(dir.path().join("daily.yml"), VALID_SCHEDULE_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), VALID_SCHEDULE_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not a schedule").unwrap();

    let results = loader.load_all().unwrap();

    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();
    assert_eq!(loaded_ids(&results), vec!["daily-login"]);
    assert_eq!(skipped, 2);

    let cfg = loader.get("daily-login").expect("config loaded");
    assert_eq!(cfg.cooldown_seconds(), 86_400);
    assert_eq!(cfg.len(), 2);
}

#[test]
fn load_all_recursive_subdirectories() {
    let (dir, loader) = temp_loader();

    fs::write(dir.path().join("daily.yml"), VALID_SCHEDULE_YAML).unwrap();
    let sub = dir.path().join("events");
    fs::create_dir(&sub).unwrap();
    let weekly = VALID_SCHEDULE_YAML.replace("daily-login", "weekly-bonus");
    fs::write(sub.join("weekly.yaml"), weekly).unwrap();

    let results = loader.load_all().unwrap();
    let mut ids = loaded_ids(&results);
    ids.sort();
    assert_eq!(ids, vec!["daily-login", "weekly-bonus"]);
    assert_eq!(loader.len(), 2);
}

#[test]
fn invalid_files_are_reported_not_fatal() {
    let (dir, loader) = temp_loader();

    fs::write(dir.path().join("daily.yml"), VALID_SCHEDULE_YAML).unwrap();
    fs::write(dir.path().join("broken.yml"), "apiVersion: [unclosed").unwrap();
    let no_slots = r#"
apiVersion: v1
kind: RewardSchedule
metadata: { id: hollow, name: Hollow }
spec: { cooldown: 60, slots: [] }
"#;
    fs::write(dir.path().join("hollow.yml"), no_slots).unwrap();

    let results = loader.load_all().unwrap();
    let failed = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
        .count();

    assert_eq!(loaded_ids(&results), vec!["daily-login"]);
    assert_eq!(failed, 2);
    assert!(loader.get("hollow").is_none());
}

#[test]
fn duplicate_ids_across_files_are_rejected() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a.yml"), VALID_SCHEDULE_YAML).unwrap();
    fs::write(dir.path().join("b.yml"), VALID_SCHEDULE_YAML).unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results).len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(&r.status, LoadStatus::Failed { error } if error.contains("duplicate"))));
}

#[test]
fn disabled_schedules_are_not_listed() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("daily.yml"), VALID_SCHEDULE_YAML).unwrap();
    let disabled = VALID_SCHEDULE_YAML
        .replace("daily-login", "retired")
        .replace("enabled: true", "enabled: false");
    fs::write(dir.path().join("retired.yml"), disabled).unwrap();

    loader.load_all().unwrap();
    let keys: Vec<_> = loader
        .enabled_schedules()
        .iter()
        .map(|c| c.key().to_string())
        .collect();
    assert_eq!(keys, vec!["daily-login"]);
    assert!(loader.get("retired").is_some());
}

#[test]
fn write_and_delete_document() {
    let (dir, loader) = temp_loader();
    let doc: crate::ScheduleDocument = serde_yaml::from_str(VALID_SCHEDULE_YAML).unwrap();

    let path = loader.write_document(&doc).unwrap();
    assert_eq!(path, dir.path().join("daily-login.yml"));
    assert!(!dir.path().join(".daily-login.tmp").exists());
    assert_eq!(loader.document("daily-login"), Some(doc));

    loader.delete_schedule("daily-login").unwrap();
    assert!(!path.exists());
    assert!(loader.get("daily-login").is_none());
    assert!(matches!(
        loader.delete_schedule("daily-login"),
        Err(CatalogError::Validation(_))
    ));
}

#[test]
fn write_rejects_invalid_document() {
    let (dir, loader) = temp_loader();
    let mut doc: crate::ScheduleDocument = serde_yaml::from_str(VALID_SCHEDULE_YAML).unwrap();
    doc.spec.slots.clear();

    assert!(loader.write_document(&doc).is_err());
    assert!(!dir.path().join("daily-login.yml").exists());
}
