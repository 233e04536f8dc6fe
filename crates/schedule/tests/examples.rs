//! Integration tests that verify every example schedule in
//! `data/schedules/` loads and validates.

use cadence_schedule::{LoadStatus, Payoutable, ScheduleLoader};

/// Integration tests run from the crate directory, so we go up two levels.
fn schedules_dir() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/schedules")
}

fn load_examples() -> ScheduleLoader {
    let loader = ScheduleLoader::new(schedules_dir());
    let results = loader.load_all().expect("scan examples");
    for r in &results {
        if let LoadStatus::Failed { error } = &r.status {
            panic!("{} failed to load: {}", r.path.display(), error);
        }
    }
    loader
}

#[test]
fn all_examples_load() {
    let loader = load_examples();
    let keys: Vec<_> = loader
        .enabled_schedules()
        .iter()
        .map(|c| c.key().to_string())
        .collect();
    assert_eq!(keys, vec!["daily-login", "starter-pack", "streak-bonus"]);
}

// ── daily-login.yml ─────────────────────────────────────────

#[test]
fn daily_login_example() {
    let cfg = load_examples().get("daily-login").unwrap();
    assert_eq!(cfg.cooldown_seconds(), 20 * 3_600);
    assert_eq!(cfg.expiration_seconds(), 86_400);
    assert!(!cfg.reset_on_expire());
    assert_eq!(cfg.len(), 7);

    let finale = cfg.slot("day-7").unwrap();
    assert_eq!(finale.payout.id, "weekly-finale");
    assert!(finale
        .payout
        .grants
        .contains(&Payoutable::UnitItem { item: "golden-frame".into() }));
}

// ── streak-bonus.yml ────────────────────────────────────────

#[test]
fn streak_bonus_example() {
    let cfg = load_examples().get("streak-bonus").unwrap();
    assert!(cfg.reset_on_expire());
    assert_eq!(cfg.cooldown_seconds(), cfg.expiration_seconds());
    assert_eq!(cfg.slot_index("streak-3"), Some(2));
}

// ── starter-pack.yml ────────────────────────────────────────

#[test]
fn starter_pack_never_expires() {
    let cfg = load_examples().get("starter-pack").unwrap();
    assert_eq!(cfg.cooldown_seconds(), 3_600);
    assert_eq!(cfg.expiration(), None);
}
