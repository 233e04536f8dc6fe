//! End-to-end flow: YAML catalog -> registry -> JSON history on disk.

use std::fs;
use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use cadence_core::ManualClock;
use cadence_schedule::ScheduleLoader;
use cadence_scheduler::{
    ClaimError, HistoryStore, InventoryLedger, JsonFileStore, SchedulerEvent, SchedulerRegistry, SlotState,
};

const CHECKIN_YAML: &str = r#"
apiVersion: v1
kind: RewardSchedule
metadata:
  id: checkin
  name: Check-in
spec:
  cooldown: 60
  slots:
    - key: first
      payout:
        grants:
          - { type: currency, currency: gold, amount: 5 }
    - key: second
      payout:
        grants:
          - { type: stackable_item, item: potion, quantity: 2 }
    - key: third
      payout:
        grants:
          - { type: unit_item, item: badge }
"#;

const SPRINT_YAML: &str = r#"
apiVersion: v1
kind: RewardSchedule
metadata: { id: sprint, name: Sprint }
spec:
  cooldown: 1m
  expiration: 30s
  slots:
    - { key: a }
    - { key: b }
    - { key: c }
"#;

struct World {
    _dir: TempDir,
    loader: ScheduleLoader,
    store: Arc<JsonFileStore>,
    clock: ManualClock,
}

fn world() -> World {
    let dir = TempDir::new().unwrap();
    let schedules = dir.path().join("schedules");
    fs::create_dir_all(&schedules).unwrap();
    fs::write(schedules.join("checkin.yml"), CHECKIN_YAML).unwrap();
    fs::write(schedules.join("sprint.yaml"), SPRINT_YAML).unwrap();

    let loader = ScheduleLoader::new(schedules);
    loader.load_all().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("history")).unwrap());

    World {
        _dir: dir,
        loader,
        store,
        clock: ManualClock::at_epoch(),
    }
}

fn registry(world: &World, ledger: Arc<InventoryLedger>) -> SchedulerRegistry {
    SchedulerRegistry::builder(world.store.clone(), ledger)
        .clock(Arc::new(world.clock.clone()))
        .build(&world.loader)
        .unwrap()
}

#[tokio::test]
async fn cooldown_cycle_survives_restart() {
    let world = world();
    let ledger = Arc::new(InventoryLedger::new());
    let first = registry(&world, ledger.clone());

    let mut snapshot = first.find_schedule("checkin").await.unwrap();
    assert_eq!(snapshot.name(), "Check-in");
    assert_eq!(snapshot.state_of("first"), Some(SlotState::Claimable));

    first.claim("checkin", "first").await.unwrap();
    world.clock.set_secs(30);
    snapshot = first.find_schedule("checkin").await.unwrap();
    assert_eq!(snapshot.state_of("second"), Some(SlotState::Locked));
    assert_eq!(snapshot.evaluation.next_recompute_at, Some(snapshot.evaluated_at + Duration::seconds(30)));

    world.clock.set_secs(59);
    assert!(matches!(
        first.claim("checkin", "second").await,
        Err(ClaimError::NotYetAvailable { .. })
    ));

    // A fresh registry over the same history directory sees the claim.
    world.clock.set_secs(60);
    let second = registry(&world, ledger.clone());
    assert_eq!(second.last_claimable_slot("checkin").await.as_deref(), Some("second"));
    second.claim("checkin", "second").await.unwrap();

    assert_eq!(ledger.balance("gold"), 5);
    assert_eq!(ledger.quantity("potion"), 2);

    let persisted = world.store.load("checkin").unwrap().unwrap();
    assert_eq!(persisted.keys, vec!["first", "second"]);
}

#[tokio::test]
async fn skipping_past_the_sequence_resets_the_cycle() {
    let world = world();
    let registry = registry(&world, Arc::new(InventoryLedger::new()));
    registry.claim("sprint", "a").await.unwrap();

    let mut rx = registry.subscribe();
    world.clock.set_secs(200);

    let snapshot = registry.find_schedule("sprint").await.unwrap();
    assert!(snapshot.evaluation.did_reset);
    assert_eq!(snapshot.state_of("a"), Some(SlotState::Claimable));

    let report = registry.refresh_all(false).await;
    assert_eq!(report.reset, vec!["sprint"]);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(matches!(first, SchedulerEvent::ScheduleReset { ref schedule } if schedule == "sprint"));
    assert!(matches!(second, SchedulerEvent::ScheduleStateChanged { ref schedule } if schedule == "sprint"));

    let persisted = world.store.load("sprint").unwrap().unwrap();
    assert!(persisted.is_empty());
}

#[tokio::test]
async fn orphaned_history_is_dropped_on_load() {
    let world = world();
    fs::write(
        world.store.dir().join("checkin.json"),
        r#"{"keys":["first","legacy"],"timestamps":["1970-01-01T00:00:00Z","1970-01-01T00:00:10Z"]}"#,
    )
    .unwrap();

    let registry = registry(&world, Arc::new(InventoryLedger::new()));
    let snapshot = registry.find_schedule("checkin").await.unwrap();

    assert_eq!(snapshot.claims.len(), 1);
    assert_eq!(snapshot.state_of("first"), Some(SlotState::Claimed));
}
