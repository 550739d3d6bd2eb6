mod support;

use std::sync::Arc;

use appshelf_core::config::{self, Config};
use appshelf_core::core_service::{InventoryService, ServiceError};
use appshelf_core::inventory::StaticInventory;
use appshelf_core::sync_engine::SyncOutcome;
use appshelf_core::view::ToggleOutcome;
use support::{ids, CacheCall, RecordingCache};

fn test_config(dir: &std::path::Path) -> Config {
    Config {
        cache_db_path: dir.join("apps.sqlite3"),
        config_path: dir.join("config.toml"),
        application_dirs: Vec::new(),
        default_enable: true,
    }
}

fn service(dir: &std::path::Path) -> (InventoryService, Arc<RecordingCache>) {
    let cache = Arc::new(RecordingCache::new());
    let service = InventoryService::with_cache(
        test_config(dir),
        cache.clone(),
        Arc::new(StaticInventory::deterministic_fixture()),
    )
    .unwrap();
    (service, cache)
}

#[test]
fn cold_sync_lists_user_apps_in_section_order() {
    let dir = tempfile::tempdir().unwrap();
    let (service, cache) = service(dir.path());

    let outcome = service.sync().unwrap();

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed pass");
    };
    assert!(report.cold_start);
    assert_eq!(report.added.len(), 3);
    assert_eq!(
        ids(&service.list("")),
        vec!["net.osmand.plus", "org.mozilla.firefox", "com.tencent.mm"]
    );
    assert_eq!(service.sections(), vec!['E', 'F', 'W']);
    assert_eq!(
        cache
            .calls()
            .iter()
            .filter(|call| matches!(call, CacheCall::ReplaceAll(_)))
            .count(),
        1
    );
}

#[test]
fn list_filters_and_jump_follows_the_filter() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _cache) = service(dir.path());
    service.sync().unwrap();

    assert_eq!(ids(&service.list("MOZILLA")), vec!["org.mozilla.firefox"]);
    assert_eq!(service.position_for_section('F'), Some(0));
    assert_eq!(service.position_for_section('E'), None);

    assert_eq!(service.list("").len(), 3);
    assert_eq!(service.position_for_section('W'), Some(2));
}

#[test]
fn resync_keeps_the_active_filter() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _cache) = service(dir.path());
    service.sync().unwrap();
    service.list("maps");

    service.sync().unwrap();

    assert_eq!(service.position_for_section('E'), Some(0));
    assert_eq!(service.position_for_section('F'), None);
}

#[test]
fn toggle_reports_new_state_and_persists_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (service, cache) = service(dir.path());
    service.sync().unwrap();
    cache.clear_calls();

    let outcome = service.toggle("org.mozilla.firefox").unwrap();

    assert_eq!(
        outcome,
        ToggleOutcome::Ignored {
            label: "Firefox".into()
        }
    );
    assert_eq!(
        cache.calls(),
        vec![CacheCall::UpdateEnabled("org.mozilla.firefox".into())]
    );
    assert!(!cache.inner.get("org.mozilla.firefox").unwrap().unwrap().enabled);
}

#[test]
fn toggle_unknown_app_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _cache) = service(dir.path());
    service.sync().unwrap();

    assert!(matches!(
        service.toggle("org.unknown"),
        Err(ServiceError::ItemNotFound(_))
    ));
}

#[test]
fn ignore_all_persists_default_for_new_apps() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _cache) = service(dir.path());
    service.sync().unwrap();

    assert_eq!(service.ignore_all().unwrap(), 3);

    assert!(!service.default_enable());
    assert!(service.list("").iter().all(|entry| !entry.enabled));
    let saved = config::load(Some(&dir.path().join("config.toml"))).unwrap();
    assert!(!saved.default_enable);

    assert_eq!(service.ignore_none().unwrap(), 3);
    let saved = config::load(Some(&dir.path().join("config.toml"))).unwrap();
    assert!(saved.default_enable);
}

#[test]
fn find_or_create_reads_through_to_the_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let (service, cache) = service(dir.path());

    let firefox = service.find_or_create("org.mozilla.firefox").unwrap();
    assert_eq!(firefox.label, "Firefox");
    assert!(firefox.enabled);
    assert!(cache.calls().contains(&CacheCall::Upsert("org.mozilla.firefox".into())));

    assert!(matches!(
        service.find_or_create("org.unknown"),
        Err(ServiceError::ItemNotFound(_))
    ));
}

#[test]
fn rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.cache_db_path = "".into();

    let result = InventoryService::with_cache(
        cfg,
        Arc::new(RecordingCache::new()),
        Arc::new(StaticInventory::deterministic_fixture()),
    );

    assert!(matches!(result, Err(ServiceError::Config(_))));
}

#[test]
fn opens_file_backed_cache_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(&dir.path().join("state"));

    {
        let service =
            InventoryService::new(cfg.clone(), Arc::new(StaticInventory::deterministic_fixture()))
                .unwrap();
        service.sync().unwrap();
        service.toggle("com.tencent.mm").unwrap();
    }

    let reopened =
        InventoryService::new(cfg, Arc::new(StaticInventory::deterministic_fixture())).unwrap();
    let SyncOutcome::Completed(report) = reopened.sync().unwrap() else {
        panic!("expected a completed pass");
    };
    assert!(!report.cold_start);
    assert!(report.added.is_empty());
    let wechat = reopened.engine().get("com.tencent.mm").unwrap();
    assert!(!wechat.enabled);
}

#[test]
fn app_found_on_demand_can_be_listed_and_toggled() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _cache) = service(dir.path());
    service.sync().unwrap();
    service.list("system");

    let found = service.find_or_create("com.android.systemui").unwrap();

    assert_eq!(found.label, "System UI");
    assert_eq!(ids(&service.list("system")), vec!["com.android.systemui"]);
    assert_eq!(
        service.toggle("com.android.systemui").unwrap(),
        ToggleOutcome::Ignored {
            label: "System UI".into()
        }
    );
    assert_eq!(service.list("").len(), 4);
}

#[test]
fn failed_mass_toggle_leaves_saved_default_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (service, cache) = service(dir.path());
    service.sync().unwrap();
    cache.fail_writes(true);

    assert!(matches!(service.ignore_all(), Err(ServiceError::Sync(_))));

    assert!(!dir.path().join("config.toml").exists());
    assert!(service.default_enable());
}
