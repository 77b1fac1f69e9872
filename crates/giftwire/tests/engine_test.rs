//! # Engine Integration Test
//!
//! Every front-end operation against a scripted server, checking which
//! account each one logs in as.

use giftwire::events::drain;
use giftwire::stats::{DropStatistics, MemoryDropLog};
use giftwire::testing::{ScriptedServer, ServerItem};
use giftwire::{
    AllowList, AllowListStore, Engine, EngineError, EngineEvent, EventSink, MemoryAllowList, TomlAllowList,
    Tuning,
};

type TestEngine = Engine<ScriptedServer, MemoryDropLog, MemoryAllowList>;

fn engine(server: &ScriptedServer, names: &[&str]) -> TestEngine {
    Engine::new(
        server.clone(),
        Tuning::default().without_delays(),
        "receiver",
        DropStatistics::new(MemoryDropLog::new()),
        MemoryAllowList::new(names.iter().copied().collect()),
    )
}

#[test]
fn test_farm_records_a_session() {
    let server = ScriptedServer::new().with_container(
        "a",
        "Box",
        0,
        vec![
            ServerItem::new("c", "Coin", 0, 5),
            ServerItem::new("g", "Gem", 0, 1),
        ],
    );
    let engine = engine(&server, &["Box"]);

    let report = engine.farm().unwrap();

    assert_eq!(report.resolution.total_opened, 1);
    let recorded = report.recorded.unwrap();
    assert_eq!(recorded.total_opened, 1);
    assert_eq!(recorded.loot.get("Coin"), 5);
    assert_eq!(engine.stats().sessions().unwrap().len(), 1);
    assert_eq!(server.logins(), vec!["receiver".to_string()]);
}

#[test]
fn test_farm_with_nothing_to_open_records_nothing() {
    let server = ScriptedServer::new().with_items("i", 3);
    let engine = engine(&server, &["Box"]);

    let report = engine.farm().unwrap();

    assert_eq!(report.resolution.total_opened, 0);
    assert!(report.recorded.is_none());
    assert!(engine.stats().sessions().unwrap().is_empty());
}

#[test]
fn test_farm_sessions_feed_statistics() {
    let server = ScriptedServer::new();
    let engine = engine(&server, &["Box"]);

    for round in 0..4 {
        let id = format!("box{round}");
        let _ = server
            .clone()
            .with_container(&id, "Box", 0, vec![ServerItem::new(&format!("c{round}"), "Coin", 0, 2)]);
        engine.farm().unwrap();
    }

    let totals = engine.stats().total_stats().unwrap().unwrap();
    assert_eq!(totals.sessions, 4);
    assert_eq!(totals.total_opened, 4);
    assert_eq!(totals.items.get("Coin"), 8);
    assert!(!engine.stats().trend().unwrap().is_empty());
}

#[test]
fn test_dispose_uses_receiver_account() {
    let server = ScriptedServer::new().with_items("i", 4);
    let engine = engine(&server, &[]);

    let report = engine.dispose().unwrap();

    assert_eq!(report.deleted, 4);
    assert!(server.player_items().is_empty());
    assert_eq!(server.logins(), vec!["receiver".to_string()]);
}

#[test]
fn test_inspect_groups_partitions() {
    let server = ScriptedServer::new()
        .with_items("i", 2)
        .with_item(ServerItem::new("b", "Shield", 3, 1))
        .with_item(ServerItem::new("v", "Vault key", 6, 1));
    let engine = engine(&server, &[]);

    let report = engine.inspect().unwrap();

    assert_eq!(report.player_items, 3);
    assert_eq!(report.other_items, 1);
    assert_eq!(report.total(), 4);
    assert_eq!(report.by_partition.get(&0).map(Vec::len), Some(2));
    assert_eq!(report.by_partition.get(&6).map(Vec::len), Some(1));
}

#[test]
fn test_refresh_replaces_allow_list_from_catalog() {
    let server = ScriptedServer::new().with_catalog(&[("10", "Winter box"), ("11", "Spring box")]);
    let engine = engine(&server, &["Halloween box"]);

    let list = engine.refresh_allow_list().unwrap();

    assert_eq!(list.len(), 2);
    assert!(list.contains("Winter box"));
    assert!(!list.contains("Halloween box"));
    assert_eq!(engine.allow_list().load().unwrap(), list);
    assert_eq!(server.logins(), vec!["sender".to_string()]);
}

#[test]
fn test_refresh_with_empty_catalog_keeps_list() {
    let server = ScriptedServer::new();
    let engine = engine(&server, &["Halloween box"]);

    let list = engine.refresh_allow_list().unwrap();

    assert_eq!(list, ["Halloween box"].into_iter().collect::<AllowList>());
}

#[test]
fn test_send_reports_partial_success() {
    let server = ScriptedServer::new().with_send_budget(3);
    let (sink, receiver) = EventSink::channel(64);
    let engine = engine(&server, &[]).with_events(sink);

    let report = engine.send("901", 5).unwrap();

    assert_eq!(report.sent, 5);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 2);
    let purchases = server.purchases();
    assert_eq!(purchases.len(), 5);
    assert!(purchases.iter().all(|(to, souvenir)| to == "receiver" && souvenir == "901"));
    assert_eq!(server.logins(), vec!["sender".to_string()]);

    let sent: Vec<_> = drain(&receiver)
        .into_iter()
        .filter(|event| matches!(event, EngineEvent::GiftSent { .. }))
        .collect();
    assert_eq!(sent.len(), 5);
}

#[test]
fn test_chunked_responses_are_reassembled() {
    let server = ScriptedServer::new()
        .with_chunk_limit(16)
        .with_container("a", "Box", 0, vec![ServerItem::new("c", "Coin", 0, 3)]);
    let mut tuning = Tuning::default().without_delays();
    tuning.inventory.attempts = 64;
    tuning.open.attempts = 64;
    let engine = Engine::new(
        server.clone(),
        tuning,
        "receiver",
        DropStatistics::new(MemoryDropLog::new()),
        MemoryAllowList::new(["Box"].into_iter().collect()),
    );

    let report = engine.farm().unwrap();

    assert_eq!(report.resolution.total_opened, 1);
    assert_eq!(report.resolution.loot.get("Coin"), 3);
}

#[test]
fn test_toml_allow_list_persists_refresh() {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("test_allow_list_{id}.toml"));
    let server = ScriptedServer::new().with_catalog(&[("10", "Winter box")]);
    let engine = Engine::new(
        server,
        Tuning::default().without_delays(),
        "receiver",
        DropStatistics::new(MemoryDropLog::new()),
        TomlAllowList::new(&path),
    );

    engine.refresh_allow_list().unwrap();

    let reloaded = TomlAllowList::new(&path).load().unwrap();
    assert!(reloaded.contains("Winter box"));
    let _ = std::fs::remove_file(&path);
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_mid_farm_stops_further_opens() {
    let ids = ["a", "b", "c", "d", "e"];
    let mut server = ScriptedServer::new();
    for id in ids {
        server = server.with_container(id, "Box", 0, vec![ServerItem::new(&format!("{id}-coin"), "Coin", 0, 1)]);
    }
    let engine = engine(&server, &["Box"]);
    let server = server.with_cancel_after_opens(2, engine.cancel_token());

    let result = engine.farm();

    assert!(matches!(result, Err(EngineError::Cancelled)));
    let opened: u32 = ids.iter().map(|id| server.open_count(id)).sum();
    assert_eq!(opened, 2);
    let sessions = engine.stats().sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].total_opened, 2);
    assert_eq!(sessions[0].loot.get("Coin"), 2);
}

#[test]
fn test_cancelled_dispose_deletes_nothing_until_reset() {
    let server = ScriptedServer::new().with_items("i", 3);
    let engine = engine(&server, &[]);
    let token = engine.cancel_token();

    token.cancel();
    assert!(matches!(engine.dispose(), Err(EngineError::Cancelled)));
    assert!(server.deletes().is_empty());

    token.reset();
    let report = engine.dispose().unwrap();
    assert_eq!(report.deleted, 3);
}

// =============================================================================
// Allow-list management
// =============================================================================

#[test]
fn test_allow_list_add_and_remove() {
    let server = ScriptedServer::new();
    let engine = engine(&server, &["Winter box"]);

    assert!(engine.add_container("  Spring box ").unwrap());
    assert!(!engine.add_container("Winter box").unwrap());
    assert!(matches!(engine.add_container("   "), Err(EngineError::Store(_))));

    let list = engine.allow_list_names().unwrap();
    assert_eq!(list.names().collect::<Vec<_>>(), vec!["Spring box", "Winter box"]);

    assert!(engine.remove_container("Winter box").unwrap());
    assert!(!engine.remove_container("Winter box").unwrap());
    assert_eq!(engine.allow_list().load().unwrap(), ["Spring box"].into_iter().collect::<AllowList>());
    assert!(server.logins().is_empty());
}

#[test]
fn test_toml_allow_list_persists_edits() {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("test_allow_list_edits_{id}.toml"));
    let engine = Engine::new(
        ScriptedServer::new(),
        Tuning::default().without_delays(),
        "receiver",
        DropStatistics::new(MemoryDropLog::new()),
        TomlAllowList::new(&path),
    );

    engine.add_container("Winter box").unwrap();
    engine.add_container("Spring box").unwrap();
    engine.remove_container("Winter box").unwrap();

    let reloaded = TomlAllowList::new(&path).load().unwrap();
    assert!(reloaded.contains("Spring box"));
    assert!(!reloaded.contains("Winter box"));
    let _ = std::fs::remove_file(&path);
}

// =============================================================================
// Exports
// =============================================================================

#[test]
fn test_exports_after_farm() {
    let server = ScriptedServer::new().with_container("a", "Box", 0, vec![ServerItem::new("c", "Coin", 0, 5)]);
    let engine = engine(&server, &["Box"]);
    assert!(engine.full_report(100).unwrap().is_none());

    engine.farm().unwrap();

    let stats = engine.export_stats_json().unwrap();
    assert!(stats.contains("\"sessions\""));
    assert!(stats.contains("\"Coin\""));

    let list = engine.export_allow_list_json().unwrap();
    assert!(list.contains("\"Box\""));

    let report = engine.full_report(100).unwrap().unwrap();
    assert!(report.contains("Containers:      1"));
    assert!(report.contains("FORECAST FOR 100 OPENS"));
}
