//! Tests for the SQLite store.

use morris_rules::{Match, Position};
use tempfile::NamedTempFile;

use morris_server::{AccountStore, MatchStore, Ranking, SavedMatch, SqliteStore};

/// Creates a temporary database file and a migrated store. The file handle
/// must stay in scope to keep the file alive.
fn setup_test_db() -> (NamedTempFile, SqliteStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::open(db_path).expect("Failed to open store");
    (db_file, store)
}

fn active_match(id: u64) -> Match {
    let mut game = Match::new(id, "ana");
    game.join("bo").expect("Join failed");
    game
}

#[test]
fn test_save_and_load_snapshot() {
    let (_db, store) = setup_test_db();
    let mut game = active_match(4);
    game.place_piece(Position::D5).expect("Place failed");
    store.save_match(&game, 4).expect("Save failed");

    let loaded = store.load_matches().expect("Load failed");
    assert_eq!(loaded, vec![SavedMatch::new(game, 4)]);
}

#[test]
fn test_snapshot_upsert_keeps_last_write() {
    let (_db, store) = setup_test_db();
    let mut game = active_match(1);
    store.save_match(&game, 3).expect("First save failed");
    game.place_piece(Position::A1).expect("Place failed");
    store.save_match(&game, 5).expect("Second save failed");

    let loaded = store.load_matches().expect("Load failed");
    assert_eq!(loaded.len(), 1);
    assert_eq!(*loaded[0].last_sequence(), 5);
    assert_eq!(
        loaded[0].game().board().occupant(Position::A1),
        game.board().occupant(Position::A1)
    );
}

#[test]
fn test_snapshots_load_in_id_order() {
    let (_db, store) = setup_test_db();
    for id in [9, 2, 5] {
        store.save_match(&Match::new(id, "ana"), 1).expect("Save failed");
    }
    let ids: Vec<u64> = store
        .load_matches()
        .expect("Load failed")
        .iter()
        .map(|saved| saved.game().id())
        .collect();
    assert_eq!(ids, vec![2, 5, 9]);
}

#[test]
fn test_delete_snapshot() {
    let (_db, store) = setup_test_db();
    store.save_match(&Match::new(3, "ana"), 1).expect("Save failed");
    store.delete_match(3).expect("Delete failed");
    store.delete_match(42).expect("Deleting a missing id is fine");
    assert!(store.load_matches().expect("Load failed").is_empty());
}

#[test]
fn test_ranking_is_rewritten() {
    let (_db, store) = setup_test_db();
    let mut ranking = Ranking::new();
    ranking.insert("ana".to_string(), 2);
    ranking.insert("bo".to_string(), 1);
    store.save_ranking(&ranking).expect("Save failed");

    ranking.insert("bo".to_string(), 3);
    ranking.remove("ana");
    store.save_ranking(&ranking).expect("Rewrite failed");

    assert_eq!(store.load_ranking().expect("Load failed"), ranking);
}

#[test]
fn test_reopen_keeps_data() {
    let (db, store) = setup_test_db();
    store.save_match(&Match::new(7, "ana"), 12).expect("Save failed");
    drop(store);

    let path = db.path().to_str().expect("Invalid path");
    let reopened = SqliteStore::open(path).expect("Reopen failed");
    assert_eq!(reopened.path(), path);
    let loaded = reopened.load_matches().expect("Load failed");
    assert_eq!(loaded.len(), 1);
    assert_eq!(*loaded[0].last_sequence(), 12);
}

#[test]
fn test_account_name_is_unique() {
    let (_db, store) = setup_test_db();
    let account = store
        .create_account("carol", "digest")
        .expect("Create failed")
        .expect("Name should be free");
    assert_eq!(account.name(), "carol");
    assert!(*account.id() > 0);

    let duplicate = store.create_account("carol", "other").expect("Query failed");
    assert!(duplicate.is_none());
}

#[test]
fn test_find_account() {
    let (_db, store) = setup_test_db();
    store.create_account("dave", "digest").expect("Create failed");

    let found = store.find_account("dave").expect("Query failed");
    assert_eq!(found.map(|a| a.password_hash().clone()), Some("digest".to_string()));
    assert!(store.find_account("nobody").expect("Query failed").is_none());
}
