//! End-to-end tests: parse arguments, run commands against a temporary store.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use famtree::cli::{self, Cli};
use famtree::config::{Config, StoreFormat};
use famtree::storage;
use famtree_core::{FamtreeError, IndividualId, QueryEngine, RecordStore};
use std::path::Path;
use tempfile::TempDir;

fn run(db: &Path, args: &[&str]) -> Result<(), FamtreeError> {
    run_with(db, Config::default(), args)
}

fn run_with(db: &Path, config: Config, args: &[&str]) -> Result<(), FamtreeError> {
    let mut argv = vec!["famtree", "-q", "-D", db.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    cli::execute(cli, config)
}

fn id(s: &str) -> IndividualId {
    IndividualId::new(s)
}

/// I001 (M) + I002 (F) with child I003.
fn family_db(dir: &TempDir) -> std::path::PathBuf {
    let db = dir.path().join("family.ftree");
    run(&db, &["init"]).unwrap();
    run(&db, &["add", "--forename", "John", "--surname", "Smith", "--sex", "M"]).unwrap();
    run(&db, &["add", "--forename", "Mary", "--surname", "Jones"]).unwrap();
    run(&db, &["add", "--forename", "Ann", "--surname", "Smith"]).unwrap();
    run(&db, &["link", "spouse", "I001", "I002"]).unwrap();
    run(&db, &["link", "child", "I001", "I003"]).unwrap();
    db
}

fn load(db: &Path) -> RecordStore {
    storage::load_store(db).unwrap()
}

// =============================================================================
// STORE LIFECYCLE
// =============================================================================

#[test]
fn test_init_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("family.ftree");
    run(&db, &["init"]).unwrap();
    assert!(run(&db, &["init"]).is_err());
    run(&db, &["init", "--force"]).unwrap();
    assert!(load(&db).is_empty());
}

#[test]
fn test_missing_database_is_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("absent.ftree");
    let err = run(&db, &["status"]).unwrap_err();
    assert!(err.to_string().contains("famtree init"));
}

#[test]
fn test_json_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("family.json");
    run(&db, &["-F", "json", "init"]).unwrap();
    run(&db, &["-F", "json", "add", "--forename", "Ada"]).unwrap();

    let text = std::fs::read_to_string(&db).unwrap();
    assert!(text.trim_start().starts_with('{'));
    let store = load(&db);
    assert_eq!(store.individual_count(), 1);
    assert_eq!(store.get_individual(&id("I001")).unwrap().forename(), Some("Ada"));
}

#[test]
fn test_edit_keeps_store_encoding() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("family.json");
    run(&db, &["-F", "json", "init"]).unwrap();
    run(&db, &["add", "--forename", "Ada"]).unwrap();
    run(&db, &["set", "I001", "surname", "Lovelace"]).unwrap();

    let text = std::fs::read_to_string(&db).unwrap();
    assert!(text.trim_start().starts_with('{'));
    assert_eq!(storage::stored_format(&db), Some(StoreFormat::Json));

    run(&db, &["-F", "binary", "add", "--forename", "Byron"]).unwrap();
    assert_eq!(storage::stored_format(&db), Some(StoreFormat::Binary));
    assert_eq!(load(&db).individual_count(), 2);
}

// =============================================================================
// EDITING
// =============================================================================

#[test]
fn test_linking_builds_family() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    let store = load(&db);
    store.verify_integrity().unwrap();

    let query = QueryEngine::new(&store);
    let parents = query.parents(&id("I003"));
    assert_eq!(parents.father, Some(id("I001")));
    assert_eq!(parents.mother, Some(id("I002")));
    assert_eq!(store.family_count(), 1);
}

#[test]
fn test_set_attributes() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    run(&db, &["set", "I003", "birth.year", "1901"]).unwrap();
    run(&db, &["set-family", "I001", "marriage.place", "York"]).unwrap();
    assert!(run(&db, &["set", "I003", "shoe.size", "9"]).is_err());

    let store = load(&db);
    let ann = store.get_individual(&id("I003")).unwrap();
    assert_eq!(ann.birth.as_ref().and_then(|b| b.date_label()).as_deref(), Some("1901"));
    let link = QueryEngine::new(&store).spouse(&id("I002"), None);
    assert_eq!(link.spouse, Some(id("I001")));
}

#[test]
fn test_same_sex_pairing_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    run(&db, &["add", "--forename", "Tom", "--sex", "M"]).unwrap();
    let before = std::fs::read(&db).unwrap();

    assert!(run(&db, &["link", "spouse", "I001", "I004"]).is_err());
    assert_eq!(std::fs::read(&db).unwrap(), before);
}

#[test]
fn test_unlink_and_delete_cascade() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);

    run(&db, &["unlink", "parents", "I003"]).unwrap();
    assert!(QueryEngine::new(&load(&db)).parents(&id("I003")).family.is_none());

    run(&db, &["delete", "individual", "I001"]).unwrap();
    run(&db, &["delete", "individual", "I002"]).unwrap();
    let store = load(&db);
    assert_eq!(store.individual_count(), 1);
    assert_eq!(store.family_count(), 0);
    store.verify_integrity().unwrap();

    let err = run(&db, &["delete", "individual", "I001"]).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_family_clears_references() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    run(&db, &["delete", "family", "F001"]).unwrap();

    let store = load(&db);
    assert_eq!(store.family_count(), 0);
    assert!(store.get_individual(&id("I003")).unwrap().child_family().is_none());
    assert!(store.get_individual(&id("I001")).unwrap().spouse_families().is_empty());
}

// =============================================================================
// READ COMMANDS
// =============================================================================

#[test]
fn test_read_commands_succeed() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    for args in [
        &["status"][..],
        &["list"],
        &["show", "I003"],
        &["hash"],
        &["query", "parents", "I003"],
        &["query", "siblings", "I003"],
        &["query", "spouses", "I001"],
        &["query", "children", "I002"],
        &["query", "ancestors", "I003"],
        &["query", "roots", "I003"],
        &["--json-mode", "query", "roots", "I003"],
    ] {
        run(&db, args).unwrap();
    }
    assert!(run(&db, &["show", "I099"]).unwrap_err().is_not_found());
}

#[test]
fn test_collate_writes_new_store() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    run(&db, &["add", "--forename", "Loner"]).unwrap();
    let out = dir.path().join("ann.ftree");

    run(&db, &["collate", "ancestors", "I003", "-o", out.to_str().unwrap()]).unwrap();
    let collated = load(&out);
    assert_eq!(collated.individual_count(), 3);
    assert!(!collated.contains_individual(&id("I004")));
    collated.verify_integrity().unwrap();
}

#[test]
fn test_graph_writes_dot_and_json() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    let dot = dir.path().join("tree.dot");
    let json = dir.path().join("tree.json");

    run(&db, &["graph", "--root", "I003", "--ancestors", "-o", dot.to_str().unwrap()]).unwrap();
    let text = std::fs::read_to_string(&dot).unwrap();
    assert!(text.starts_with("strict digraph famtree {"));
    assert!(text.contains("\"I001\" -> \"I002\""));

    run(
        &db,
        &["graph", "--output-format", "json", "-o", json.to_str().unwrap()],
    )
    .unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["nodes"].as_object().unwrap().len(), 3);
}

#[test]
fn test_graph_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    let db = family_db(&dir);
    let out = dir.path().join("tree.json");
    let config = Config::from_toml_str("[graph]\ndescendants = true\noutput_format = \"json\"\n").unwrap();
    let node_count = |args: &[&str]| {
        let mut argv = vec!["graph", "--root", "I003", "-o", out.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_with(&db, config.clone(), &argv).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        value["nodes"].as_object().unwrap().len()
    };

    // I003 has no children, so the configured walk stops at the root.
    assert_eq!(node_count(&[]), 1);
    assert_eq!(node_count(&["--descendants=false"]), 3);
    assert_eq!(node_count(&["--descendants"]), 1);
}

// =============================================================================
// CONFIGURATION FILES
// =============================================================================

#[test]
fn test_config_file_loading() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("famtree.toml");
    std::fs::write(&path, "[store]\nformat = \"json\"\n\n[graph]\ndescendants = true\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(config.graph.descendants);
    assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());

    std::fs::write(&path, "[store\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}
