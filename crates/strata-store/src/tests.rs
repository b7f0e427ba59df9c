//! Unit tests for strata-store module

use crate::error::StoreError;
use crate::query::SymbolIndex;
use crate::store::SymbolStore;
use serde_json::json;
use strata_core::{Dependency, DependencyKind, Symbol, SymbolKind};

fn symbol(name: &str, kind: SymbolKind, file: &str, line: u32, end: u32, parent: Option<usize>) -> Symbol {
    Symbol {
        name: name.to_string(),
        kind,
        file_path: file.to_string(),
        line,
        end_line: end,
        parent,
        metadata: json!({}),
    }
}

fn reference(file: &str, name: &str, kind: DependencyKind, line: u32) -> Dependency {
    Dependency {
        source_file: file.to_string(),
        name: name.to_string(),
        module: None,
        kind,
        line,
        is_external: false,
    }
}

fn models_file() -> Vec<Symbol> {
    vec![
        symbol("app/models.py", SymbolKind::File, "app/models.py", 1, 20, None),
        symbol("User", SymbolKind::Class, "app/models.py", 3, 12, Some(0)),
        symbol("save", SymbolKind::Function, "app/models.py", 5, 8, Some(1)),
        symbol("MAX_USERS", SymbolKind::Variable, "app/models.py", 15, 15, Some(0)),
    ]
}

fn views_file() -> Vec<Symbol> {
    vec![
        symbol("app/views.py", SymbolKind::File, "app/views.py", 1, 10, None),
        symbol("show_user", SymbolKind::Function, "app/views.py", 3, 6, Some(0)),
    ]
}

#[test]
fn test_insert_symbol_is_idempotent() {
    let store = SymbolStore::in_memory().unwrap();
    let user = symbol("User", SymbolKind::Class, "app/models.py", 3, 12, None);

    let first = store.insert_symbol(&user, None).unwrap();
    let second = store.insert_symbol(&user, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.find_by_name("User", None).unwrap().len(), 1);
}

#[test]
fn test_insert_dependency_is_idempotent() {
    let store = SymbolStore::in_memory().unwrap();
    let a = store.insert_symbol(&symbol("a", SymbolKind::Function, "x.py", 1, 2, None), None).unwrap();
    let b = store.insert_symbol(&symbol("b", SymbolKind::Function, "x.py", 4, 5, None), None).unwrap();

    let first = store.insert_dependency(a, b, "call").unwrap();
    let second = store.insert_dependency(a, b, "call").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.dependencies_from(a).unwrap().len(), 1);
    assert_eq!(store.dependencies_to(b).unwrap().len(), 1);
}

#[test]
fn test_replace_file_resolves_parents() {
    let store = SymbolStore::in_memory().unwrap();
    let ids = store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    assert_eq!(ids.len(), 4);

    let symbols = store.symbols_in_file("app/models.py").unwrap();
    let lines: Vec<u32> = symbols.iter().map(|s| s.line).collect();
    assert_eq!(lines, vec![1, 3, 5, 15]);

    let save = store.find_by_name("save", Some(SymbolKind::Function)).unwrap();
    assert_eq!(save[0].parent_id, Some(ids[1]));
    assert_eq!(symbols[0].parent_id, None);
}

#[test]
fn test_replace_file_drops_stale_symbols() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();

    let trimmed = vec![symbol("app/models.py", SymbolKind::File, "app/models.py", 1, 4, None)];
    store.replace_file("app/models.py", &trimmed, &[]).unwrap();

    assert!(store.find_by_name("User", None).unwrap().is_empty());
    assert_eq!(store.symbols_in_file("app/models.py").unwrap().len(), 1);
}

#[test]
fn test_search_matches_substrings_and_escapes_wildcards() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    store.replace_file("app/views.py", &views_file(), &[]).unwrap();

    let names: Vec<String> = store
        .search("user", None)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["MAX_USERS", "User", "show_user"]);

    let underscored = store.search("_", Some(SymbolKind::Function)).unwrap();
    assert_eq!(underscored.len(), 1);
    assert_eq!(underscored[0].name, "show_user");

    assert!(store.search("%", None).unwrap().is_empty());
}

#[test]
fn test_statistics() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    store.replace_file("app/views.py", &views_file(), &[]).unwrap();

    let stats = store.statistics().unwrap();
    assert_eq!(stats.total_symbols, 6);
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.by_kind[0].kind, "file");
    assert_eq!(stats.by_kind[0].count, 2);
    assert_eq!(stats.top_files[0].file_path, "app/models.py");
    assert_eq!(stats.top_files[0].count, 4);
}

#[test]
fn test_remove_file() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    store.replace_file("app/views.py", &views_file(), &[]).unwrap();

    assert_eq!(store.remove_file("app/models.py").unwrap(), 4);
    assert!(store.find_by_name("User", None).unwrap().is_empty());
    assert_eq!(store.file_paths().unwrap(), vec!["app/views.py".to_string()]);
    assert_eq!(store.remove_file("app/models.py").unwrap(), 0);
}

#[test]
fn test_link_dependencies_uses_enclosing_symbol() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    let refs = vec![
        reference("app/views.py", "User", DependencyKind::Import, 1),
        reference("app/views.py", "User", DependencyKind::Instantiation, 4),
        reference("app/views.py", "missing", DependencyKind::Call, 5),
    ];
    let mut external = reference("app/views.py", "save", DependencyKind::Call, 5);
    external.is_external = true;
    let mut all_refs = refs.clone();
    all_refs.push(external);
    store.replace_file("app/views.py", &views_file(), &all_refs).unwrap();

    assert_eq!(store.link_dependencies().unwrap(), 2);

    let index = SymbolIndex::from_store(store.clone());
    let user = &index.find("User", None).unwrap()[0];
    let deps = index.dependencies(user.id).unwrap().unwrap();
    let mut users: Vec<(String, String)> = deps
        .used_by
        .iter()
        .map(|(kind, s)| (kind.clone(), s.name.clone()))
        .collect();
    users.sort();
    assert_eq!(
        users,
        vec![
            ("import".to_string(), "app/views.py".to_string()),
            ("instantiation".to_string(), "show_user".to_string()),
        ]
    );

    // relinking is stable
    assert_eq!(store.link_dependencies().unwrap(), 2);
}

#[test]
fn test_fuzzy_search_ranks_best_match_first() {
    let store = SymbolStore::in_memory().unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    store.replace_file("app/views.py", &views_file(), &[]).unwrap();

    let index = SymbolIndex::from_store(store);
    let results = index.fuzzy("shwusr", 5).unwrap();
    assert_eq!(results[0].name, "show_user");
    assert!(index.fuzzy("zzzz", 5).unwrap().is_empty());
    assert_eq!(index.fuzzy("e", 2).unwrap().len(), 2);
}

#[test]
fn test_metadata_round_trips() {
    let store = SymbolStore::in_memory().unwrap();
    let mut class = symbol("Config", SymbolKind::Class, "cfg.py", 1, 9, None);
    class.metadata = json!({"bases": ["BaseModel"], "is_record": true});
    store.insert_symbol(&class, None).unwrap();

    let found = store.find_by_name("Config", Some(SymbolKind::Class)).unwrap();
    assert_eq!(found[0].metadata["bases"][0], "BaseModel");
    assert_eq!(found[0].metadata["is_record"], true);
}

#[test]
fn test_on_disk_store_and_read_only_index() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("symbols.db");

    let store = SymbolStore::open(&path).unwrap();
    store.replace_file("app/models.py", &models_file(), &[]).unwrap();
    drop(store);

    let index = SymbolIndex::open(&path).unwrap();
    assert_eq!(index.file("app/models.py").unwrap().len(), 4);
    assert_eq!(index.statistics().unwrap().total_files, 1);
}

#[test]
fn test_missing_index_is_reported() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = SymbolIndex::open(&dir.path().join("absent.db"));
    assert!(matches!(result, Err(StoreError::Missing(_))));
}
