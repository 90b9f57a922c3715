//! Integration tests for the filesystem script store.

use std::os::unix::fs::PermissionsExt;

use assert_matches::assert_matches;
use scriptrun_core::error::CoreError;
use scriptrun_core::runs::ScriptResolver;
use scriptrun_store::models::{CreateScript, UpdateScript};
use scriptrun_store::store::DEFAULT_SCRIPT;
use scriptrun_store::{ScriptStore, StoreError};

async fn open_store() -> (tempfile::TempDir, ScriptStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ScriptStore::open(dir.path().join("scripts"))
        .await
        .expect("open store");
    (dir, store)
}

fn create(name: &str, script: Option<&str>) -> CreateScript {
    CreateScript {
        name: name.to_string(),
        description: None,
        script: script.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_writes_meta_and_executable_script() {
    let (_dir, store) = open_store().await;

    let script = store
        .create(CreateScript {
            name: "  backup  ".to_string(),
            description: Some("nightly".to_string()),
            script: Some("#!/bin/bash\necho hi\n".to_string()),
        })
        .await
        .expect("create");

    assert_eq!(script.id.len(), 8);
    assert_eq!(script.name, "backup");
    assert_eq!(script.description, "nightly");

    let path = store.root().join(&script.id).join("script");
    let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    assert!(store.root().join(&script.id).join("meta.json").exists());

    let found = store.find_by_id(&script.id).await.expect("find");
    assert_eq!(found.script, "#!/bin/bash\necho hi\n");
    assert_eq!(found.name, "backup");
}

#[tokio::test]
async fn create_without_body_uses_default_script() {
    let (_dir, store) = open_store().await;

    let script = store.create(create("empty", None)).await.expect("create");

    assert_eq!(script.script, DEFAULT_SCRIPT);
}

#[tokio::test]
async fn create_requires_name() {
    let (_dir, store) = open_store().await;

    let err = store.create(create("   ", None)).await.unwrap_err();

    assert_matches!(err, StoreError::Validation(_));
    assert!(store.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn list_is_sorted_and_skips_stray_entries() {
    let (_dir, store) = open_store().await;
    let a = store.create(create("one", None)).await.expect("create");
    let b = store.create(create("two", None)).await.expect("create");
    std::fs::create_dir(store.root().join("no-meta")).expect("stray dir");
    std::fs::write(store.root().join("loose-file"), "x").expect("stray file");

    let listed = store.list().await.expect("list");

    let mut expected = vec![a.id, b.id];
    expected.sort();
    let ids: Vec<_> = listed.into_iter().map(|s| s.id).collect();
    assert_eq!(ids, expected);
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_changes_only_given_fields() {
    let (_dir, store) = open_store().await;
    let script = store.create(create("orig", Some("echo 1\n"))).await.expect("create");

    let updated = store
        .update(
            &script.id,
            UpdateScript {
                description: Some("changed".to_string()),
                script: Some("echo 2\n".to_string()),
                ..UpdateScript::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.name, "orig");
    assert_eq!(updated.description, "changed");
    assert_eq!(updated.script, "echo 2\n");
    assert_eq!(updated.created, script.created);
}

#[tokio::test]
async fn update_unknown_is_not_found() {
    let (_dir, store) = open_store().await;

    let err = store
        .update("deadbeef", UpdateScript::default())
        .await
        .unwrap_err();

    assert_matches!(err, StoreError::NotFound(_));
}

#[tokio::test]
async fn delete_removes_directory() {
    let (_dir, store) = open_store().await;
    let script = store.create(create("gone", None)).await.expect("create");

    store.delete(&script.id).await.expect("delete");

    assert!(!store.root().join(&script.id).exists());
    assert_matches!(store.delete(&script.id).await, Err(StoreError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_returns_absolute_script_path() {
    let (_dir, store) = open_store().await;
    let script = store.create(create("run me", None)).await.expect("create");

    let path = store.resolve(&script.id).await.expect("resolve");

    assert!(path.is_absolute());
    assert!(path.ends_with(format!("{}/script", script.id)));
}

#[tokio::test]
async fn resolve_unknown_or_traversal_is_not_found() {
    let (_dir, store) = open_store().await;

    assert_matches!(
        store.resolve("deadbeef").await,
        Err(CoreError::NotFound { entity: "script", .. })
    );
    assert_matches!(
        store.resolve("../../etc").await,
        Err(CoreError::NotFound { entity: "script", .. })
    );
}
