// Sync cycles against a scripted git executor: status transitions per open
// document and the calls that reach git.

mod common;

use common::{doc, fixture, fixture_with, write, ScriptedExecutor};
use quire_common::sync::SyncStatus;
use quire_engine::config::WorkspaceConfig;
use quire_engine::sync::SyncTrigger;

const CONFLICT_STDERR: &str = "CONFLICT (content): Merge conflict in a.md\nerror: could not apply 1a2b3c4... edit\n";

fn statuses(session: &quire_engine::session::EditorSession) -> Vec<(String, SyncStatus)> {
    session.documents().map(|open| (open.path.to_string(), open.sync_status())).collect()
}

#[tokio::test]
async fn clean_cycle_commits_pulls_pushes_and_settles_synced() {
    let fx = fixture(&[("a.md", "alpha\n"), ("b.md", "beta\n")]);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.edit_document(&doc("a.md"), "alpha v2\n".to_string()).await.unwrap();
    fx.engine.open_document(&doc("b.md")).await.unwrap();

    let outcome = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Synced);
    assert!(outcome.committed && outcome.pulled && outcome.pushed);
    assert_eq!(common::read(fx.root(), "a.md"), "alpha v2\n");
    let session = fx.engine.session().lock().await;
    assert_eq!(
        statuses(&session),
        vec![("a.md".to_string(), SyncStatus::Synced), ("b.md".to_string(), SyncStatus::Synced)]
    );
    assert!(!session.get(&doc("a.md")).unwrap().has_unsaved_changes);

    let subcommands = fx.git.subcommands();
    let tail: Vec<&str> = subcommands.iter().rev().take(6).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["add", "diff", "commit", "pull", "rev-list", "push"]);
}

#[tokio::test]
async fn pull_conflict_marks_every_open_document_and_reloads_it() {
    let git = ScriptedExecutor::default().fail_on("pull", CONFLICT_STDERR);
    let fx = fixture_with(&[("a.md", "mine\n"), ("b.md", "other\n")], WorkspaceConfig::default(), git);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.open_document(&doc("b.md")).await.unwrap();
    // What a stopped rebase leaves in the working tree.
    write(fx.root(), "a.md", "<<<<<<< HEAD\ntheirs\n=======\nmine\n>>>>>>> edit\n");

    let outcome = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Conflict);
    assert_eq!(outcome.conflicted_paths, vec![doc("a.md"), doc("b.md")]);
    assert!(outcome.error.as_deref().is_some_and(|message| message.contains("CONFLICT")));
    let session = fx.engine.session().lock().await;
    assert!(session.documents().all(|open| open.sync_status() == SyncStatus::Conflict));
    assert!(session.get(&doc("a.md")).unwrap().content.starts_with("<<<<<<< HEAD"));
    assert!(!fx.git.subcommands().contains(&"push".to_string()));
}

#[tokio::test]
async fn conflicted_workspace_refuses_to_sync_without_touching_git() {
    let git = ScriptedExecutor::default().fail_on("pull", CONFLICT_STDERR);
    let fx = fixture_with(&[("a.md", "a\n")], WorkspaceConfig::default(), git);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();
    let calls_before = fx.git.calls().len();

    let outcome = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Conflict);
    assert_eq!(outcome.conflicted_paths, vec![doc("a.md")]);
    assert_eq!(fx.git.calls().len(), calls_before);
}

#[tokio::test]
async fn unsaved_edits_block_sync_when_auto_save_is_off() {
    let mut config = WorkspaceConfig::default();
    config.sync.auto_save = false;
    let fx = fixture_with(&[("a.md", "a\n"), ("b.md", "b\n")], config, ScriptedExecutor::default());
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.open_document(&doc("b.md")).await.unwrap();
    fx.engine.edit_document(&doc("a.md"), "a, edited\n".to_string()).await.unwrap();
    let calls_before = fx.git.calls().len();

    let outcome = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Conflict);
    assert_eq!(outcome.conflicted_paths, vec![doc("a.md")]);
    assert_eq!(fx.git.calls().len(), calls_before);
    assert_eq!(common::read(fx.root(), "a.md"), "a\n");
    let session = fx.engine.session().lock().await;
    assert_eq!(
        statuses(&session),
        vec![("a.md".to_string(), SyncStatus::Conflict), ("b.md".to_string(), SyncStatus::Synced)]
    );
}

#[tokio::test]
async fn push_failure_leaves_documents_in_error_until_a_manual_retry() {
    let git = ScriptedExecutor::default().fail_on("push", "fatal: unable to access remote\n");
    let fx = fixture_with(&[("a.md", "a\n")], WorkspaceConfig::default(), git);
    fx.engine.open_document(&doc("a.md")).await.unwrap();

    let failed = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();
    assert_eq!(failed.status, SyncStatus::Error);
    assert!(failed.error.as_deref().is_some_and(|message| message.contains("unable to access")));
    assert_eq!(fx.engine.get_sync_status(&doc("a.md")).await.unwrap(), SyncStatus::Error);

    let calls_before = fx.git.calls().len();
    let skipped = fx.engine.sync_workspace("Auto-sync", SyncTrigger::Timer).await.unwrap();
    assert_eq!(skipped.status, SyncStatus::Error);
    assert_eq!(fx.git.calls().len(), calls_before);

    let retried = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();
    assert_eq!(retried.status, SyncStatus::Synced);
    assert_eq!(fx.engine.get_sync_status(&doc("a.md")).await.unwrap(), SyncStatus::Synced);
}

#[tokio::test]
async fn markers_left_after_a_clean_cycle_flag_only_that_document() {
    let fx = fixture(&[("a.md", "a\n"), ("b.md", "b\n")]);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.open_document(&doc("b.md")).await.unwrap();
    write(fx.root(), "b.md", "<<<<<<< ours\nx\n=======\ny\n>>>>>>> theirs\n");

    let outcome = fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Conflict);
    assert_eq!(outcome.conflicted_paths, vec![doc("b.md")]);
    let session = fx.engine.session().lock().await;
    assert_eq!(
        statuses(&session),
        vec![("a.md".to_string(), SyncStatus::Synced), ("b.md".to_string(), SyncStatus::Conflict)]
    );
}

#[tokio::test]
async fn no_document_is_left_syncing_whatever_the_outcome() {
    for failing in [None, Some("pull"), Some("commit"), Some("push")] {
        let git = match failing {
            Some(subcommand) => ScriptedExecutor::default().fail_on(subcommand, "fatal: boom\n"),
            None => ScriptedExecutor::default(),
        };
        let fx = fixture_with(&[("a.md", "a\n"), ("b/c.md", "c\n")], WorkspaceConfig::default(), git);
        fx.engine.open_document(&doc("a.md")).await.unwrap();
        fx.engine.open_document(&doc("b/c.md")).await.unwrap();

        fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

        let session = fx.engine.session().lock().await;
        assert!(
            session.documents().all(|open| open.sync_status() != SyncStatus::Syncing),
            "document left syncing after failure in {failing:?}"
        );
    }
}

#[tokio::test]
async fn abort_sync_returns_conflicted_documents_to_a_settled_state() {
    let git = ScriptedExecutor::default().fail_on("pull", CONFLICT_STDERR);
    let fx = fixture_with(&[("a.md", "a\n")], WorkspaceConfig::default(), git);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    fx.engine.abort_sync().await.unwrap();

    // The working tree is clean but the scripted remote is one commit behind.
    assert_eq!(fx.engine.get_sync_status(&doc("a.md")).await.unwrap(), SyncStatus::OutOfDate);
}

#[tokio::test]
async fn abort_with_everything_pushed_settles_synced() {
    let git = ScriptedExecutor::default()
        .fail_on("pull", CONFLICT_STDERR)
        .fail_on("rev-list", "fatal: bad revision\n")
        .fail_on("rev-parse", "fatal: needed a single revision\n");
    let fx = fixture_with(&[("a.md", "a\n")], WorkspaceConfig::default(), git);
    fx.engine.open_document(&doc("a.md")).await.unwrap();
    fx.engine.sync_workspace("Sync", SyncTrigger::Manual).await.unwrap();

    fx.engine.abort_sync().await.unwrap();

    assert_eq!(fx.engine.get_sync_status(&doc("a.md")).await.unwrap(), SyncStatus::Synced);
}

#[tokio::test]
async fn move_during_sync_keeps_both_the_unsaved_edit_and_the_rewrite() {
    let fx = fixture(&[("a.md", "see [[b.md]]\n"), ("b.md", "b\n")]);
    let a = doc("a.md");
    fx.engine.open_document(&a).await.unwrap();
    fx.engine.edit_document(&a, "see [[b.md]] plus my edit\n".to_string()).await.unwrap();

    let (from, to) = (doc("b.md"), doc("sub/b.md"));
    let (moved, synced) = tokio::join!(
        fx.engine.move_path(&from, &to, false),
        fx.engine.sync_workspace("Sync", SyncTrigger::Manual),
    );
    moved.unwrap();
    synced.unwrap();

    let expected = "see [[sub/b.md]] plus my edit\n";
    let session = fx.engine.session().lock().await;
    let tab = session.get(&a).unwrap();
    if tab.has_unsaved_changes {
        assert_eq!(tab.content, expected);
    } else {
        assert_eq!(common::read(fx.root(), "a.md"), expected);
        assert_eq!(tab.content, expected);
    }
}
