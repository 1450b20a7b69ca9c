//! Batch application of set requests and the commit step.
//!
//! Records are mutated in memory one at a time; the first failure stops the
//! batch. Persisting and reloading the daemon happen afterwards through
//! pluggable capabilities so the flow can run without a terminal or daemon.

use crate::db::{NodeDb, Selection};
use crate::entry::UNSET;
use crate::error::{ProvisionError, Result};
use crate::mutate::SetRequest;

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Commits the record store.
pub trait RecordStore {
    fn persist(&self) -> Result<()>;
}

/// Tells the provisioning daemon to reload its configuration.
pub trait DaemonReload {
    fn reload(&self) -> Result<()>;
}

impl RecordStore for NodeDb {
    fn persist(&self) -> Result<()> {
        NodeDb::persist(self)
    }
}

/// Confirmation that always answers the same way.
pub struct AssumeAnswer(pub bool);

impl Confirm for AssumeAnswer {
    fn confirm(&mut self, _question: &str) -> bool {
        self.0
    }
}

/// Apply `request` to every selected profile. Returns the modified ids.
pub fn apply_to_profiles(
    db: &mut NodeDb,
    selection: &Selection,
    request: &SetRequest,
) -> Result<Vec<String>> {
    let ids = db.select_profiles(selection)?;
    for id in &ids {
        tracing::debug!(profile = %id, "Modifying profile");
        let profile = db.profile_mut(id)?;
        request.apply(id, &mut profile.config)?;
    }
    tracing::info!(count = ids.len(), "Modified profiles");
    Ok(ids)
}

/// Apply `request` to every selected node, optionally re-pointing its profile.
///
/// `profile` may be [`UNSET`] to detach nodes from their profile.
pub fn apply_to_nodes(
    db: &mut NodeDb,
    selection: &Selection,
    request: &SetRequest,
    profile: Option<&str>,
) -> Result<Vec<String>> {
    if let Some(name) = profile {
        if name != UNSET && db.profile(name).is_none() {
            return Err(ProvisionError::NotFound {
                kind: "profile",
                name: name.to_string(),
            });
        }
    }
    let ids = db.select_nodes(selection)?;
    for id in &ids {
        tracing::debug!(node = %id, "Modifying node");
        let node = db.node_mut(id)?;
        request.apply(id, &mut node.config)?;
        match profile {
            Some(UNSET) => node.profile = None,
            Some(name) => node.profile = Some(name.to_string()),
            None => {}
        }
    }
    tracing::info!(count = ids.len(), "Modified nodes");
    Ok(ids)
}

/// Persist and reload after a batch, asking first unless `assume_yes`.
///
/// Returns whether the changes were committed.
pub fn commit_changes<S: RecordStore + ?Sized>(
    store: &S,
    confirm: &mut dyn Confirm,
    reloader: &dyn DaemonReload,
    assume_yes: bool,
    count: usize,
    kind: &str,
) -> Result<bool> {
    if count == 0 {
        return Ok(false);
    }
    let question = format!("Are you sure you want to modify {count} {kind}(s)");
    commit_confirmed(store, confirm, reloader, assume_yes, &question)
}

/// Ask `question` unless `assume_yes`, then persist and reload.
pub fn commit_confirmed<S: RecordStore + ?Sized>(
    store: &S,
    confirm: &mut dyn Confirm,
    reloader: &dyn DaemonReload,
    assume_yes: bool,
    question: &str,
) -> Result<bool> {
    if !assume_yes && !confirm.confirm(question) {
        tracing::info!("Changes discarded");
        return Ok(false);
    }
    persist_and_reload(store, reloader)?;
    Ok(true)
}

/// Write the record store, then tell the daemon.
pub fn persist_and_reload<S: RecordStore + ?Sized>(store: &S, reloader: &dyn DaemonReload) -> Result<()> {
    store
        .persist()
        .map_err(|e| ProvisionError::Other(format!("failed to persist node database: {e}")))?;
    reloader
        .reload()
        .map_err(|e| ProvisionError::Other(format!("failed to reload daemon: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingReload(Cell<usize>);

    impl DaemonReload for CountingReload {
        fn reload(&self) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    struct RecordingConfirm {
        questions: Vec<String>,
        answer: bool,
    }

    impl Confirm for RecordingConfirm {
        fn confirm(&mut self, question: &str) -> bool {
            self.questions.push(question.to_string());
            self.answer
        }
    }

    fn db_with_profiles(tmp: &TempDir) -> NodeDb {
        let mut db = NodeDb::new(&tmp.path().join("nodes.yaml"));
        db.add_profile("default").unwrap();
        db.add_profile("gpu").unwrap();
        db
    }

    #[test]
    fn test_apply_to_default_profile() {
        let tmp = TempDir::new().unwrap();
        let mut db = db_with_profiles(&tmp);
        let req = SetRequest {
            container: Some("rocky-9".to_string()),
            ..Default::default()
        };
        let ids = apply_to_profiles(&mut db, &Selection::DefaultProfile, &req).unwrap();
        assert_eq!(ids, vec!["default"]);
        assert_eq!(db.profile("default").unwrap().config.container_name.get(), "rocky-9");
        assert!(db.profile("gpu").unwrap().config.container_name.is_unset());
    }

    #[test]
    fn test_batch_stops_at_first_failure() {
        let tmp = TempDir::new().unwrap();
        let mut db = db_with_profiles(&tmp);
        db.profile_mut("default").unwrap().config.tags.set("rack", "1").unwrap();
        let req = SetRequest {
            comment: Some("x".to_string()),
            tag_deletes: vec!["rack".to_string()],
            ..Default::default()
        };
        // "default" succeeds, "gpu" has no such tag and fails.
        let err = apply_to_profiles(&mut db, &Selection::All, &req).unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution(_)));
        assert_eq!(db.profile("default").unwrap().config.comment.get(), "x");
        assert!(db.profile("gpu").unwrap().config.comment.is_unset());
    }

    #[test]
    fn test_apply_to_nodes_sets_profile() {
        let tmp = TempDir::new().unwrap();
        let mut db = db_with_profiles(&tmp);
        db.add_node("n1", Some("default")).unwrap();
        let sel = Selection::Named(vec!["n1".to_string()]);

        apply_to_nodes(&mut db, &sel, &SetRequest::new(), Some("gpu")).unwrap();
        assert_eq!(db.node("n1").unwrap().profile.as_deref(), Some("gpu"));

        apply_to_nodes(&mut db, &sel, &SetRequest::new(), Some(UNSET)).unwrap();
        assert_eq!(db.node("n1").unwrap().profile, None);

        assert!(apply_to_nodes(&mut db, &sel, &SetRequest::new(), Some("nope")).is_err());
    }

    #[test]
    fn test_commit_declined() {
        let tmp = TempDir::new().unwrap();
        let db = db_with_profiles(&tmp);
        let reload = CountingReload(Cell::new(0));
        let mut confirm = RecordingConfirm {
            questions: Vec::new(),
            answer: false,
        };

        let committed = commit_changes(&db, &mut confirm, &reload, false, 2, "profile").unwrap();
        assert!(!committed);
        assert_eq!(
            confirm.questions,
            vec!["Are you sure you want to modify 2 profile(s)"]
        );
        assert_eq!(reload.0.get(), 0);
        assert!(!db.path().exists());
    }

    #[test]
    fn test_commit_assume_yes_skips_prompt() {
        let tmp = TempDir::new().unwrap();
        let db = db_with_profiles(&tmp);
        let reload = CountingReload(Cell::new(0));
        let mut confirm = RecordingConfirm {
            questions: Vec::new(),
            answer: false,
        };

        let committed = commit_changes(&db, &mut confirm, &reload, true, 1, "profile").unwrap();
        assert!(committed);
        assert!(confirm.questions.is_empty());
        assert_eq!(reload.0.get(), 1);
        assert!(db.path().exists());
    }

    #[test]
    fn test_commit_confirmed() {
        let tmp = TempDir::new().unwrap();
        let db = db_with_profiles(&tmp);
        let reload = CountingReload(Cell::new(0));
        let committed =
            commit_changes(&db, &mut AssumeAnswer(true), &reload, false, 1, "node").unwrap();
        assert!(committed);
        assert_eq!(reload.0.get(), 1);
    }
}
