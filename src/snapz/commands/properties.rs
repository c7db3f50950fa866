//! `get`, `set` and `inherit`.
//!
//! Edits go through a [`CommitNode`]: every assignment is staged on the
//! working copy first, so a bad value anywhere in a `set` leaves the stored
//! tree untouched. `--dry-run` stages, reports and rolls back.

use crate::commands::{CmdMessage, CmdResult, PropertySource, PropertyView};
use crate::diff::CommitNode;
use crate::error::{Result, SnapzError};
use crate::model::{names, Property, PropertyValue, RecordId, RecordTree};
use crate::model::property::format_timestamp;
use crate::store::DataStore;

pub fn get<S: DataStore>(
    store: &S,
    path: &str,
    property: Option<&str>,
    source_system: &str,
) -> Result<CmdResult> {
    let tree = store.load_or_default(source_system)?;
    let id = tree.lookup(path)?;
    let record = tree.get(id)?;

    let mut views = Vec::new();
    if let Some(info) = record.snapshot_info() {
        views.push(PropertyView {
            name: names::PERIOD.to_string(),
            value: info.period().to_string(),
            source: PropertySource::Identity,
        });
        views.push(PropertyView {
            name: names::TIMESTAMP.to_string(),
            value: format_timestamp(&info.timestamp()),
            source: PropertySource::Identity,
        });
    }

    let views = match property {
        Some(name) if views.iter().any(|v| v.name == name) => {
            views.into_iter().filter(|v| v.name == name).collect()
        }
        Some(name) => vec![view_of(&tree, id, tree.resolve_property(id, name)?)],
        None => {
            views.extend(record.properties().map(|prop| view_of(&tree, id, prop)));
            views
        }
    };

    Ok(CmdResult::default().with_properties(views))
}

fn view_of(tree: &RecordTree, id: RecordId, prop: &Property) -> PropertyView {
    let source = if id == tree.root() {
        PropertySource::Default
    } else if prop.is_local {
        PropertySource::Local
    } else {
        match prop.inherited_from {
            Some(from) if from != tree.root() => PropertySource::Inherited(tree.path(from)),
            _ => PropertySource::Default,
        }
    };
    PropertyView {
        name: prop.name.clone(),
        value: prop.value.to_string(),
        source,
    }
}

/// Parse `name=value`.
pub fn parse_assignment(raw: &str) -> Result<(String, PropertyValue)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| SnapzError::InvalidValue {
            property: raw.to_string(),
            value: "expected name=value".to_string(),
        })?;
    let name = name.trim();
    Ok((name.to_string(), PropertyValue::parse(name, value.trim())?))
}

pub fn set<S: DataStore>(
    store: &mut S,
    path: &str,
    assignments: &[String],
    dry_run: bool,
    source_system: &str,
) -> Result<CmdResult> {
    let tree = store.load_or_default(source_system)?;
    let id = tree.lookup(path)?;
    let mut node = CommitNode::new(tree, id)?;

    for raw in assignments {
        let (name, value) = parse_assignment(raw)?;
        node.update_working_property(&name, value)?;
    }

    finish(store, node, path, dry_run)
}

pub fn inherit<S: DataStore>(
    store: &mut S,
    path: &str,
    property: &str,
    dry_run: bool,
    source_system: &str,
) -> Result<CmdResult> {
    let tree = store.load_or_default(source_system)?;
    let id = tree.lookup(path)?;
    let mut node = CommitNode::new(tree, id)?;
    node.inherit_working_property(property)?;

    finish(store, node, path, dry_run)
}

fn finish<S: DataStore>(
    store: &mut S,
    mut node: CommitNode,
    path: &str,
    dry_run: bool,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if !node.is_modified() {
        result.add_message(CmdMessage::info(format!("{}: nothing changed", path)));
        return Ok(result);
    }

    let record = node.working_record()?;
    for name in node.changed_properties() {
        let value = record
            .value(&name)
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let line = format!("{} {} = {}", path, name, value);
        result.add_message(if dry_run {
            CmdMessage::info(format!("would set {}", line))
        } else {
            CmdMessage::success(line)
        });
    }

    if dry_run {
        node.copy_baseline_to_working();
        return Ok(result);
    }

    node.copy_working_to_baseline();
    store.save_tree(&node.into_baseline())?;
    tracing::info!(record = %path, "properties updated");
    result.affected.push(path.to_string());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordKind, SnapshotPeriod};
    use crate::store::memory::fixtures::{TreeFixture, SOURCE_SYSTEM};
    use crate::store::memory::InMemoryStore;

    fn store() -> InMemoryStore {
        TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_dataset("tank/home", RecordKind::FileSystem)
            .with_property("tank", names::RETENTION_DAILY, "7")
            .with_snapshot("tank/home", "s1", SnapshotPeriod::Daily, "2024-03-01T00:00:00Z")
            .store()
    }

    fn assignments(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn get_reports_provenance() {
        let store = store();
        let result = get(&store, "tank/home", None, SOURCE_SYSTEM).unwrap();

        let retention = result
            .properties
            .iter()
            .find(|p| p.name == names::RETENTION_DAILY)
            .unwrap();
        assert_eq!(retention.value, "7");
        assert_eq!(retention.source, PropertySource::Inherited("tank".into()));

        let enabled = result
            .properties
            .iter()
            .find(|p| p.name == names::ENABLED)
            .unwrap();
        assert_eq!(enabled.source, PropertySource::Default);
    }

    #[test]
    fn get_single_property() {
        let store = store();
        let result = get(&store, "tank", Some(names::RETENTION_DAILY), SOURCE_SYSTEM).unwrap();
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.properties[0].source, PropertySource::Local);
    }

    #[test]
    fn get_unknown_property_fails() {
        let store = store();
        assert!(matches!(
            get(&store, "tank", Some("user:missing"), SOURCE_SYSTEM),
            Err(SnapzError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn get_shows_snapshot_identity() {
        let store = store();
        let result = get(&store, "tank/home@s1", Some(names::PERIOD), SOURCE_SYSTEM).unwrap();
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.properties[0].value, "daily");
        assert_eq!(result.properties[0].source, PropertySource::Identity);
    }

    #[test]
    fn set_commits_all_assignments() {
        let mut store = store();
        let result = set(
            &mut store,
            "tank/home",
            &assignments(&["snapshot:enabled=yes", "snapshot:retention-hourly=12"]),
            false,
            SOURCE_SYSTEM,
        )
        .unwrap();

        assert_eq!(result.affected, vec!["tank/home"]);
        let tree = store.load_tree().unwrap().unwrap();
        let home = tree.lookup("tank/home").unwrap();
        assert!(tree.resolve_bool(home, names::ENABLED).unwrap());
        assert_eq!(tree.resolve_int(home, names::RETENTION_HOURLY).unwrap(), 12);
    }

    #[test]
    fn set_is_all_or_nothing() {
        let mut store = store();
        let result = set(
            &mut store,
            "tank/home",
            &assignments(&["snapshot:enabled=true", "snapshot:retention-hourly=lots"]),
            false,
            SOURCE_SYSTEM,
        );

        assert!(result.is_err());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn dry_run_does_not_save() {
        let mut store = store();
        let result = set(
            &mut store,
            "tank",
            &assignments(&["snapshot:enabled=true"]),
            true,
            SOURCE_SYSTEM,
        )
        .unwrap();

        assert!(result.affected.is_empty());
        assert!(result.messages[0].content.starts_with("would set"));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn setting_the_same_value_changes_nothing() {
        let mut store = store();
        let result = set(
            &mut store,
            "tank",
            &assignments(&["snapshot:retention-daily=7"]),
            false,
            SOURCE_SYSTEM,
        )
        .unwrap();
        assert!(result.affected.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn snapshot_identity_is_immutable() {
        let mut store = store();
        let result = set(
            &mut store,
            "tank/home@s1",
            &assignments(&["snapshot:period=hourly"]),
            false,
            SOURCE_SYSTEM,
        );
        assert!(matches!(result, Err(SnapzError::InvalidMutation { .. })));
    }

    #[test]
    fn inherit_restores_parent_value() {
        let mut store = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_dataset("tank/home", RecordKind::FileSystem)
            .with_property("tank", names::RETENTION_DAILY, "7")
            .with_property("tank/home", names::RETENTION_DAILY, "3")
            .store();

        inherit(&mut store, "tank/home", names::RETENTION_DAILY, false, SOURCE_SYSTEM).unwrap();

        let tree = store.load_tree().unwrap().unwrap();
        let home = tree.lookup("tank/home").unwrap();
        assert_eq!(tree.resolve_int(home, names::RETENTION_DAILY).unwrap(), 7);
        assert!(!tree.resolve_property(home, names::RETENTION_DAILY).unwrap().is_local);
    }

    #[test]
    fn inherit_without_parent_value_fails() {
        let mut store = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_property("tank", "user:note", "hello")
            .store();
        assert!(matches!(
            inherit(&mut store, "tank", "user:note", false, SOURCE_SYSTEM),
            Err(SnapzError::NoSuchProperty { .. })
        ));
    }

    #[test]
    fn assignments_need_an_equals_sign() {
        assert!(parse_assignment("snapshot:enabled").is_err());
        let (name, value) = parse_assignment(" snapshot:take = off ").unwrap();
        assert_eq!(name, names::TAKE);
        assert_eq!(value, PropertyValue::Bool(false));
    }
}
