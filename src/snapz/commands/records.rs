use crate::commands::{split_dataset_path, CmdMessage, CmdResult};
use crate::error::{Result, SnapzError};
use crate::model::RecordKind;
use crate::store::DataStore;

/// Register a pool, filesystem or volume by path. Snapshots are only created
/// by `take`.
pub fn add<S: DataStore>(
    store: &mut S,
    path: &str,
    kind: RecordKind,
    source_system: &str,
) -> Result<CmdResult> {
    if kind == RecordKind::Snapshot || path.contains('@') {
        return Err(SnapzError::InvalidHierarchy(format!(
            "snapshots are created by `take`, not added ({})",
            path
        )));
    }

    let mut tree = store.load_or_default(source_system)?;
    let (parent_path, leaf) = split_dataset_path(path);
    let parent = tree.lookup(parent_path)?;
    tree.add_child(parent, leaf, kind)?;
    store.save_tree(&tree)?;

    let mut result = CmdResult::default();
    result.affected.push(path.to_string());
    result.add_message(CmdMessage::success(format!("Added {} {}", kind, path)));
    Ok(result)
}
