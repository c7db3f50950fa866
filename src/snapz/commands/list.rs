use crate::commands::{CmdResult, DatasetSummary};
use crate::error::Result;
use crate::model::{names, RecordId, RecordTree};
use crate::store::DataStore;

pub fn run<S: DataStore>(store: &S, source_system: &str) -> Result<CmdResult> {
    let tree = store.load_or_default(source_system)?;
    let listed = tree
        .datasets()
        .into_iter()
        .map(|id| summarize(&tree, id))
        .collect::<Result<Vec<_>>>()?;
    Ok(CmdResult::default().with_listed(listed))
}

fn summarize(tree: &RecordTree, id: RecordId) -> Result<DatasetSummary> {
    let snapshots = tree.sorted_snapshots(id)?;
    let latest_snapshot = match snapshots.last() {
        Some(newest) => Some(tree.snapshot_key(*newest)?.timestamp),
        None => None,
    };
    Ok(DatasetSummary {
        path: tree.path(id),
        kind: tree.get(id)?.kind(),
        enabled: tree.resolve_bool(id, names::ENABLED)?,
        take: tree.resolve_bool(id, names::TAKE)?,
        prune: tree.resolve_bool(id, names::PRUNE)?,
        recursion: tree.resolve_recursion(id, names::RECURSION)?,
        snapshot_count: snapshots.len(),
        latest_snapshot,
    })
}
