// Reconciliation planner: diff local documents against remote records.

use std::collections::{HashMap, HashSet};

use tracing::warn;
use vectorlink_common::types::{LocalDocument, RecordStatus, RemoteRecord};

/// Actions needed to bring the remote index in line with the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<LocalDocument>,
    pub to_update: Vec<(LocalDocument, RemoteRecord)>,
    pub to_delete: Vec<RemoteRecord>,
    /// Extra completed records for a document that keeps another one.
    pub to_prune: Vec<RemoteRecord>,
}

impl ReconciliationPlan {
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len() + self.to_prune.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the plan. Creates and updates follow `locals` order; deletes and
/// prunes follow `remotes` order. Records that are not `completed` are
/// ignored.
///
/// Each local document keeps one completed record: the first whose timestamp
/// matches, else the first listed, which is then updated. Every other
/// completed record with that name is pruned, so a duplicate left by an
/// interrupted update is removed on the next run.
pub fn plan(locals: &[LocalDocument], remotes: &[RemoteRecord]) -> ReconciliationPlan {
    let completed: Vec<&RemoteRecord> =
        remotes.iter().filter(|r| r.status == RecordStatus::Completed).collect();
    let mut by_name: HashMap<&str, Vec<&RemoteRecord>> = HashMap::new();
    for record in completed.iter().copied() {
        by_name.entry(record.name.as_str()).or_default().push(record);
    }

    let mut result = ReconciliationPlan::default();
    let mut kept: HashSet<&str> = HashSet::with_capacity(locals.len());
    let mut local_paths: HashSet<&str> = HashSet::with_capacity(locals.len());
    for doc in locals {
        local_paths.insert(doc.path.as_str());
        let Some(candidates) = by_name.get(doc.path.as_str()) else {
            result.to_create.push(doc.clone());
            continue;
        };
        let current = candidates.iter().copied().find(|r| r.updated_at == doc.last_modified);
        let keeper = match current {
            Some(record) => record,
            None => {
                let stale = candidates[0];
                result.to_update.push((doc.clone(), stale.clone()));
                stale
            }
        };
        if candidates.len() > 1 {
            warn!(
                name = %doc.path,
                kept = %keeper.external_id,
                extra = candidates.len() - 1,
                "pruning duplicate remote records"
            );
        }
        kept.insert(keeper.external_id.as_str());
    }

    for record in completed {
        if kept.contains(record.external_id.as_str()) {
            continue;
        }
        if local_paths.contains(record.name.as_str()) {
            result.to_prune.push(record.clone());
        } else {
            result.to_delete.push(record.clone());
        }
    }

    result
}
