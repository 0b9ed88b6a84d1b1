use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Per-project mutual exclusion for rollup writes. All status and cost
/// mutations of one project serialize behind its entry here, so two
/// concurrent approvals can never interleave their read-modify-write
/// cycles.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, project_id: Uuid) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(project_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_project_serializes() {
        let locks = ProjectLocks::new();
        let project = Uuid::new_v4();

        let guard = locks.lock(project).await;
        let second = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(project).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!second.is_finished());
        drop(guard);
        second.await.unwrap();
    }

    #[tokio::test]
    async fn different_projects_do_not_block() {
        let locks = ProjectLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let _b = locks.lock(Uuid::new_v4()).await;
    }
}
