//! Task store with optimistic updates.
//!
//! Every mutation is two-phase: apply to the in-memory list (and the local
//! cache) first, then persist to the remote collection. When the remote
//! rejects the change the pre-operation snapshot is restored and the failure
//! is returned as [`MutationOutcome::Failed`]; it is never raised as an error.
//!
//! While the remote is unreachable, changes are queued in an outbox and
//! replayed by [`TaskStore::reconcile`] once it is back (last writer wins).

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::StoreError;
use crate::fs::{CacheState, LocalCache, RemoteStore};
use crate::models::{PendingOp, Task, TaskDraft, TaskId, TaskPatch};

/// Result of the persist phase of a mutation.
#[derive(Debug)]
pub enum MutationOutcome {
    /// The remote collection accepted the change.
    Confirmed,
    /// Applied locally only: no remote configured, remote offline, or the
    /// change is queued behind a create that has not been confirmed yet.
    Local,
    /// The remote rejected the change and the local state was rolled back to
    /// `previous`.
    Failed {
        previous: Option<Task>,
        error: StoreError,
    },
}

impl MutationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MutationOutcome::Failed { .. })
    }
}

/// 对账结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub replayed: usize,
    pub failed: usize,
    /// Ops whose target no longer exists remotely.
    pub dropped: usize,
}

enum Persist<T> {
    LocalOnly,
    Deferred,
    Done(Result<T, StoreError>),
}

enum Rollback {
    Replace(Task),
    Reinsert { index: usize, task: Task },
}

pub struct TaskStore<R: RemoteStore> {
    tasks: Vec<Task>,
    outbox: Vec<PendingOp>,
    cache: LocalCache,
    remote: Option<R>,
    subscribers: Vec<Sender<Vec<Task>>>,
    default_include_last_day: bool,
}

impl<R: RemoteStore> TaskStore<R> {
    /// Load the cached list, then sync with the remote when it is reachable.
    /// A failed sync is logged and the cached list is kept.
    pub fn open(
        cache: LocalCache,
        remote: Option<R>,
        default_include_last_day: bool,
    ) -> Result<Self, StoreError> {
        let state = cache.load()?;
        let mut store = Self {
            tasks: state.tasks,
            outbox: state.outbox,
            cache,
            remote,
            subscribers: Vec::new(),
            default_include_last_day,
        };
        store.sort();
        store.adopt_local_tasks();

        if store.remote.is_none() {
            info!("event=store_open module=store status=ok mode=local_only");
        } else if store.is_online() {
            if let Err(e) = store.sync() {
                warn!("event=store_open module=store status=degraded error={}", e);
            }
        } else {
            warn!("event=store_open module=store status=offline using=cache");
        }

        Ok(store)
    }

    /// 本地模式下创建的任务从未进入队列，接入远端后补排创建操作
    fn adopt_local_tasks(&mut self) {
        if self.remote.is_none() {
            return;
        }

        let mut orphans: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.id.is_provisional())
            .filter(|t| {
                !self
                    .outbox
                    .iter()
                    .any(|op| matches!(op, PendingOp::Create { task } if task.id == t.id))
            })
            .cloned()
            .collect();
        if orphans.is_empty() {
            return;
        }

        orphans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        info!(
            "event=store_adopt module=store status=queued tasks={}",
            orphans.len()
        );
        for task in orphans {
            self.outbox.push(PendingOp::Create { task });
        }
        self.save_cache();
    }

    pub fn is_online(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.is_available())
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Ordered by `created_at`, newest first.
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.completed)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.completed)
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.is_overdue(now))
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve(&self, input: &str) -> Option<TaskId> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Some(task) = self.tasks.iter().find(|t| t.id.as_str() == input) {
            return Some(task.id.clone());
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.as_str().starts_with(input));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id.clone()),
            _ => None,
        }
    }

    /// Push-style subscription: the receiver gets the current list right away
    /// and a fresh copy after every change, local or remote.
    pub fn subscribe(&mut self) -> Receiver<Vec<Task>> {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(self.tasks.clone());
        self.subscribers.push(tx);
        rx
    }

    /// Create a task. It is visible immediately under a provisional id; the
    /// remote id replaces it once the create is confirmed. A failed remote
    /// create keeps the task and queues it for the next reconcile.
    pub fn add(
        &mut self,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<(Task, MutationOutcome), StoreError> {
        let id = self.fresh_provisional_id(now);
        let task = draft.into_task(id, now, self.default_include_last_day)?;

        self.tasks.insert(0, task.clone());
        self.commit_local();

        let mut created = task;
        let outcome = match self.persist(|remote| remote.create(&created)) {
            Persist::LocalOnly => MutationOutcome::Local,
            Persist::Deferred => {
                self.enqueue(PendingOp::Create {
                    task: created.clone(),
                });
                MutationOutcome::Local
            }
            Persist::Done(Ok(remote_id)) => {
                self.replace_id(&created.id, &remote_id);
                created.id = remote_id;
                self.commit_local();
                MutationOutcome::Confirmed
            }
            Persist::Done(Err(e)) => {
                warn!(
                    "event=task_add module=store status=queued id={} error={}",
                    created.id, e
                );
                self.enqueue(PendingOp::Create {
                    task: created.clone(),
                });
                MutationOutcome::Local
            }
        };

        debug!("event=task_add module=store status=ok id={}", created.id);
        Ok((created, outcome))
    }

    pub fn update(&mut self, id: &TaskId, patch: TaskPatch) -> Result<MutationOutcome, StoreError> {
        patch.validate()?;
        let index = self.position(id)?;

        let previous = self.tasks[index].clone();
        self.tasks[index].apply(&patch);
        self.commit_local();

        let persisted = self.persist_for(id, |remote| remote.update(id, &patch));
        Ok(self.settle(
            persisted,
            PendingOp::Update {
                id: id.clone(),
                patch,
            },
            Rollback::Replace(previous),
        ))
    }

    pub fn toggle_completion(&mut self, id: &TaskId) -> Result<MutationOutcome, StoreError> {
        let index = self.position(id)?;
        let completed = !self.tasks[index].completed;
        self.update(id, TaskPatch::completion(completed))
    }

    pub fn remove(&mut self, id: &TaskId) -> Result<MutationOutcome, StoreError> {
        let index = self.position(id)?;
        let previous = self.tasks.remove(index);
        self.commit_local();

        if id.is_provisional() {
            // 远端从未见过这个任务，撤掉排队中的相关操作即可
            self.outbox.retain(|op| op.task_id() != id);
            self.save_cache();
            return Ok(MutationOutcome::Local);
        }

        let persisted = self.persist(|remote| remote.delete(id));
        Ok(self.settle(
            persisted,
            PendingOp::Delete { id: id.clone() },
            Rollback::Reinsert {
                index,
                task: previous,
            },
        ))
    }

    /// Replay the outbox and then pull the remote snapshot.
    pub fn sync(&mut self) -> Result<SyncReport, StoreError> {
        let report = if self.outbox.is_empty() {
            SyncReport::default()
        } else {
            self.reconcile()?
        };
        self.refresh()?;
        Ok(report)
    }

    /// Pull the remote snapshot and make it the local list. Queued changes
    /// are laid on top so nothing made offline disappears from view. On error
    /// the cached list stays untouched.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        let Some(remote) = self.remote.as_ref() else {
            return Ok(());
        };

        let mut tasks = remote.fetch_all()?;
        for op in &self.outbox {
            op.overlay(&mut tasks);
        }

        self.tasks = tasks;
        self.sort();
        self.commit_local();
        debug!(
            "event=store_refresh module=store status=ok tasks={}",
            self.tasks.len()
        );
        Ok(())
    }

    /// Replay queued changes in order. Confirmed creates swap their
    /// provisional id, and later ops aimed at that id are rewritten. Ops that
    /// fail stay queued; ops whose target vanished remotely are dropped.
    pub fn reconcile(&mut self) -> Result<SyncReport, StoreError> {
        if !self.is_online() {
            return Err(StoreError::Unavailable(
                "remote store is not reachable".to_string(),
            ));
        }

        let pending = std::mem::take(&mut self.outbox);
        let mut renamed: HashMap<TaskId, TaskId> = HashMap::new();
        let mut remaining = Vec::new();
        let mut report = SyncReport::default();

        for op in pending {
            let op = op.rewrite(&renamed);

            // 对应的创建还没成功，只能继续等
            if op.task_id().is_provisional() && !matches!(op, PendingOp::Create { .. }) {
                remaining.push(op);
                continue;
            }

            let result = match self.remote.as_mut() {
                Some(remote) => replay(remote, &op),
                None => Err(StoreError::Unavailable("no remote store".to_string())),
            };

            match result {
                Ok(Some(remote_id)) => {
                    let old_id = op.task_id().clone();
                    self.replace_id(&old_id, &remote_id);
                    renamed.insert(old_id, remote_id);
                    report.replayed += 1;
                }
                Ok(None) => report.replayed += 1,
                Err(StoreError::NotFound(id)) => {
                    warn!("event=reconcile module=store status=dropped id={}", id);
                    report.dropped += 1;
                }
                Err(e) => {
                    warn!(
                        "event=reconcile module=store status=failed id={} error={}",
                        op.task_id(),
                        e
                    );
                    report.failed += 1;
                    remaining.push(op);
                }
            }
        }

        self.outbox = remaining;
        self.commit_local();
        info!(
            "event=reconcile module=store status=ok replayed={} failed={} dropped={}",
            report.replayed, report.failed, report.dropped
        );
        Ok(report)
    }

    fn persist<T>(&mut self, op: impl FnOnce(&mut R) -> Result<T, StoreError>) -> Persist<T> {
        match self.remote.as_mut() {
            None => Persist::LocalOnly,
            Some(remote) if !remote.is_available() => Persist::Deferred,
            Some(remote) => Persist::Done(op(remote)),
        }
    }

    /// Like `persist`, but a task whose create is still queued cannot be
    /// touched remotely yet.
    fn persist_for<T>(
        &mut self,
        id: &TaskId,
        op: impl FnOnce(&mut R) -> Result<T, StoreError>,
    ) -> Persist<T> {
        if id.is_provisional() && self.remote.is_some() {
            return Persist::Deferred;
        }
        self.persist(op)
    }

    fn settle(
        &mut self,
        persisted: Persist<()>,
        queued: PendingOp,
        rollback: Rollback,
    ) -> MutationOutcome {
        match persisted {
            Persist::LocalOnly => MutationOutcome::Local,
            Persist::Deferred => {
                self.enqueue(queued);
                MutationOutcome::Local
            }
            Persist::Done(Ok(())) => MutationOutcome::Confirmed,
            // 检查时还在线，写入时断开：按离线处理
            Persist::Done(Err(StoreError::Unavailable(reason))) => {
                warn!(
                    "event=mutation module=store status=queued id={} error={}",
                    queued.task_id(),
                    reason
                );
                self.enqueue(queued);
                MutationOutcome::Local
            }
            Persist::Done(Err(error)) => {
                warn!(
                    "event=mutation module=store status=rolled_back id={} error={}",
                    queued.task_id(),
                    error
                );
                let previous = self.restore(rollback);
                self.commit_local();
                MutationOutcome::Failed { previous, error }
            }
        }
    }

    fn restore(&mut self, rollback: Rollback) -> Option<Task> {
        match rollback {
            Rollback::Replace(task) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    *slot = task.clone();
                }
                Some(task)
            }
            Rollback::Reinsert { index, task } => {
                if self.get(&task.id).is_none() {
                    let index = index.min(self.tasks.len());
                    self.tasks.insert(index, task.clone());
                }
                Some(task)
            }
        }
    }

    fn position(&self, id: &TaskId) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn fresh_provisional_id(&self, now: DateTime<Utc>) -> TaskId {
        let base = TaskId::provisional(now);
        let taken = |id: &TaskId| {
            self.get(id).is_some() || self.outbox.iter().any(|op| op.task_id() == id)
        };
        if !taken(&base) {
            return base;
        }

        let mut counter = 2;
        loop {
            let candidate = TaskId::new(format!("{}-{}", base, counter));
            if !taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn replace_id(&mut self, old: &TaskId, new: &TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == old) {
            task.id = new.clone();
        }
    }

    fn enqueue(&mut self, op: PendingOp) {
        debug!(
            "event=outbox_push module=store status=ok id={} pending={}",
            op.task_id(),
            self.outbox.len() + 1
        );
        self.outbox.push(op);
        self.save_cache();
    }

    fn sort(&mut self) {
        self.tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn commit_local(&mut self) {
        self.save_cache();
        self.notify();
    }

    fn save_cache(&self) {
        let state = CacheState {
            tasks: self.tasks.clone(),
            outbox: self.outbox.clone(),
        };
        // 缓存写失败不影响当前操作
        if let Err(e) = self.cache.save(&state) {
            warn!("event=cache_save module=store status=error error={}", e);
        }
    }

    fn notify(&mut self) {
        let snapshot = self.tasks.clone();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

fn replay<R: RemoteStore>(remote: &mut R, op: &PendingOp) -> Result<Option<TaskId>, StoreError> {
    match op {
        PendingOp::Create { task } => remote.create(task).map(Some),
        PendingOp::Update { id, patch } => remote.update(id, patch).map(|_| None),
        PendingOp::Delete { id } => remote.delete(id).map(|_| None),
    }
}
