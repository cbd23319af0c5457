//! Dependency-ordered task readiness tracking.
//!
//! No original-source equivalent exists for this component; it is built
//! directly from the specification's description of a dependency DAG
//! seeded at one root, with prerequisite-complete-and-dependency-ready
//! promotion cascading breadth-first through dependents, and depth-bounded
//! pruning of fully-resolved ancestors.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use tokio::sync::{Mutex, Notify};

use crate::cancel::CancelToken;
use crate::error::PrepareError;
use crate::prereq::PrerequisiteSet;

/// Configuration for an [`OrderedTaskPreparation`].
#[derive(Debug, Clone)]
pub struct PrepareConfig<P> {
    /// The fixed set of prerequisite kinds every registered task declares.
    pub prerequisite_kinds: HashSet<P>,
    /// How many depths of fully-ready ancestry to retain behind the
    /// shallowest still-unready task.
    pub max_depth: u64,
}

impl<P> PrepareConfig<P> {
    pub fn new(prerequisite_kinds: HashSet<P>) -> Self {
        Self {
            prerequisite_kinds,
            max_depth: 10_000,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u64) -> Self {
        self.max_depth = max_depth;
        self
    }
}

struct TaskRecord<T, Id, P> {
    task: T,
    dependency: Id,
    dependents: Vec<Id>,
    depth: u64,
    prereqs: PrerequisiteSet<P>,
    ready: bool,
}

struct Inner<T, Id, P> {
    tasks: HashMap<Id, TaskRecord<T, Id, P>>,
    depth_index: HashMap<u64, HashSet<Id>>,
    ready_queue: VecDeque<T>,
    oldest_tracked_depth: u64,
    seeded: bool,
}

/// Tracks readiness of tasks arranged in a dependency DAG rooted at one
/// seed, where a task becomes ready once its own prerequisites are
/// complete and its dependency (parent) is ready.
pub struct OrderedTaskPreparation<T, Id, P, IdOf, DepOf> {
    config: PrepareConfig<P>,
    id_of: IdOf,
    dependency_of: DepOf,
    inner: Mutex<Inner<T, Id, P>>,
    ready_available: Notify,
    _marker: std::marker::PhantomData<fn(&T) -> (Id, Id)>,
}

impl<T, Id, P, IdOf, DepOf> OrderedTaskPreparation<T, Id, P, IdOf, DepOf>
where
    T: Clone + Send + 'static,
    Id: Clone + Eq + Hash + Send + 'static,
    P: Copy + Eq + Hash + Send + 'static,
    IdOf: Fn(&T) -> Id,
    DepOf: Fn(&T) -> Id,
{
    pub fn new(config: PrepareConfig<P>, id_of: IdOf, dependency_of: DepOf) -> Self {
        Self {
            config,
            id_of,
            dependency_of,
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                depth_index: HashMap::new(),
                ready_queue: VecDeque::new(),
                oldest_tracked_depth: 0,
                seeded: false,
            }),
            ready_available: Notify::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Seeds the dependency root at depth 0, marked ready and
    /// prerequisite-complete. Permitted exactly once, and only before any
    /// `register_tasks` call.
    pub async fn set_finished_dependency(&self, seed: T) -> Result<(), PrepareError> {
        let mut inner = self.inner.lock().await;
        if inner.seeded {
            return Err(PrepareError::AlreadyPrimed);
        }
        let id = (self.id_of)(&seed);
        let mut prereqs = PrerequisiteSet::new(self.config.prerequisite_kinds.clone());
        prereqs.set_complete();
        inner.tasks.insert(
            id.clone(),
            TaskRecord {
                task: seed,
                dependency: id.clone(),
                dependents: Vec::new(),
                depth: 0,
                prereqs,
                ready: true,
            },
        );
        inner.depth_index.entry(0).or_default().insert(id);
        inner.seeded = true;
        Ok(())
    }

    /// Registers `tasks`, each recorded UNREADY at `parent.depth + 1`.
    pub async fn register_tasks(&self, tasks: Vec<T>) -> Result<(), PrepareError> {
        let mut inner = self.inner.lock().await;
        for task in tasks {
            let id = (self.id_of)(&task);
            let dep_id = (self.dependency_of)(&task);
            let parent_depth = inner
                .tasks
                .get(&dep_id)
                .ok_or(PrepareError::UnknownDependency)?
                .depth;
            let depth = parent_depth + 1;
            inner
                .tasks
                .get_mut(&dep_id)
                .expect("checked above")
                .dependents
                .push(id.clone());
            let prereqs = PrerequisiteSet::new(self.config.prerequisite_kinds.clone());
            inner.tasks.insert(
                id.clone(),
                TaskRecord {
                    task,
                    dependency: dep_id,
                    dependents: Vec::new(),
                    depth,
                    prereqs,
                    ready: false,
                },
            );
            inner.depth_index.entry(depth).or_default().insert(id);
        }
        Ok(())
    }

    /// Marks `kind` complete on each of `ids`, promoting and cascading any
    /// task that becomes both prerequisite-complete and dependency-ready.
    pub async fn finish_prereq(&self, kind: P, ids: Vec<Id>) -> Result<(), PrepareError> {
        let mut inner = self.inner.lock().await;
        for id in &ids {
            if !inner.tasks.contains_key(id) {
                return Err(PrepareError::UnknownTask);
            }
        }
        for id in ids {
            inner.tasks.get_mut(&id).expect("checked above").prereqs.finish(kind)?;
            self.try_promote(&mut inner, id);
        }
        if !inner.ready_queue.is_empty() {
            self.ready_available.notify_one();
        }
        Ok(())
    }

    /// Breadth-first promotion cascade starting from `id`: if ready, enqueue
    /// it and consider its dependents next.
    fn try_promote(&self, inner: &mut Inner<T, Id, P>, id: Id) {
        let mut frontier = VecDeque::new();
        frontier.push_back(id);
        let mut max_ready_depth: Option<u64> = None;

        while let Some(id) = frontier.pop_front() {
            let already_ready = inner.tasks.get(&id).map(|r| r.ready).unwrap_or(true);
            if already_ready {
                continue;
            }
            let dep_id = inner.tasks[&id].dependency.clone();
            // An ancestor that has been pruned is, by the pruning invariant,
            // guaranteed to have been ready -- treat its absence as ready.
            let dependency_ready = inner.tasks.get(&dep_id).map(|r| r.ready).unwrap_or(true);
            let prereqs_complete = inner.tasks[&id].prereqs.is_complete();
            if !(dependency_ready && prereqs_complete) {
                continue;
            }

            let record = inner.tasks.get_mut(&id).expect("present");
            record.ready = true;
            let depth = record.depth;
            let task = record.task.clone();
            let dependents = record.dependents.clone();

            inner.ready_queue.push_back(task);
            max_ready_depth = Some(max_ready_depth.map_or(depth, |d| d.max(depth)));
            frontier.extend(dependents);
        }

        if let Some(depth) = max_ready_depth {
            self.prune(inner, depth);
        }
    }

    fn prune(&self, inner: &mut Inner<T, Id, P>, ready_depth: u64) {
        let prune_floor = ready_depth.saturating_sub(self.config.max_depth);
        if prune_floor < inner.oldest_tracked_depth {
            return;
        }
        for depth in inner.oldest_tracked_depth..=prune_floor {
            let Some(ids) = inner.depth_index.remove(&depth) else {
                continue;
            };
            for id in ids {
                let record = inner.tasks.remove(&id);
                match record {
                    Some(r) if r.ready => {}
                    Some(_) => panic!(
                        "pruning invariant violated: task at depth {depth} dropped while still unready"
                    ),
                    None => {}
                }
            }
        }
        inner.oldest_tracked_depth = prune_floor + 1;
    }

    /// Suspends until at least one task has been promoted since the last
    /// drain, then returns every currently pending ready task, in promotion
    /// order.
    pub async fn ready_tasks(&self, token: &CancelToken) -> Result<Vec<T>, PrepareError> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if !inner.ready_queue.is_empty() {
                    return Ok(inner.ready_queue.drain(..).collect());
                }
            }
            tokio::select! {
                _ = self.ready_available.notified() => {}
                _ = token.cancelled() => return Err(PrepareError::Cancelled),
            }
        }
    }
}
