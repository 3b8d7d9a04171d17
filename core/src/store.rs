//! In-memory ordered task collection.
//!
//! Order is insertion order as the server returned or the client appended;
//! nothing here sorts. Counts are computed on demand.

use crate::types::Task;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard local state in favor of a full server listing.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn append(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Swap in `task` at the position of the task with `id`. Returns false
    /// when no such task exists any more.
    pub fn replace(&mut self, id: i64, task: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
