//! Deferred work.
//!
//! Stands in for the host's microtask queue. Work queued here runs on the
//! next [`Scheduler::drain`], after the current edit has fully settled.
//! Queuing a task that is already pending does nothing, so the newest
//! request always wins and no task runs twice per turn.

use smallvec::SmallVec;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Rebuild the offset index against whatever the surface shows now.
    RebuildIndex,
    /// Convert pending highlight ranges and hand them to the surface.
    RenderHighlights,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` unless it is already pending. Returns true if queued.
    pub fn schedule(&mut self, task: Task) -> bool {
        if self.queue.contains(&task) {
            return false;
        }
        self.queue.push_back(task);
        true
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.queue.contains(&task)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued task in order. Tasks scheduled while the returned
    /// batch runs go into the next turn.
    pub fn drain(&mut self) -> SmallVec<[Task; 2]> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_pending_tasks() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.schedule(Task::RebuildIndex));
        assert!(scheduler.schedule(Task::RenderHighlights));
        assert!(!scheduler.schedule(Task::RebuildIndex));

        let batch = scheduler.drain();
        assert_eq!(batch.as_slice(), &[Task::RebuildIndex, Task::RenderHighlights]);
        assert!(scheduler.is_idle());
        assert!(scheduler.schedule(Task::RebuildIndex));
    }
}
