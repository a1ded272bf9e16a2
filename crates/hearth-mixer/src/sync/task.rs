//! Deferred closures and the double-buffered queue that carries them
//!
//! Tasks move work across the thread boundary in one direction: the control
//! thread queues tasks that mutate mix-thread state, and the mix thread
//! queues tasks (events, node hand-backs) that run on the control thread.
//!
//! The queue holds two lists. Producers append to the shared list under a
//! mutex; the consumer swaps it with its own empty list under the same mutex
//! and then runs the detached tasks with the lock released, so a producer is
//! only ever blocked for an append or a swap.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::engine::SoundNode;

enum Action<C: ?Sized> {
    Plain(Box<dyn FnOnce(&mut C) + Send>),
    Node {
        node: Weak<dyn SoundNode>,
        action: Box<dyn FnOnce(&mut C, Arc<dyn SoundNode>) + Send>,
    },
}

/// A closure executed exactly once on the consuming thread
///
/// A task may be tied to a node through a weak reference. If the node is
/// gone by the time the task runs, the task is dropped without running.
pub struct AudioTask<C: ?Sized> {
    action: Action<C>,
}

impl<C: ?Sized> AudioTask<C> {
    pub fn new(action: impl FnOnce(&mut C) + Send + 'static) -> Self {
        Self {
            action: Action::Plain(Box::new(action)),
        }
    }

    /// Task that only runs while `node` is still alive
    pub fn with_node(
        node: &Arc<dyn SoundNode>,
        action: impl FnOnce(&mut C, Arc<dyn SoundNode>) + Send + 'static,
    ) -> Self {
        Self {
            action: Action::Node {
                node: Arc::downgrade(node),
                action: Box::new(action),
            },
        }
    }

    /// True if the task's node has been destroyed
    pub fn is_orphaned(&self) -> bool {
        match &self.action {
            Action::Plain(_) => false,
            Action::Node { node, .. } => node.strong_count() == 0,
        }
    }

    /// Run the task, consuming it
    pub fn run(self, context: &mut C) {
        match self.action {
            Action::Plain(action) => action(context),
            Action::Node { node, action } => match node.upgrade() {
                Some(node) => action(context, node),
                None => log::trace!("Skipping task for destroyed node"),
            },
        }
    }
}

impl<C: ?Sized> fmt::Debug for AudioTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.action {
            Action::Plain(_) => "plain",
            Action::Node { .. } => "node",
        };
        f.debug_struct("AudioTask").field("kind", &kind).finish()
    }
}

type TaskList<C> = Vec<AudioTask<C>>;

fn lock_list<C: ?Sized>(list: &Mutex<TaskList<C>>) -> MutexGuard<'_, TaskList<C>> {
    list.lock().unwrap_or_else(|poisoned| {
        log::warn!("Task queue mutex poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Create a task queue whose tasks operate on a `C`
pub fn task_queue<C: ?Sized>() -> (TaskSender<C>, TaskReceiver<C>) {
    let shared = Arc::new(Mutex::new(Vec::new()));
    (
        TaskSender {
            shared: Arc::clone(&shared),
        },
        TaskReceiver {
            shared,
            detached: Vec::new(),
        },
    )
}

/// Producer half. Cheap to clone; every clone appends to the same queue.
pub struct TaskSender<C: ?Sized> {
    shared: Arc<Mutex<TaskList<C>>>,
}

impl<C: ?Sized> Clone for TaskSender<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: ?Sized> TaskSender<C> {
    /// Queue a task
    pub fn push(&self, task: AudioTask<C>) {
        lock_list(&self.shared).push(task);
    }

    /// Queue a plain closure
    pub fn send(&self, action: impl FnOnce(&mut C) + Send + 'static) {
        self.push(AudioTask::new(action));
    }
}

/// Consumer half, owned by the thread that executes the tasks
pub struct TaskReceiver<C: ?Sized> {
    shared: Arc<Mutex<TaskList<C>>>,
    /// Spare list swapped in on every drain; keeps its capacity
    detached: TaskList<C>,
}

impl<C: ?Sized> TaskReceiver<C> {
    /// Execute every queued task in enqueue order
    ///
    /// Returns the number of tasks executed.
    pub fn drain_and_execute(&mut self, context: &mut C) -> usize {
        {
            let mut pending = lock_list(&self.shared);
            if pending.is_empty() {
                return 0;
            }
            std::mem::swap(&mut *pending, &mut self.detached);
        }

        let count = self.detached.len();
        for task in self.detached.drain(..) {
            task.run(context);
        }
        count
    }

    /// Number of tasks waiting for the next drain
    pub fn pending(&self) -> usize {
        lock_list(&self.shared).len()
    }
}
