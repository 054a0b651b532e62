use std::collections::VecDeque;

/// Work deferred until the current handler has returned.
///
/// The session drains it after each dispatch round, so a deferred item is
/// seen only once the mutation that scheduled it has fully propagated.
#[derive(Debug)]
pub struct TaskQueue<T> {
    queue: VecDeque<T>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn defer(&mut self, task: T) {
        self.queue.push_back(task);
    }

    pub fn drain(&mut self) -> Vec<T> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
