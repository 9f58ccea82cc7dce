use std::collections::VecDeque;

use crate::descriptor::DescriptorStore;
use crate::error::ProbeResult;
use crate::interpreter::{self, WorkItem};
use crate::payload::LeafType;
use crate::probe::ProbeClient;

/// Breadth-first probing driver (spec.md §4.5).
///
/// The original tool drives this queue from a goroutine that enqueues while a second goroutine
/// drains it, with a 10-second quiescence timer closing the channel once it empties. Here the
/// same loop enqueues and drains, so the queue is provably empty exactly when there is no more
/// work left — the FIFO-plus-in-flight-counter equivalent spec.md §9 calls out as an acceptable,
/// non-timing-dependent substitute.
pub struct Driver<'a> {
    client: &'a ProbeClient,
    max_depth: i32,
}

impl<'a> Driver<'a> {
    pub fn new(client: &'a ProbeClient, max_depth: i32) -> Self {
        Driver { client, max_depth }
    }

    /// Drains the queue starting from `root`, mutating `store` until no work items remain.
    pub async fn run(&self, store: &mut DescriptorStore, root: WorkItem) -> ProbeResult<()> {
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        queue.push_back(root);

        while let Some(item) = queue.pop_front() {
            log::debug!(
                "probing package={} message={} index_path={:?}",
                item.package,
                item.message_dotted_path,
                item.index_path
            );

            // str-leaf probe first, then int-leaf, concatenated in that order (spec.md §4.4).
            let mut violations = self.client.probe(&item.index_path, LeafType::Str).await?;
            let int_violations = self.client.probe(&item.index_path, LeafType::Int).await?;
            violations.extend(int_violations);

            let children = interpreter::interpret(store, &item, &violations, self.max_depth);
            for child in children {
                queue.push_back(child);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_processes_in_breadth_first_order() {
        // A pure structural check: WorkItem construction and queue ordering, without a live
        // network dependency (ProbeClient requires one).
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        queue.push_back(WorkItem::root("pkg", "Request"));
        let root = queue.pop_front().unwrap();
        assert_eq!(root.message_dotted_path, "Request");
        assert!(root.index_path.is_empty());
    }
}
