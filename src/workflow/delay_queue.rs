// ==========================================
// UMKM 餐饮经营自动化 - 延迟事件队列
// ==========================================
// 职责: 按到期时间保存延迟事件，到期后交回主队列
// 说明: 同一到期时间按入队顺序出队
// ==========================================

use crate::workflow::event::WorkflowEvent;
use chrono::NaiveDateTime;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug)]
struct DelayedEntry {
    due_at: NaiveDateTime,
    seq: u64,
    event: WorkflowEvent,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.seq == other.seq
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_at
            .cmp(&other.due_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
pub struct DelayQueue {
    heap: BinaryHeap<Reverse<DelayedEntry>>,
    next_seq: u64,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorkflowEvent, due_at: NaiveDateTime) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(DelayedEntry { due_at, seq, event }));
    }

    /// 取出所有 due_at ≤ now 的事件（到期先后顺序）
    pub fn pop_due(&mut self, now: NaiveDateTime) -> Vec<WorkflowEvent> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(entry)| entry.due_at <= now)
        {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    /// 最早的到期时间
    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.heap.peek().map(|Reverse(entry)| entry.due_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_pop_due_in_deadline_then_insertion_order() {
        let mut queue = DelayQueue::new();
        queue.push(WorkflowEvent::order_completed("late", t0()), t0() + Duration::seconds(10));
        queue.push(WorkflowEvent::order_completed("a", t0()), t0() + Duration::seconds(5));
        queue.push(WorkflowEvent::order_completed("b", t0()), t0() + Duration::seconds(5));

        assert_eq!(queue.next_deadline(), Some(t0() + Duration::seconds(5)));
        assert!(queue.pop_due(t0()).is_empty());

        let due = queue.pop_due(t0() + Duration::seconds(5));
        let ids: Vec<_> = due.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);

        let due = queue.pop_due(t0() + Duration::seconds(60));
        assert_eq!(due.len(), 1);
        assert!(queue.is_empty());
    }
}
