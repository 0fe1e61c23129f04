//! Learned world model used for Dyna-style planning
//!
//! Three structures live here:
//! - the deterministic transition model `(state, action) -> (reward, next_state)`,
//! - the predecessor graph `state -> {(state, action) leading to it}`,
//! - a max-priority queue that holds each `(state, action)` pair at most once.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

use crate::action::ActionKey;
use crate::state::StateKey;

/// Default minimum priority for a pair to be queued
pub const DEFAULT_THETA: f64 = 1e-4;

/// Discretized (state, action) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateActionKey {
    pub state: StateKey,
    pub action: ActionKey,
}

impl StateActionKey {
    pub fn new(state: StateKey, action: ActionKey) -> Self {
        StateActionKey { state, action }
    }
}

/// Last observed outcome of a (state, action) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub reward: f64,
    pub next_state: StateKey,
}

#[derive(Debug)]
struct QueueEntry<K> {
    priority: f64,
    sequence: u64,
    key: K,
}

impl<K> PartialEq for QueueEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for QueueEntry<K> {}

impl<K> PartialOrd for QueueEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for QueueEntry<K> {
    // Highest priority first, ties broken by insertion order
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Deduplicating max-priority queue.
///
/// A key already waiting in the queue keeps its original priority; later
/// pushes of the same key are ignored until it has been popped.
#[derive(Debug)]
pub struct ModelPriorityQueue<K> {
    heap: BinaryHeap<QueueEntry<K>>,
    pending: HashSet<K>,
    theta: f64,
    next_sequence: u64,
}

impl<K: Clone + Eq + Hash> ModelPriorityQueue<K> {
    pub fn new(theta: f64) -> Self {
        ModelPriorityQueue {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            theta,
            next_sequence: 0,
        }
    }

    /// Queue `key` if `priority > theta` and the key is not already waiting.
    /// Returns whether the key was inserted.
    pub fn push(&mut self, priority: f64, key: K) -> bool {
        if !(priority > self.theta) || self.pending.contains(&key) {
            return false;
        }

        self.pending.insert(key.clone());
        self.heap.push(QueueEntry {
            priority,
            sequence: self.next_sequence,
            key,
        });
        self.next_sequence += 1;
        true
    }

    /// Remove and return the highest-priority entry
    pub fn pop(&mut self) -> Option<(f64, K)> {
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.key);
        Some((entry.priority, entry.key))
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Transition model, predecessor graph and sweep queue
#[derive(Debug)]
pub struct PlanningStore {
    model: HashMap<StateActionKey, Transition>,
    predecessors: HashMap<StateKey, BTreeSet<StateActionKey>>,
    queue: ModelPriorityQueue<StateActionKey>,
}

impl PlanningStore {
    pub fn new(theta: f64) -> Self {
        PlanningStore {
            model: HashMap::new(),
            predecessors: HashMap::new(),
            queue: ModelPriorityQueue::new(theta),
        }
    }

    /// Store the latest outcome of `pair`, overwriting any earlier one,
    /// and register `pair` as a predecessor of the next state.
    ///
    /// An overwritten transition leaves its old predecessor edge in place.
    pub fn record(&mut self, pair: StateActionKey, transition: Transition) {
        self.model.insert(pair, transition);
        self.predecessors
            .entry(transition.next_state)
            .or_default()
            .insert(pair);
    }

    pub fn transition(&self, pair: &StateActionKey) -> Option<&Transition> {
        self.model.get(pair)
    }

    /// Pairs known to lead into `state`, in deterministic order
    pub fn predecessors_of(&self, state: &StateKey) -> impl Iterator<Item = &StateActionKey> {
        self.predecessors.get(state).into_iter().flatten()
    }

    pub fn push(&mut self, priority: f64, pair: StateActionKey) -> bool {
        self.queue.push(priority, pair)
    }

    pub fn pop(&mut self) -> Option<(f64, StateActionKey)> {
        self.queue.pop()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn model_len(&self) -> usize {
        self.model.len()
    }

    pub fn predecessor_edge_count(&self) -> usize {
        self.predecessors.values().map(BTreeSet::len).sum()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (&StateActionKey, &Transition)> {
        self.model.iter()
    }
}
