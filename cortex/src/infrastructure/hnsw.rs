// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HNSW approximate nearest-neighbour index
//!
//! A multi-layer proximity graph over fixed-dimension `f32` vectors.
//! Every node draws its top layer by fair coin flips (capped at
//! `max_level`), so upper layers thin out roughly by half. Searches descend
//! greedily through the sparse upper layers and finish with a bounded
//! best-first search on layer 0.
//!
//! Results are approximate. Distances are Euclidean; similarity is reported
//! as `1 / (1 + distance)`.
//!
//! The index is not internally synchronised. Callers that share it wrap it in
//! a lock (see `StandardMemoryService`).

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

use hive_core::domain::node_config::IndexConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot index an empty vector")]
    EmptyVector,
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<K> {
    pub key: K,
    pub distance: f32,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
struct Node<K> {
    vector: Vec<f32>,
    /// Adjacency per layer, `0..=level`.
    neighbors: Vec<Vec<K>>,
}

impl<K> Node<K> {
    fn level(&self) -> usize {
        self.neighbors.len().saturating_sub(1)
    }
}

/// Heap entry ordered by distance only.
#[derive(Debug, Clone)]
struct Scored<K> {
    distance: f32,
    key: K,
}

impl<K> PartialEq for Scored<K> {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance) == Ordering::Equal
    }
}

impl<K> Eq for Scored<K> {}

impl<K> PartialOrd for Scored<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Scored<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug)]
pub struct HnswIndex<K> {
    dimensions: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    max_level_cap: usize,
    nodes: HashMap<K, Node<K>>,
    entry_point: Option<K>,
    max_level: usize,
    rng: StdRng,
}

impl<K> HnswIndex<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new(dimensions: usize, config: &IndexConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            dimensions,
            m: config.m.max(1),
            ef_construction: config.ef_construction.max(1),
            ef_search: config.ef_search.max(1),
            max_level_cap: config.max_level,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
            rng,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    /// The stored vector for `key`.
    pub fn get(&self, key: &K) -> Option<&[f32]> {
        self.nodes.get(key).map(|node| node.vector.as_slice())
    }

    /// Highest populated layer.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    fn validate(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.is_empty() {
            return Err(IndexError::EmptyVector);
        }
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level < self.max_level_cap && self.rng.random_bool(0.5) {
            level += 1;
        }
        level
    }

    /// Insert `vector` under `key`, replacing any previous vector for it.
    pub fn insert(&mut self, key: K, vector: Vec<f32>) -> Result<(), IndexError> {
        self.validate(&vector)?;
        if self.nodes.contains_key(&key) {
            self.remove(&key);
        }

        let level = self.random_level();
        let Some(entry) = self.entry_point.clone() else {
            self.nodes.insert(
                key.clone(),
                Node {
                    vector,
                    neighbors: vec![Vec::new(); level + 1],
                },
            );
            self.entry_point = Some(key);
            self.max_level = level;
            return Ok(());
        };

        let mut entry_points = vec![entry];
        for layer in (level + 1..=self.max_level).rev() {
            entry_points = self.greedy_step(&vector, entry_points, layer);
        }

        let mut links: Vec<Vec<K>> = vec![Vec::new(); level + 1];
        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(&vector, &entry_points, self.ef_construction, layer);
            links[layer] = candidates
                .iter()
                .filter(|c| c.key != key)
                .take(self.m)
                .map(|c| c.key.clone())
                .collect();
            entry_points = candidates.into_iter().map(|c| c.key).collect();
        }

        self.nodes.insert(
            key.clone(),
            Node {
                vector,
                neighbors: links.clone(),
            },
        );

        for (layer, neighbors) in links.iter().enumerate() {
            for neighbor in neighbors {
                let degree = match self.nodes.get_mut(neighbor).and_then(|n| n.neighbors.get_mut(layer)) {
                    Some(list) => {
                        list.push(key.clone());
                        list.len()
                    }
                    None => continue,
                };
                if degree > 2 * self.m {
                    self.prune(neighbor, layer);
                }
            }
        }

        if level > self.max_level {
            self.entry_point = Some(key);
            self.max_level = level;
        }
        Ok(())
    }

    /// Keep only the `m` closest neighbours of `key` on `layer`. Dropped
    /// links are removed in both directions, except where that would leave
    /// the neighbour with no links on the layer.
    fn prune(&mut self, key: &K, layer: usize) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let Some(list) = node.neighbors.get(layer) else {
            return;
        };

        let mut scored: Vec<Scored<K>> = list
            .iter()
            .filter_map(|n| {
                self.nodes.get(n).map(|other| Scored {
                    distance: euclidean_distance(&node.vector, &other.vector),
                    key: n.clone(),
                })
            })
            .collect();
        scored.sort();

        let mut kept = Vec::with_capacity(self.m);
        let mut dropped = Vec::new();
        for (rank, candidate) in scored.into_iter().enumerate() {
            let sole_link = self
                .nodes
                .get(&candidate.key)
                .and_then(|n| n.neighbors.get(layer))
                .is_some_and(|links| links.len() <= 1);
            if rank < self.m || sole_link {
                kept.push(candidate.key);
            } else {
                dropped.push(candidate.key);
            }
        }

        for other in &dropped {
            if let Some(links) = self.nodes.get_mut(other).and_then(|n| n.neighbors.get_mut(layer)) {
                links.retain(|k| k != key);
            }
        }
        if let Some(list) = self.nodes.get_mut(key).and_then(|n| n.neighbors.get_mut(layer)) {
            *list = kept;
        }
    }

    /// Remove `key`. Returns whether it was present. Links are kept
    /// symmetric, so the node's own adjacency names every node that points
    /// back at it.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(node) = self.nodes.remove(key) else {
            return false;
        };

        for (layer, neighbors) in node.neighbors.iter().enumerate() {
            for neighbor in neighbors {
                if let Some(list) = self.nodes.get_mut(neighbor).and_then(|n| n.neighbors.get_mut(layer)) {
                    list.retain(|k| k != key);
                }
            }
        }

        if self.entry_point.as_ref() == Some(key) {
            let replacement = self
                .nodes
                .iter()
                .max_by_key(|(_, n)| n.level())
                .map(|(k, n)| (k.clone(), n.level()));
            match replacement {
                Some((next, level)) => {
                    self.entry_point = Some(next);
                    self.max_level = level;
                }
                None => {
                    self.entry_point = None;
                    self.max_level = 0;
                }
            }
        }
        true
    }

    /// The `k` approximate nearest neighbours of `query`, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<K>>, IndexError> {
        self.validate(query)?;
        let Some(entry) = self.entry_point.clone() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut entry_points = vec![entry];
        for layer in (1..=self.max_level).rev() {
            entry_points = self.greedy_step(query, entry_points, layer);
        }

        let hits = self
            .search_layer(query, &entry_points, self.ef_search.max(k), 0)
            .into_iter()
            .take(k)
            .map(|s| SearchHit {
                key: s.key,
                distance: s.distance,
                similarity: 1.0 / (1.0 + s.distance),
            })
            .collect();
        Ok(hits)
    }

    fn greedy_step(&self, query: &[f32], entry_points: Vec<K>, layer: usize) -> Vec<K> {
        match self.search_layer(query, &entry_points, 1, layer).into_iter().next() {
            Some(best) => vec![best.key],
            None => entry_points,
        }
    }

    /// Best-first search on one layer. Returns up to `ef` nodes sorted by
    /// ascending distance. Adjacency entries for missing nodes are skipped.
    fn search_layer(&self, query: &[f32], entry_points: &[K], ef: usize, layer: usize) -> Vec<Scored<K>> {
        let mut visited: HashSet<K> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<Scored<K>>> = BinaryHeap::new();
        let mut results: BinaryHeap<Scored<K>> = BinaryHeap::new();

        for key in entry_points {
            if !visited.insert(key.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(key) {
                let scored = Scored {
                    distance: euclidean_distance(query, &node.vector),
                    key: key.clone(),
                };
                candidates.push(Reverse(scored.clone()));
                results.push(scored);
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            let furthest = results.peek().map_or(f32::INFINITY, |s| s.distance);
            if current.distance > furthest && results.len() >= ef {
                break;
            }

            let Some(neighbors) = self.nodes.get(&current.key).and_then(|n| n.neighbors.get(layer)) else {
                continue;
            };
            for neighbor in neighbors {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let Some(node) = self.nodes.get(neighbor) else {
                    continue;
                };
                let distance = euclidean_distance(query, &node.vector);
                let furthest = results.peek().map_or(f32::INFINITY, |s| s.distance);
                if results.len() < ef || distance < furthest {
                    let scored = Scored {
                        distance,
                        key: neighbor.clone(),
                    };
                    candidates.push(Reverse(scored.clone()));
                    results.push(scored);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }
}
