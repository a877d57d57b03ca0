//! Three-way reconciliation of a previous registry against live schema.
//!
//! Both registries key their rows by name (a table name, or a table/column
//! pair). [`reconcile`] walks the prior rows and the live objects together in
//! key order and tags every key exactly once.

use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled<K, P, L> {
    /// Live only: first time this key is seen.
    Added { key: K, live: L },
    /// Present on both sides.
    Retained { key: K, prior: P, live: L },
    /// Prior only: the database no longer reports it.
    Orphaned { key: K, prior: P },
}

impl<K, P, L> Reconciled<K, P, L> {
    pub fn key(&self) -> &K {
        match self {
            Reconciled::Added { key, .. }
            | Reconciled::Retained { key, .. }
            | Reconciled::Orphaned { key, .. } => key,
        }
    }
}

/// Output is sorted by key; each key of either input appears once.
pub fn reconcile<K, P, L>(prior: BTreeMap<K, P>, live: BTreeMap<K, L>) -> Vec<Reconciled<K, P, L>>
where
    K: Ord,
{
    prior
        .into_iter()
        .merge_join_by(live, |(p, _), (l, _)| p.cmp(l))
        .map(|pair| match pair {
            EitherOrBoth::Both((key, prior), (_, live)) => Reconciled::Retained { key, prior, live },
            EitherOrBoth::Left((key, prior)) => Reconciled::Orphaned { key, prior },
            EitherOrBoth::Right((key, live)) => Reconciled::Added { key, live },
        })
        .collect()
}

/// Names sorted into what happened to them, for the run summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally<K> {
    pub added: Vec<K>,
    pub retained: Vec<K>,
    pub removed: Vec<K>,
}

impl<K: Clone> Tally<K> {
    pub fn record<P, L>(&mut self, outcome: &Reconciled<K, P, L>) {
        let key = outcome.key().clone();
        match outcome {
            Reconciled::Added { .. } => self.added.push(key),
            Reconciled::Retained { .. } => self.retained.push(key),
            Reconciled::Orphaned { .. } => self.removed.push(key),
        }
    }
}
