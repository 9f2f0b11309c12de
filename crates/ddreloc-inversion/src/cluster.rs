//! Cluster extraction from the neighbor graph.

use crate::config::InversionConfig;
use ddreloc_core::EventId;
use ddreloc_linker::NeighborGraph;
use std::collections::BTreeMap;

/// Connected set of events relocated together, in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub events: Vec<EventId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.binary_search(id).is_ok()
    }
}

/// Connected components over pairs with at least OBSCC cc links or OBSCT
/// catalog links, largest first. With both thresholds at 0 every linked
/// event lands in a single cluster.
pub fn clusters(graph: &NeighborGraph, config: &InversionConfig) -> Vec<Cluster> {
    if !config.clustering_enabled() {
        let events: Vec<EventId> = graph.event_ids().cloned().collect();
        return if events.is_empty() {
            Vec::new()
        } else {
            vec![Cluster { events }]
        };
    }

    let mut forest = Forest::default();
    for pair in graph.pairs() {
        let cc = config.min_cc_links > 0 && pair.cc_links >= config.min_cc_links;
        let ct = config.min_ct_links > 0 && pair.ct_links >= config.min_ct_links;
        if cc || ct {
            forest.union(&pair.key.first, &pair.key.second);
        }
    }

    let mut components: BTreeMap<EventId, Vec<EventId>> = BTreeMap::new();
    let ids: Vec<EventId> = forest.parent.keys().cloned().collect();
    for id in ids {
        let root = forest.find(&id);
        components.entry(root).or_default().push(id);
    }

    let mut clusters: Vec<Cluster> = components
        .into_values()
        .map(|mut events| {
            events.sort();
            Cluster { events }
        })
        .collect();
    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.events[0].cmp(&b.events[0])));
    clusters
}

/// Union-find keyed by event id.
#[derive(Default)]
struct Forest {
    parent: BTreeMap<EventId, EventId>,
}

impl Forest {
    fn find(&mut self, id: &EventId) -> EventId {
        let mut root = id.clone();
        while let Some(parent) = self.parent.get(&root) {
            if parent == &root {
                break;
            }
            root = parent.clone();
        }
        // Path compression.
        let mut node = id.clone();
        while node != root {
            let next = self
                .parent
                .insert(node.clone(), root.clone())
                .unwrap_or_else(|| root.clone());
            node = next;
        }
        root
    }

    fn union(&mut self, a: &EventId, b: &EventId) {
        self.parent.entry(a.clone()).or_insert_with(|| a.clone());
        self.parent.entry(b.clone()).or_insert_with(|| b.clone());
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower id becomes the root.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent.insert(child, root);
        }
    }
}
