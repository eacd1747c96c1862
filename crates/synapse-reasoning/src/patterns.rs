use synapse_core::entity::Graph;
use synapse_core::numeric::round_to;
use synapse_core::reasoning::{AnomalyKind, ImplicitRelation, StructuralAnomaly};

use crate::view::GraphView;

/// Node weight above which an unconnected node is worth flagging.
pub const IMPORTANT_WEIGHT: f64 = 1.5;
pub const HUB_FACTOR: f64 = 2.0;
pub const MIN_SHARED_NEIGHBORS: usize = 2;
pub const TOP_IMPLICIT_RELATIONS: usize = 5;

/// Hubs (degree above twice the mean) and important nodes with no links.
pub fn detect_anomalies(graph: &Graph) -> Vec<StructuralAnomaly> {
    let view = GraphView::new(graph);
    let mean = view.mean_degree();
    let mut anomalies = Vec::new();

    for i in 0..view.len() {
        let node = view.node(i);
        let degree = view.degree(i);
        let weight = view.weight(i);
        if degree > 0 && degree as f64 > HUB_FACTOR * mean {
            anomalies.push(StructuralAnomaly {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: AnomalyKind::Hub,
                degree,
                weight,
                description: format!(
                    "'{}' has {} connections, more than twice the average of {:.1}",
                    node.name, degree, mean
                ),
            });
        } else if degree == 0 && weight > IMPORTANT_WEIGHT {
            anomalies.push(StructuralAnomaly {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: AnomalyKind::IsolatedImportant,
                degree,
                weight,
                description: format!(
                    "'{}' carries weight {:.2} but has no connections",
                    node.name,
                    round_to(weight, 2)
                ),
            });
        }
    }

    anomalies.sort_by(|a, b| b.degree.cmp(&a.degree).then(b.weight.total_cmp(&a.weight)));
    anomalies
}

/// Unlinked pairs sharing at least two neighbors, most shared first.
pub fn mine_implicit_relations(graph: &Graph) -> Vec<ImplicitRelation> {
    let view = GraphView::new(graph);
    let neighbor_sets: Vec<Vec<usize>> = (0..view.len())
        .map(|i| {
            let mut set: Vec<usize> = view.neighbors(i).iter().map(|e| e.to).collect();
            set.sort_unstable();
            set
        })
        .collect();

    let mut found = Vec::new();
    for a in 0..view.len() {
        if neighbor_sets[a].len() < MIN_SHARED_NEIGHBORS {
            continue;
        }
        for b in a + 1..view.len() {
            if neighbor_sets[b].len() < MIN_SHARED_NEIGHBORS || view.connected(a, b) {
                continue;
            }
            let shared: Vec<usize> = neighbor_sets[a]
                .iter()
                .copied()
                .filter(|n| neighbor_sets[b].binary_search(n).is_ok())
                .collect();
            if shared.len() < MIN_SHARED_NEIGHBORS {
                continue;
            }
            found.push(ImplicitRelation {
                source: view.node(a).id.clone(),
                target: view.node(b).id.clone(),
                source_name: view.node(a).name.clone(),
                target_name: view.node(b).name.clone(),
                shared_neighbors: shared.iter().map(|&n| view.node(n).name.clone()).collect(),
            });
        }
    }

    found.sort_by(|x, y| {
        y.strength()
            .cmp(&x.strength())
            .then_with(|| x.source_name.cmp(&y.source_name))
            .then_with(|| x.target_name.cmp(&y.target_name))
    });
    found.truncate(TOP_IMPLICIT_RELATIONS);
    found
}
