//! In-memory community detection and community annotation.

use std::collections::{BTreeMap, HashMap, HashSet};

use synapse_core::analysis::Community;
use synapse_core::entity::{category, Graph};
use synapse_core::numeric::{round_to, safe_div, safe_number};

/// Edge weight thresholds for the two connectivity passes.
pub const STRONG_EDGE: f64 = 0.4;
pub const WEAK_EDGE: f64 = 0.3;
const THEME_MEMBERS: usize = 3;

fn category_label(name: &str) -> &str {
    match name {
        category::CORE_CONCEPT => "Core concepts",
        category::PROFESSIONAL_TERM => "Professional terminology",
        category::BUSINESS_CONCEPT => "Business concepts",
        category::TOOL => "Tools and technology",
        category::PERSON => "People",
        category::ORGANIZATION => "Organizations",
        category::PRODUCT => "Products",
        category::KEY_PHRASE => "Key phrases",
        other => other,
    }
}

/// Connected components over edges heavier than `threshold`, restricted to
/// `allowed` nodes. Components are returned in node order.
fn components(graph: &Graph, allowed: &HashSet<usize>, threshold: f64) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = graph.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for link in &graph.links {
        if safe_number(link.weight, 0.0) <= threshold {
            continue;
        }
        let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) else {
            continue;
        };
        if s != t && allowed.contains(&s) && allowed.contains(&t) {
            adjacency[s].push(t);
            adjacency[t].push(s);
        }
    }

    let mut seen = vec![false; graph.nodes.len()];
    let mut found = Vec::new();
    for start in 0..graph.nodes.len() {
        if seen[start] || !allowed.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        seen[start] = true;
        while let Some(node) = stack.pop() {
            component.push(node);
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        component.sort_unstable();
        found.push(component);
    }
    found
}

/// Fills names, dominant category, coherence and theme for a member list.
/// Coherence is `0.6 x mean internal edge weight + 0.4 x dominant-category ratio`.
pub fn describe_community(graph: &Graph, id: usize, members: Vec<String>) -> Community {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    let nodes: Vec<_> = graph.nodes.iter().filter(|n| member_set.contains(n.id.as_str())).collect();

    let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for node in &nodes {
        *category_counts.entry(node.category.as_str()).or_default() += 1;
    }
    let (dominant_category, dominant_count) = category_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(c, n)| (c.to_string(), *n))
        .unwrap_or_default();

    let internal: Vec<f64> = graph
        .links
        .iter()
        .filter(|l| l.source != l.target && member_set.contains(l.source.as_str()) && member_set.contains(l.target.as_str()))
        .map(|l| safe_number(l.weight, 0.0))
        .collect();
    let mean_internal = safe_div(internal.iter().sum(), internal.len() as f64, 0.0);
    let category_ratio = safe_div(dominant_count as f64, nodes.len() as f64, 0.0);
    let coherence = round_to(0.6 * mean_internal + 0.4 * category_ratio, 4);

    let mut ranked = nodes.clone();
    ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    let leaders: Vec<&str> = ranked.iter().take(THEME_MEMBERS).map(|n| n.name.as_str()).collect();
    let theme = if leaders.is_empty() {
        category_label(&dominant_category).to_string()
    } else {
        format!("{} around {}", category_label(&dominant_category), leaders.join(", "))
    };

    Community {
        id,
        member_names: nodes.iter().map(|n| n.name.clone()).collect(),
        members: nodes.iter().map(|n| n.id.clone()).collect(),
        dominant_category,
        coherence,
        theme,
    }
}

/// Components over edges > 0.4, then over edges > 0.3 among the leftovers,
/// then category groups of whatever remains. Singletons are dropped.
pub fn detect_communities(graph: &Graph) -> Vec<Community> {
    let mut remaining: HashSet<usize> = (0..graph.nodes.len()).collect();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for threshold in [STRONG_EDGE, WEAK_EDGE] {
        for component in components(graph, &remaining, threshold) {
            if component.len() >= 2 {
                for i in &component {
                    remaining.remove(i);
                }
                groups.push(component);
            }
        }
    }

    let mut by_category: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut leftovers: Vec<usize> = remaining.into_iter().collect();
    leftovers.sort_unstable();
    for i in leftovers {
        by_category.entry(graph.nodes[i].category.as_str()).or_default().push(i);
    }
    groups.extend(by_category.into_values().filter(|g| g.len() >= 2));

    groups.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    groups
        .into_iter()
        .enumerate()
        .map(|(id, group)| {
            let members = group.iter().map(|&i| graph.nodes[i].id.clone()).collect();
            describe_community(graph, id, members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{Entity, NodeType, Relation};

    fn node(name: &str, cat: &str) -> Entity {
        Entity::new(name, NodeType::Concept, cat, 1.0)
    }

    #[test]
    fn test_threshold_passes_and_category_fallback() {
        let a = node("a", category::CORE_CONCEPT);
        let b = node("b", category::CORE_CONCEPT);
        let c = node("c", category::TOOL);
        let d = node("d", category::TOOL);
        let e = node("e", category::KEY_PHRASE);
        let f = node("f", category::KEY_PHRASE);
        let g = node("g", category::PERSON);
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone(), d.clone(), e.clone(), f.clone(), g],
            vec![
                Relation::new(&a.id, &b.id, "related_to", 0.8),
                Relation::new(&c.id, &d.id, "used_for", 0.35),
                Relation::new(&e.id, &a.id, "related_to", 0.2),
            ],
        );
        let communities = detect_communities(&graph);
        assert_eq!(communities.len(), 3);

        let strong = communities.iter().find(|c| c.members.contains(&a.id)).unwrap();
        assert_eq!(strong.members.len(), 2);
        assert_eq!(strong.dominant_category, category::CORE_CONCEPT);
        assert!((strong.coherence - (0.6 * 0.8 + 0.4)).abs() < 1e-9);
        assert!(strong.theme.starts_with("Core concepts around"));

        let tools = communities.iter().find(|comm| comm.members.contains(&c.id)).unwrap();
        assert_eq!(tools.members, vec![c.id.clone(), d.id.clone()]);
        let phrases = communities.iter().find(|c| c.members.contains(&e.id)).unwrap();
        assert_eq!(phrases.members, vec![e.id.clone(), f.id.clone()]);
        assert!((phrases.coherence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_no_singletons() {
        let graph = Graph::new(vec![node("solo", category::TOOL)], Vec::new());
        assert!(detect_communities(&graph).is_empty());
    }
}
