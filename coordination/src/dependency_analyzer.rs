//! Step Dependency Analyzer — groups plan steps into parallel-safe waves
//! by their declared file I/O sets.
//!
//! Two steps conflict (symmetrically) when any of: one's modify set
//! intersects the other's create set, or their modify sets intersect, or
//! their create sets intersect. The grouping algorithm is a greedy
//! level-set pass: admit a step into the current group iff its files
//! don't collide with files already claimed by that group; when a pass
//! admits nothing but steps remain (a cycle), force-promote the first
//! remaining step into its own singleton group so progress is guaranteed.

use std::collections::BTreeSet;

use crate::plans::types::Step;

/// A group of steps (by index) safe to run concurrently.
pub type Wave = Vec<u32>;

fn conflicts(a: &Step, b: &Step) -> bool {
    !b.files_to_modify.is_disjoint(&a.files_to_create)
        || !b.files_to_create.is_disjoint(&a.files_to_modify)
        || !a.files_to_modify.is_disjoint(&b.files_to_modify)
        || !a.files_to_create.is_disjoint(&b.files_to_create)
}

/// Partition `steps` into an ordered list of waves. Every step appears in
/// exactly one wave; wave order is a valid topological order; no two
/// steps in the same wave touch a common file (unless a cycle forced a
/// singleton promotion, which by construction is still wave-safe on its
/// own).
pub fn analyze(steps: &[Step]) -> Vec<Wave> {
    let mut remaining: Vec<&Step> = steps.iter().collect();
    let mut waves: Vec<Wave> = Vec::new();

    while !remaining.is_empty() {
        let mut group: Vec<&Step> = Vec::new();
        let mut claimed: BTreeSet<String> = BTreeSet::new();
        let mut leftover: Vec<&Step> = Vec::new();

        for step in remaining.iter() {
            let files = step.all_files();
            let mut collides = false;
            for existing in &group {
                if conflicts(existing, step) {
                    collides = true;
                    break;
                }
            }
            if !collides && files.is_disjoint(&claimed) {
                claimed.extend(files);
                group.push(step);
            } else {
                leftover.push(step);
            }
        }

        if group.is_empty() {
            // Cycle fallback: force-promote the first remaining step alone.
            let forced = remaining.remove(0);
            waves.push(vec![forced.index]);
            continue;
        }

        waves.push(group.iter().map(|s| s.index).collect());
        remaining = leftover;
    }

    waves
}

/// Topological sort under the strict "B modifies what A creates => A
/// before B" relation. Cycles are skipped silently (the step simply
/// doesn't get a strict ordering guarantee beyond input order).
pub fn suggest_optimal_order(steps: &[Step]) -> Vec<u32> {
    let n = steps.len();
    let mut in_degree = vec![0usize; n];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, a) in steps.iter().enumerate() {
        for (j, b) in steps.iter().enumerate() {
            if i == j {
                continue;
            }
            // a creates what b modifies => a before b
            if !a.files_to_create.is_disjoint(&b.files_to_modify) {
                edges[i].push(j);
                in_degree[j] += 1;
            }
        }
    }

    let mut queue: std::collections::VecDeque<usize> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];

    while let Some(i) = queue.pop_front() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        order.push(steps[i].index);
        for &j in &edges[i] {
            if in_degree[j] > 0 {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }
    }

    // Any step left unvisited is part of a cycle; skip silently by
    // appending in original order so the caller still gets every step.
    for (i, step) in steps.iter().enumerate() {
        if !visited[i] {
            order.push(step.index);
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::types::Step;

    fn step_with(index: u32, create: &[&str], modify: &[&str]) -> Step {
        let mut s = Step::new(index, format!("s{index}"), "d");
        s.files_to_create = create.iter().map(|s| s.to_string()).collect();
        s.files_to_modify = modify.iter().map(|s| s.to_string()).collect();
        s
    }

    /// s1 creates a.ts, s2 creates b.ts, s3 modifies {a.ts, b.ts}, s4
    /// creates c.ts. Expected groups: [{s1,s2,s4},{s3}].
    #[test]
    fn s4_dependency_analyzer_groups() {
        let steps = vec![
            step_with(1, &["a.ts"], &[]),
            step_with(2, &["b.ts"], &[]),
            step_with(3, &[], &["a.ts", "b.ts"]),
            step_with(4, &["c.ts"], &[]),
        ];
        let waves = analyze(&steps);
        assert_eq!(waves.len(), 2);
        let mut first = waves[0].clone();
        first.sort();
        assert_eq!(first, vec![1, 2, 4]);
        assert_eq!(waves[1], vec![3]);
    }

    #[test]
    fn partition_covers_every_step_exactly_once() {
        let steps = vec![
            step_with(1, &["a"], &[]),
            step_with(2, &[], &["a"]),
            step_with(3, &["b"], &[]),
        ];
        let waves = analyze(&steps);
        let mut all: Vec<u32> = waves.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn independent_steps_form_single_wave() {
        let steps = vec![
            step_with(1, &["a"], &[]),
            step_with(2, &["b"], &[]),
            step_with(3, &["c"], &[]),
        ];
        let waves = analyze(&steps);
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 3);
    }

    #[test]
    fn cycle_falls_back_to_singleton_groups() {
        // a modifies x and y; b modifies y and x — mutual conflict, so
        // no grouping is possible and both become singleton waves.
        let steps = vec![step_with(1, &[], &["x", "y"]), step_with(2, &[], &["x", "y"])];
        let waves = analyze(&steps);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 1);
        assert_eq!(waves[1].len(), 1);
    }

    #[test]
    fn suggest_optimal_order_respects_create_before_modify() {
        let steps = vec![
            step_with(1, &[], &["a"]),
            step_with(2, &["a"], &[]),
        ];
        let order = suggest_optimal_order(&steps);
        // step 2 creates "a", step 1 modifies "a" => 2 before 1
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn suggest_optimal_order_skips_cycles_silently() {
        let steps = vec![
            step_with(1, &["a"], &["b"]),
            step_with(2, &["b"], &["a"]),
        ];
        let order = suggest_optimal_order(&steps);
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2]);
    }
}
