use std::collections::{HashMap, HashSet};

struct Frame<'a> {
    node: &'a str,
    cursor: usize,
    extended: bool,
}

/// Enumerates every maximal simple path through the rule chain, starting
/// from each entry node in order.
///
/// A path ends at a node that has no successor left outside the current
/// path, so a cycle truncates the path instead of looping. Traversal state
/// is local to one call.
pub(crate) fn enumerate_paths<'a>(
    entries: &[&'a str],
    successors: &HashMap<&'a str, Vec<&'a str>>,
) -> Vec<Vec<&'a str>> {
    let mut paths = Vec::<Vec<&'a str>>::new();

    for &entry in entries {
        let mut stack = vec![Frame {
            node: entry,
            cursor: 0,
            extended: false,
        }];
        let mut on_path = HashSet::<&'a str>::from([entry]);

        while let Some(top) = stack.last_mut() {
            let next = successors.get(top.node).map_or(&[][..], Vec::as_slice);
            let mut step = None;
            while top.cursor < next.len() {
                let candidate = next[top.cursor];
                top.cursor += 1;
                if !on_path.contains(candidate) {
                    step = Some(candidate);
                    break;
                }
            }

            match step {
                Some(child) => {
                    top.extended = true;
                    on_path.insert(child);
                    stack.push(Frame {
                        node: child,
                        cursor: 0,
                        extended: false,
                    });
                }
                None => {
                    let finished = top.node;
                    if !top.extended {
                        paths.push(stack.iter().map(|frame| frame.node).collect());
                    }
                    stack.pop();
                    on_path.remove(finished);
                }
            }
        }
    }

    paths
}

/// Rule-chain edges that lie on a cycle: `source` is reachable again from
/// `target`. Self edges count.
pub(crate) fn cyclic_edges<'a>(
    successors: &HashMap<&'a str, Vec<&'a str>>,
) -> HashSet<(&'a str, &'a str)> {
    let mut out = HashSet::new();
    for (&source, targets) in successors {
        for &target in targets {
            if reaches(successors, target, source) {
                out.insert((source, target));
            }
        }
    }
    out
}

fn reaches(successors: &HashMap<&str, Vec<&str>>, from: &str, goal: &str) -> bool {
    let mut visited = HashSet::<&str>::new();
    let mut pending = vec![from];
    while let Some(node) = pending.pop() {
        if node == goal {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = successors.get(node) {
            pending.extend(next.iter().copied());
        }
    }
    false
}
