//! Name heuristics for finding hair and accessory bones.
//!
//! Matching is substring-based on lowercased bone names. Each whitelist term
//! picks at most one bone, the first in rig order.

use thiserror::Error;

use crate::rig::{HumanoidSlot, Node, NodeId, Skeleton};

/// Built-in accessory terms used when the preset file has no whitelist.
pub const DEFAULT_ACCESSORIES: [&str; 13] = [
    "skirt", "gimmick_l", "gimmick_r", "earl", "earr", "ear_l", "ear_r", "scarf", "tie", "tail",
    "breast_l", "breast_r", "bell",
];

/// Ordered, case-insensitively unique set of lowercase terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    terms: Vec<String>,
}

impl Whitelist {
    pub fn new() -> Self { Self::default() }

    pub fn defaults() -> Self { DEFAULT_ACCESSORIES.into_iter().collect() }

    /// Lowercases and trims `term`. Returns false for blanks and duplicates.
    pub fn insert(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() || self.terms.contains(&term) {
            return false;
        }
        self.terms.push(term);
        true
    }

    pub fn remove(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        let before = self.terms.len();
        self.terms.retain(|t| *t != term);
        self.terms.len() != before
    }

    pub fn contains(&self, term: &str) -> bool { self.terms.contains(&term.trim().to_lowercase()) }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.terms.iter().map(String::as_str) }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
}

impl<S: AsRef<str>> FromIterator<S> for Whitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut wl = Whitelist::new();
        for t in iter {
            wl.insert(t.as_ref());
        }
        wl
    }
}

fn lower_contains(node: &Node, term: &str) -> bool { node.name.to_lowercase().contains(term) }

/// For each term in order, the first node whose lowercased name contains it.
/// Terms without a match are skipped; a node is returned at most once.
pub fn find_matches(nodes: &[Node], whitelist: &Whitelist) -> Vec<NodeId> {
    let lowered: Vec<String> = nodes.iter().map(|n| n.name.to_lowercase()).collect();
    let mut out: Vec<NodeId> = Vec::new();
    for term in whitelist.iter() {
        match lowered.iter().position(|name| name.contains(term)) {
            Some(i) if !out.contains(&NodeId(i)) => out.push(NodeId(i)),
            Some(i) => log::debug!("'{term}' matched '{}' again, skipping", nodes[i].name),
            None => log::debug!("no bone matches '{term}'"),
        }
    }
    out
}

/// Which family of ear root bones to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarChoice {
    Ear,
    Gimmick,
}

/// A match set holding both an `ear` bone and `gimmick_l`/`gimmick_r` bones.
/// Many avatar rigs model the same ears both ways; only one family should get physics.
///
/// Membership is by plain substring on the lowercased name. A name containing
/// `gimmick_l`/`gimmick_r` is a gimmick; any other name containing `ear` is an
/// ear, whichever term matched it. So `Skirt_Rear`, matched by `skirt`, counts
/// as an ear bone and is dropped when the gimmick family is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarConflict {
    pub ear: Vec<NodeId>,
    pub gimmick: Vec<NodeId>,
}

impl EarConflict {
    /// Drop the declined family from `matches`, keeping order.
    pub fn resolve(&self, matches: &mut Vec<NodeId>, choice: EarChoice) {
        let declined = match choice {
            EarChoice::Ear => &self.gimmick,
            EarChoice::Gimmick => &self.ear,
        };
        matches.retain(|id| !declined.contains(id));
    }
}

pub fn detect_ear_conflict(nodes: &[Node], matches: &[NodeId]) -> Option<EarConflict> {
    let mut ear = Vec::new();
    let mut gimmick = Vec::new();
    for &id in matches {
        let Some(node) = nodes.get(id.0) else { continue };
        if lower_contains(node, "gimmick_l") || lower_contains(node, "gimmick_r") {
            gimmick.push(id);
        } else if lower_contains(node, "ear") {
            ear.push(id);
        }
    }
    if ear.is_empty() || gimmick.is_empty() {
        None
    } else {
        Some(EarConflict { ear, gimmick })
    }
}

/// Asks whoever drives the tool which ear family to keep.
/// `None` means no answer was given.
pub trait ConflictResolver {
    fn choose(&mut self, conflict: &EarConflict, nodes: &[Node]) -> Option<EarChoice>;
}

impl ConflictResolver for EarChoice {
    fn choose(&mut self, _: &EarConflict, _: &[Node]) -> Option<EarChoice> { Some(*self) }
}

impl<F> ConflictResolver for F
where
    F: FnMut(&EarConflict, &[Node]) -> Option<EarChoice>,
{
    fn choose(&mut self, conflict: &EarConflict, nodes: &[Node]) -> Option<EarChoice> {
        self(conflict, nodes)
    }
}

#[derive(Debug, Error)]
#[error("found both ear and gimmick ear roots; choose one family")]
pub struct Unresolved(pub EarConflict);

/// Whitelist matching plus ear/gimmick disambiguation through `resolver`.
pub fn find_accessories<R: ConflictResolver + ?Sized>(
    rig: &Skeleton,
    whitelist: &Whitelist,
    resolver: &mut R,
) -> Result<Vec<NodeId>, Unresolved> {
    let mut found = find_matches(rig.nodes(), whitelist);
    if let Some(conflict) = detect_ear_conflict(rig.nodes(), &found) {
        let choice = resolver
            .choose(&conflict, rig.nodes())
            .ok_or_else(|| Unresolved(conflict.clone()))?;
        log::info!("ear root conflict resolved as {:?}", choice);
        conflict.resolve(&mut found, choice);
    }
    log::info!("found {} accessory bones", found.len());
    Ok(found)
}

/// Union of fresh matches with an earlier selection. Stale ids are dropped.
pub fn merge_previous(found: Vec<NodeId>, previous: &[NodeId], rig: &Skeleton) -> Vec<NodeId> {
    let mut out = found;
    for &id in previous {
        if rig.contains(id) && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// First bone under the head (head included) whose name contains `hair`.
/// Searches the whole rig when no head bone is mapped.
pub fn find_hair_root(rig: &Skeleton) -> Option<NodeId> {
    let candidates = match rig.humanoid_bone(HumanoidSlot::Head) {
        Some(head) => rig.descendants(head),
        None => rig.ids().collect(),
    };
    let found = candidates
        .into_iter()
        .find(|&id| rig.node(id).is_some_and(|n| lower_contains(n, "hair")));
    match found {
        Some(id) => log::info!("using '{}' as hair root", rig.name_of(id)),
        None => log::debug!("no hair root found"),
    }
    found
}

/// Like [`find_hair_root`], then falls back to the whole rig.
pub fn find_hair_root_anywhere(rig: &Skeleton) -> Option<NodeId> {
    find_hair_root(rig).or_else(|| {
        let id = rig.ids().find(|&id| rig.node(id).is_some_and(|n| lower_contains(n, "hair")))?;
        log::info!("no hair under head, using '{}' as hair root", rig.name_of(id));
        Some(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rig: &Skeleton, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| rig.name_of(id).to_string()).collect()
    }

    #[test]
    fn matches_hair_and_gimmicks() {
        let rig = Skeleton::from_names(["Hair_Root", "Gimmick_L", "Gimmick_R"]);
        let wl: Whitelist = ["hair", "gimmick_l", "gimmick_r"].into_iter().collect();
        let found = find_matches(rig.nodes(), &wl);
        assert_eq!(names(&rig, &found), ["Hair_Root", "Gimmick_L", "Gimmick_R"]);
    }

    #[test]
    fn follows_whitelist_order_and_takes_first_node() {
        let rig = Skeleton::from_names(["Tail_1", "Skirt_Front", "Skirt_Back", "Tail_2"]);
        let wl: Whitelist = ["tail", "skirt", "bell"].into_iter().collect();
        assert_eq!(names(&rig, &find_matches(rig.nodes(), &wl)), ["Tail_1", "Skirt_Front"]);
    }

    #[test]
    fn same_node_is_returned_once() {
        let rig = Skeleton::from_names(["TieScarf"]);
        let wl: Whitelist = ["tie", "scarf"].into_iter().collect();
        assert_eq!(find_matches(rig.nodes(), &wl), [NodeId(0)]);
    }

    #[test]
    fn at_most_one_node_per_term_and_only_known_nodes() {
        let rig = Skeleton::from_names(["a_x", "ab_x", "abc_x", "b", "zz"]);
        let wl: Whitelist = ["a", "b", "c", "x", "q"].into_iter().collect();
        let found = find_matches(rig.nodes(), &wl);
        assert!(found.len() <= wl.len());
        assert!(found.iter().all(|&id| rig.contains(id)));
        let mut dedup = found.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), found.len());
    }

    #[test]
    fn whitelist_is_case_insensitively_unique() {
        let mut wl = Whitelist::new();
        assert!(wl.insert("Skirt"));
        assert!(!wl.insert("SKIRT "));
        assert!(!wl.insert("   "));
        assert!(wl.contains("skirt"));
        assert_eq!(wl.len(), 1);
        assert!(wl.remove("Skirt"));
        assert!(wl.is_empty());
    }

    #[test]
    fn ear_gimmick_conflict_is_detected_and_resolved_both_ways() {
        let rig = Skeleton::from_names(["Ear_L", "Gimmick_L", "Gimmick_R", "Skirt"]);
        let found = find_matches(rig.nodes(), &Whitelist::defaults());
        let conflict = detect_ear_conflict(rig.nodes(), &found).unwrap();
        assert_eq!(conflict.ear, [NodeId(0)]);
        assert_eq!(conflict.gimmick, [NodeId(1), NodeId(2)]);

        let mut keep_ear = found.clone();
        conflict.resolve(&mut keep_ear, EarChoice::Ear);
        assert_eq!(names(&rig, &keep_ear), ["Skirt", "Ear_L"]);

        let mut keep_gimmick = found;
        conflict.resolve(&mut keep_gimmick, EarChoice::Gimmick);
        assert_eq!(names(&rig, &keep_gimmick), ["Skirt", "Gimmick_L", "Gimmick_R"]);
    }

    #[test]
    fn any_name_containing_ear_joins_the_ear_family() {
        let rig = Skeleton::from_names(["Skirt_Rear", "Gimmick_L"]);
        let mut found = find_matches(rig.nodes(), &Whitelist::defaults());
        assert_eq!(names(&rig, &found), ["Skirt_Rear", "Gimmick_L"]);
        let conflict = detect_ear_conflict(rig.nodes(), &found).unwrap();
        assert_eq!(conflict.ear, [NodeId(0)]);
        conflict.resolve(&mut found, EarChoice::Gimmick);
        assert_eq!(names(&rig, &found), ["Gimmick_L"]);
    }

    #[test]
    fn no_conflict_without_both_families() {
        let rig = Skeleton::from_names(["Gimmick_L", "Gimmick_R"]);
        let found = find_matches(rig.nodes(), &Whitelist::defaults());
        assert!(detect_ear_conflict(rig.nodes(), &found).is_none());
    }

    #[test]
    fn resolver_is_only_asked_on_conflict() {
        let mut asked = 0;
        let mut ask = |_: &EarConflict, _: &[Node]| {
            asked += 1;
            Some(EarChoice::Gimmick)
        };
        let plain = Skeleton::from_names(["Skirt"]);
        find_accessories(&plain, &Whitelist::defaults(), &mut ask).unwrap();
        let ambiguous = Skeleton::from_names(["EarR", "Gimmick_R"]);
        let found = find_accessories(&ambiguous, &Whitelist::defaults(), &mut ask).unwrap();
        assert_eq!(asked, 1);
        assert_eq!(names(&ambiguous, &found), ["Gimmick_R"]);
    }

    #[test]
    fn unanswered_conflict_is_an_error() {
        let rig = Skeleton::from_names(["Ear_L", "Gimmick_L"]);
        let mut decline = |_: &EarConflict, _: &[Node]| -> Option<EarChoice> { None };
        let err = find_accessories(&rig, &Whitelist::defaults(), &mut decline).unwrap_err();
        assert_eq!(err.0.ear, [NodeId(0)]);
        assert!(find_accessories(&rig, &Whitelist::defaults(), &mut EarChoice::Ear).is_ok());
    }

    #[test]
    fn merge_keeps_previous_and_drops_stale() {
        let rig = Skeleton::from_names(["Skirt", "Tail", "Bell"]);
        let merged = merge_previous(vec![NodeId(0)], &[NodeId(2), NodeId(0), NodeId(9)], &rig);
        assert_eq!(merged, [NodeId(0), NodeId(2)]);
    }

    #[test]
    fn hair_root_is_searched_under_head() {
        let rig = crate::rig::load_from_yaml_str(concat!(
            "bones:\n  - name: HairTie\n  - name: Head\n",
            "  - name: Hair_Base\n    parent: Head\nhumanoid:\n  head: Head\n",
        ))
        .unwrap();
        assert_eq!(find_hair_root(&rig).map(|id| rig.name_of(id)), Some("Hair_Base"));

        let outside = crate::rig::load_from_yaml_str(
            "bones:\n  - name: HairTie\n  - name: Head\nhumanoid:\n  head: Head\n",
        )
        .unwrap();
        assert_eq!(find_hair_root(&outside), None);
        assert_eq!(find_hair_root_anywhere(&outside), Some(NodeId(0)));

        let flat = Skeleton::from_names(["Body", "hair"]);
        assert_eq!(find_hair_root(&flat), Some(NodeId(1)));
    }
}
