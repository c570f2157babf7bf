//! Transients Module
//!
//! Parent/child transient links and window groups. Windows refer to each
//! other by id only; all resolution goes through a `WindowLookup`, and every
//! walk up or down the links carries a visited set so a cyclic chain ends
//! instead of looping.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::wm::client::ManagedWindow;
use crate::wm::display::WindowId;

/// What a window is transient for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientFor {
    Window(WindowId),
    /// Transient for every member of the group led by this window
    Group(WindowId),
}

impl TransientFor {
    pub fn target(self) -> WindowId {
        match self {
            TransientFor::Window(id) | TransientFor::Group(id) => id,
        }
    }

    pub fn is_group(self) -> bool {
        matches!(self, TransientFor::Group(_))
    }
}

/// Windows sharing a `WM_HINTS` window group, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowGroup {
    pub leader: WindowId,
    pub members: Vec<WindowId>,
}

/// Registry of managed windows and their groups.
///
/// The window control unit only reads through it, plus the explicit
/// insert/remove calls paired with capture and release.
pub trait WindowLookup {
    fn window(&self, id: WindowId) -> Option<&ManagedWindow>;
    fn window_mut(&mut self, id: WindowId) -> Option<&mut ManagedWindow>;
    fn insert(&mut self, window: ManagedWindow);
    fn remove(&mut self, id: WindowId) -> Option<ManagedWindow>;

    fn group(&self, leader: WindowId) -> Option<&WindowGroup>;
    /// The group led by `leader`, created empty if missing
    fn group_entry(&mut self, leader: WindowId) -> &mut WindowGroup;
    fn remove_group(&mut self, leader: WindowId);

    /// Client owning `window`, which may be the client itself or any part
    /// of its frame
    fn owner_of(&self, window: WindowId) -> Option<WindowId>;

    fn ids(&self) -> Vec<WindowId>;
}

/// `HashMap` backed registry used by the driver and the tests
#[derive(Default)]
pub struct WindowTable {
    windows: HashMap<WindowId, ManagedWindow>,
    groups: HashMap<WindowId, WindowGroup>,
}

impl WindowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl WindowLookup for WindowTable {
    fn window(&self, id: WindowId) -> Option<&ManagedWindow> {
        self.windows.get(&id)
    }

    fn window_mut(&mut self, id: WindowId) -> Option<&mut ManagedWindow> {
        self.windows.get_mut(&id)
    }

    fn insert(&mut self, window: ManagedWindow) {
        self.windows.insert(window.id(), window);
    }

    fn remove(&mut self, id: WindowId) -> Option<ManagedWindow> {
        self.windows.remove(&id)
    }

    fn group(&self, leader: WindowId) -> Option<&WindowGroup> {
        self.groups.get(&leader)
    }

    fn group_entry(&mut self, leader: WindowId) -> &mut WindowGroup {
        self.groups.entry(leader).or_insert_with(|| WindowGroup {
            leader,
            members: Vec::new(),
        })
    }

    fn remove_group(&mut self, leader: WindowId) {
        self.groups.remove(&leader);
    }

    fn owner_of(&self, window: WindowId) -> Option<WindowId> {
        if self.windows.contains_key(&window) {
            return Some(window);
        }
        self.windows
            .values()
            .find(|w| w.frame.contains(window))
            .map(|w| w.id())
    }

    fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }
}

/// Add `id` to the group named by its `WM_HINTS`
pub fn join_group(windows: &mut dyn WindowLookup, id: WindowId) {
    let Some(leader) = windows.window(id).and_then(|w| w.wm_hints.window_group) else {
        return;
    };
    let group = windows.group_entry(leader);
    if !group.members.contains(&id) {
        group.members.insert(0, id);
        debug!("Window {} joined group {}", id, leader);
    }
}

/// Remove `id` from its group; an emptied group is dropped
pub fn leave_group(windows: &mut dyn WindowLookup, id: WindowId) {
    let Some(leader) = windows.window(id).and_then(|w| w.wm_hints.window_group) else {
        return;
    };
    let Some(group) = windows.group(leader) else {
        return;
    };
    let mut members = group.members.clone();
    members.retain(|&m| m != id);
    if members.is_empty() {
        windows.remove_group(leader);
        debug!("Group {} dissolved", leader);
    } else {
        windows.group_entry(leader).members = members;
    }
}

/// The managed parent of a window-specific transient
pub fn find_transient_for(windows: &dyn WindowLookup, id: WindowId) -> Option<WindowId> {
    match windows.window(id)?.transient_for? {
        TransientFor::Window(parent) if parent != id && windows.window(parent).is_some() => {
            Some(parent)
        }
        _ => None,
    }
}

/// Register `id` as a child of the window it is transient for.
///
/// Returns the parent so the caller can inherit its workspace. A parent
/// that is not managed leaves the window non-transient.
pub fn link_transient(windows: &mut dyn WindowLookup, id: WindowId) -> Option<WindowId> {
    let target = windows.window(id)?.transient_for?;
    let TransientFor::Window(_) = target else {
        return None;
    };
    let Some(parent) = find_transient_for(windows, id) else {
        debug!("Window {} is transient for unmanaged {}", id, target.target());
        if let Some(window) = windows.window_mut(id) {
            window.transient_for = None;
        }
        return None;
    };
    if let Some(p) = windows.window_mut(parent) {
        if !p.transients.contains(&id) {
            p.transients.insert(0, id);
        }
    }
    debug!("Window {} is transient for {}", id, parent);
    Some(parent)
}

/// Drop `id` from its parent's child list. The window's own reference is
/// left in place for the caller to replace or clear.
pub fn unlink_transient(windows: &mut dyn WindowLookup, id: WindowId) {
    if let Some(parent) = find_transient_for(windows, id) {
        if let Some(p) = windows.window_mut(parent) {
            p.transients.retain(|&t| t != id);
        }
    }
}

/// Sever every link `id` takes part in before it goes away: its parent
/// forgets it and its children become non-transient.
pub fn orphan_transients(windows: &mut dyn WindowLookup, id: WindowId) {
    unlink_transient(windows, id);
    let children = match windows.window_mut(id) {
        Some(window) => {
            window.transient_for = None;
            std::mem::take(&mut window.transients)
        }
        None => return,
    };
    for child in children {
        if let Some(c) = windows.window_mut(child) {
            if c.transient_for == Some(TransientFor::Window(id)) {
                c.transient_for = None;
            }
        }
    }
}

/// Walk up window-specific transient links to the first window that is not
/// one, stopping at a group transient or the node where a cycle closes.
pub fn find_non_transient_parent(windows: &dyn WindowLookup, id: WindowId) -> WindowId {
    let mut current = id;
    let mut seen = HashSet::from([id]);
    loop {
        let Some(window) = windows.window(current) else {
            return current;
        };
        if window.is_group_transient() {
            return current;
        }
        let Some(parent) = find_transient_for(windows, current) else {
            return current;
        };
        if !seen.insert(parent) {
            debug!("Circular transient chain through window {}", parent);
            return parent;
        }
        current = parent;
    }
}

/// Group transients of the group `id` belongs to, newest first
pub fn group_transients(windows: &dyn WindowLookup, id: WindowId) -> Vec<WindowId> {
    let Some(group) = windows
        .window(id)
        .and_then(|w| w.wm_hints.window_group)
        .and_then(|leader| windows.group(leader))
    else {
        return Vec::new();
    };
    group
        .members
        .iter()
        .copied()
        .filter(|&m| windows.window(m).is_some_and(|w| w.is_group_transient()))
        .collect()
}

/// `id` followed by all of its transients, depth first, each once
pub fn transient_tree(windows: &dyn WindowLookup, id: WindowId) -> Vec<WindowId> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        order.push(current);
        if let Some(window) = windows.window(current) {
            stack.extend(window.transients.iter().rev().copied());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{table_with, window};

    #[test]
    fn test_transient_for_target() {
        assert_eq!(TransientFor::Window(5).target(), 5);
        assert!(TransientFor::Group(7).is_group());
        assert!(!TransientFor::Window(7).is_group());
    }

    #[test]
    fn test_link_and_unlink_are_symmetric() {
        let mut table = table_with(vec![window(1), window(2)]);
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Window(1));

        assert_eq!(link_transient(&mut table, 2), Some(1));
        assert_eq!(table.window(1).unwrap().transients, vec![2]);

        // linking twice does not duplicate
        link_transient(&mut table, 2);
        assert_eq!(table.window(1).unwrap().transients, vec![2]);

        unlink_transient(&mut table, 2);
        assert!(table.window(1).unwrap().transients.is_empty());
    }

    #[test]
    fn test_transients_newest_first() {
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        for child in [2, 3] {
            table.window_mut(child).unwrap().transient_for = Some(TransientFor::Window(1));
            link_transient(&mut table, child);
        }
        assert_eq!(table.window(1).unwrap().transients, vec![3, 2]);
    }

    #[test]
    fn test_unmanaged_parent_clears_reference() {
        let mut table = table_with(vec![window(2)]);
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Window(99));
        assert_eq!(link_transient(&mut table, 2), None);
        assert!(table.window(2).unwrap().transient_for.is_none());
    }

    #[test]
    fn test_orphan_transients() {
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Window(1));
        table.window_mut(3).unwrap().transient_for = Some(TransientFor::Window(2));
        link_transient(&mut table, 2);
        link_transient(&mut table, 3);

        orphan_transients(&mut table, 2);
        assert!(table.window(1).unwrap().transients.is_empty());
        assert!(table.window(3).unwrap().transient_for.is_none());
        assert!(table.window(2).unwrap().transients.is_empty());
    }

    #[test]
    fn test_non_transient_parent_walks_chain() {
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Window(1));
        table.window_mut(3).unwrap().transient_for = Some(TransientFor::Window(2));
        assert_eq!(find_non_transient_parent(&table, 3), 1);
        assert_eq!(find_non_transient_parent(&table, 1), 1);
    }

    #[test]
    fn test_cycle_terminates() {
        // A -> B -> C -> A
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        table.window_mut(1).unwrap().transient_for = Some(TransientFor::Window(2));
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Window(3));
        table.window_mut(3).unwrap().transient_for = Some(TransientFor::Window(1));
        for id in [1, 2, 3] {
            link_transient(&mut table, id);
        }

        for start in [1, 2, 3] {
            let end = find_non_transient_parent(&table, start);
            assert!([1, 2, 3].contains(&end));
        }
        assert_eq!(transient_tree(&table, 1).len(), 3);
    }

    #[test]
    fn test_walk_stops_at_group_transient() {
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Group(1));
        table.window_mut(3).unwrap().transient_for = Some(TransientFor::Window(2));
        link_transient(&mut table, 3);
        assert_eq!(find_non_transient_parent(&table, 3), 2);
    }

    #[test]
    fn test_groups() {
        let mut table = table_with(vec![window(1), window(2), window(3)]);
        for id in [1, 2, 3] {
            table.window_mut(id).unwrap().wm_hints.window_group = Some(1);
            join_group(&mut table, id);
        }
        table.window_mut(2).unwrap().transient_for = Some(TransientFor::Group(1));
        table.window_mut(3).unwrap().transient_for = Some(TransientFor::Group(1));

        assert_eq!(table.group(1).unwrap().members, vec![3, 2, 1]);
        assert_eq!(group_transients(&table, 1), vec![3, 2]);

        for id in [1, 2, 3] {
            leave_group(&mut table, id);
        }
        assert!(table.group(1).is_none());
    }

    #[test]
    fn test_owner_of_frame_part() {
        let mut w = window(10);
        w.frame.frame = 11;
        w.frame.plate = 12;
        w.frame.title = Some(13);
        let table = table_with(vec![w]);
        assert_eq!(table.owner_of(10), Some(10));
        assert_eq!(table.owner_of(13), Some(10));
        assert_eq!(table.owner_of(14), None);
    }
}
