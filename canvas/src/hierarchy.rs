//! Structural operations over the two element relations.
//!
//! Elements are related in two independent ways:
//!
//! * **Positional nesting** through `parent_id`. A child's position is
//!   relative to its parent, the relation must stay acyclic, and removing a
//!   parent removes its children.
//! * **Group membership** through `group_id`. Members keep their own
//!   positions and are detached, not removed, when the group goes away.
//!
//! Both relations make an element a *container* for visibility purposes:
//! hiding a container hides everything below it through either relation.

#[cfg(test)]
#[path = "hierarchy_test.rs"]
mod hierarchy_test;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::consts::MAX_ANCESTOR_DEPTH;
use crate::doc::{DocStore, Element, ElementId, ElementKind};
use crate::error::DocError;
use crate::geometry::{self, Point, Rect};

impl DocStore {
    // --- Traversal ---

    /// Direct positional children of `id`, bottom-most first.
    #[must_use]
    pub fn children(&self, id: &ElementId) -> Vec<ElementId> {
        self.sorted_elements()
            .into_iter()
            .filter(|el| el.parent_id.as_ref() == Some(id))
            .map(|el| el.id)
            .collect()
    }

    /// Members of group `id`, bottom-most first.
    #[must_use]
    pub fn members(&self, id: &ElementId) -> Vec<ElementId> {
        self.sorted_elements()
            .into_iter()
            .filter(|el| el.group_id.as_ref() == Some(id))
            .map(|el| el.id)
            .collect()
    }

    /// Ancestors of `id` by `parent_id`, nearest first.
    ///
    /// # Errors
    ///
    /// `NotFound`, `DanglingParent` or `DepthExceeded` as for
    /// [`geometry::absolute_position`].
    pub fn ancestors(&self, id: &ElementId) -> Result<Vec<ElementId>, DocError> {
        let element = self.get(id).ok_or(DocError::NotFound(*id))?;
        let mut out = Vec::new();
        let mut child = *id;
        let mut cursor = element.parent_id;
        while let Some(parent_id) = cursor {
            if out.len() >= MAX_ANCESTOR_DEPTH {
                return Err(DocError::DepthExceeded(*id));
            }
            let parent = self
                .get(&parent_id)
                .ok_or(DocError::DanglingParent { child, parent: parent_id })?;
            out.push(parent_id);
            child = parent_id;
            cursor = parent.parent_id;
        }
        Ok(out)
    }

    /// Every element below `id` through `parent_id` only.
    #[must_use]
    pub fn parent_descendants(&self, id: &ElementId) -> Vec<ElementId> {
        let index = self.index_by(|el| el.parent_id);
        walk(&index, id)
    }

    /// Every element below `id` through either `parent_id` or `group_id`.
    #[must_use]
    pub fn descendants(&self, id: &ElementId) -> Vec<ElementId> {
        let index = self.container_index();
        walk(&index, id)
    }

    /// Elements `id` may be parented under: everything except itself, its
    /// descendants through either relation, its current parent and
    /// connections.
    #[must_use]
    pub fn parent_candidates(&self, id: &ElementId) -> Vec<ElementId> {
        let Some(element) = self.get(id) else {
            return Vec::new();
        };
        let excluded: HashSet<ElementId> = self.descendants(id).into_iter().collect();
        self.sorted_elements()
            .into_iter()
            .filter(|el| el.id != *id && Some(el.id) != element.parent_id)
            .filter(|el| el.kind != ElementKind::Connection && !excluded.contains(&el.id))
            .map(|el| el.id)
            .collect()
    }

    fn index_by(&self, relation: impl Fn(&Element) -> Option<ElementId>) -> HashMap<ElementId, Vec<ElementId>> {
        let mut index: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for el in self.sorted_elements() {
            if let Some(container) = relation(el) {
                index.entry(container).or_default().push(el.id);
            }
        }
        index
    }

    /// Container → contained ids, merging both relations.
    fn container_index(&self) -> HashMap<ElementId, Vec<ElementId>> {
        let mut index: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for el in self.sorted_elements() {
            for container in [el.parent_id, el.group_id].into_iter().flatten() {
                index.entry(container).or_default().push(el.id);
            }
        }
        index
    }

    /// Whether a direct container (parent or group) of `id` is hidden.
    fn has_hidden_container(&self, id: &ElementId) -> bool {
        let Some(el) = self.get(id) else {
            return false;
        };
        [el.parent_id, el.group_id]
            .into_iter()
            .flatten()
            .any(|c| self.get(&c).is_some_and(|c| c.is_hidden))
    }

    // --- Visibility ---

    /// Show or hide an element and cascade to its descendants.
    ///
    /// Hiding marks every visible descendant hidden with
    /// `hidden_by_cascade`. Showing restores only cascade-hidden descendants,
    /// and stops below any descendant that was hidden on its own.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is unknown.
    pub fn set_visibility(&mut self, id: &ElementId, hidden: bool) -> Result<(), DocError> {
        let element = self.elements.get_mut(id).ok_or(DocError::NotFound(*id))?;
        element.is_hidden = hidden;
        element.hidden_by_cascade = false;

        let index = self.container_index();
        let mut visited: HashSet<ElementId> = HashSet::from([*id]);
        let mut stack: Vec<ElementId> = index.get(id).cloned().unwrap_or_default();
        let mut touched = 0usize;

        while let Some(next) = stack.pop() {
            if visited.contains(&next) {
                continue;
            }
            let blocked = !hidden
                && self.get(&next).is_some_and(|el| el.hidden_by_cascade)
                && self.has_hidden_container(&next);
            if blocked {
                // Pushed again when its other hidden container is restored.
                continue;
            }
            visited.insert(next);
            let Some(el) = self.elements.get_mut(&next) else {
                continue;
            };
            if hidden {
                if !el.is_hidden {
                    el.is_hidden = true;
                    el.hidden_by_cascade = true;
                    touched += 1;
                }
            } else if el.hidden_by_cascade {
                el.is_hidden = false;
                el.hidden_by_cascade = false;
                touched += 1;
            } else if el.is_hidden {
                continue;
            }
            if let Some(below) = index.get(&next) {
                stack.extend(below.iter().copied());
            }
        }

        debug!(%id, hidden, cascaded = touched, "visibility set");
        Ok(())
    }

    /// Show elements that were hidden only by a container that no longer
    /// applies to them (their group was removed or dissolved).
    pub(crate) fn restore_cascade_hidden(&mut self, ids: &[ElementId]) {
        for id in ids {
            let cascade_hidden = self.get(id).is_some_and(|el| el.hidden_by_cascade);
            if cascade_hidden && !self.has_hidden_container(id) {
                if let Err(e) = self.set_visibility(id, false) {
                    debug!(%id, error = %e, "cascade restore skipped");
                }
            }
        }
    }

    /// Hide `id` and its visible descendants as cascade-hidden. Elements
    /// already hidden keep their state.
    pub(crate) fn hide_by_cascade(&mut self, id: &ElementId) {
        let Some(el) = self.elements.get_mut(id) else {
            return;
        };
        if el.is_hidden {
            return;
        }
        el.is_hidden = true;
        el.hidden_by_cascade = true;
        for below in self.descendants(id) {
            if let Some(el) = self.elements.get_mut(&below) {
                if !el.is_hidden {
                    el.is_hidden = true;
                    el.hidden_by_cascade = true;
                }
            }
        }
    }

    /// Match `id`'s visibility to its current containers after it was
    /// attached or moved: hidden under a hidden container, restored when it
    /// left the one that hid it.
    pub(crate) fn settle_visibility(&mut self, id: &ElementId) {
        if self.has_hidden_container(id) {
            self.hide_by_cascade(id);
        } else {
            self.restore_cascade_hidden(&[*id]);
        }
    }

    /// Longest `parent_id` chain below `id`, in edges.
    fn subtree_height(&self, id: &ElementId) -> usize {
        let index = self.index_by(|el| el.parent_id);
        let mut seen: HashSet<ElementId> = HashSet::from([*id]);
        let mut level = vec![*id];
        let mut height = 0;
        loop {
            let next: Vec<ElementId> = level
                .iter()
                .filter_map(|p| index.get(p))
                .flatten()
                .copied()
                .filter(|c| seen.insert(*c))
                .collect();
            if next.is_empty() {
                return height;
            }
            height += 1;
            level = next;
        }
    }

    // --- Grouping ---

    /// Group at least two existing non-connection elements under a new group
    /// element covering their absolute bounding box.
    ///
    /// The group is stacked above every non-member and the members above the
    /// group, keeping their relative order. The new group becomes the
    /// selection. Returns `None` (and changes nothing) when fewer than two ids
    /// resolve.
    pub fn group(&mut self, ids: &[ElementId]) -> Option<ElementId> {
        let mut members: Vec<ElementId> = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(el) if el.kind != ElementKind::Connection => {
                    if !members.contains(id) {
                        members.push(*id);
                    }
                }
                Some(_) => debug!(%id, "connections cannot be grouped"),
                None => debug!(%id, "group skipping unknown element"),
            }
        }
        if members.len() < 2 {
            debug!(resolved = members.len(), "group needs at least two elements");
            return None;
        }

        let mut bbox: Option<Rect> = None;
        for id in &members {
            match geometry::bounds(self, *id) {
                Ok(r) => bbox = Some(bbox.map_or(r, |b| b.union(&r))),
                Err(e) => {
                    warn!(%id, error = %e, "group rejected");
                    return None;
                }
            }
        }
        let bbox = bbox?;

        let mut group = Element::sized(ElementKind::Group, Point::new(bbox.x, bbox.y), bbox.width, bbox.height);
        let group_id = group.id;
        group.z_index = self.len();
        self.elements.insert(group_id, group);

        let member_set: HashSet<ElementId> = members.iter().copied().collect();
        let mut order: Vec<ElementId> = self
            .sorted_ids()
            .into_iter()
            .filter(|id| *id != group_id && !member_set.contains(id))
            .collect();
        order.push(group_id);
        order.extend(self.sorted_ids().into_iter().filter(|id| member_set.contains(id)));

        for id in &members {
            if let Some(el) = self.elements.get_mut(id) {
                el.group_id = Some(group_id);
            }
        }
        self.renumber(&order);
        self.restore_cascade_hidden(&members);
        self.selection = HashSet::from([group_id]);

        info!(%group_id, members = members.len(), "elements grouped");
        Some(group_id)
    }

    /// Dissolve a group: members lose their `group_id` and are stacked above
    /// everything else, positional children of the group are handed to the
    /// group's own parent at the same absolute position, connections attached
    /// to the group are dropped, and the group element is removed. The freed
    /// members become the selection and are returned bottom-most first.
    ///
    /// # Errors
    ///
    /// `NotFound` or `NotAGroup` for a bad id; geometry errors if a child's
    /// position cannot be resolved. Nothing changes on error.
    pub fn ungroup(&mut self, group_id: &ElementId) -> Result<Vec<ElementId>, DocError> {
        let group = self.get(group_id).ok_or(DocError::NotFound(*group_id))?;
        if group.kind != ElementKind::Group {
            return Err(DocError::NotAGroup(*group_id));
        }
        let outer_parent = group.parent_id;
        let members = self.members(group_id);

        let mut rehomed: Vec<(ElementId, Point)> = Vec::new();
        for child in self.children(group_id) {
            let abs = geometry::absolute_position(self, child)?;
            rehomed.push((child, geometry::relative_position(self, abs, outer_parent)?));
        }

        for id in &members {
            if let Some(el) = self.elements.get_mut(id) {
                el.group_id = None;
            }
        }
        for (child, position) in &rehomed {
            if let Some(el) = self.elements.get_mut(child) {
                el.parent_id = outer_parent;
                el.position = *position;
            }
        }

        let attached: HashSet<ElementId> = self
            .elements
            .values()
            .filter(|el| el.kind == ElementKind::Connection)
            .filter(|el| el.from.as_ref() == Some(group_id) || el.to.as_ref() == Some(group_id))
            .map(|el| el.id)
            .chain([*group_id])
            .collect();
        self.elements.retain(|id, _| !attached.contains(id));
        self.selection.retain(|id| !attached.contains(id));
        if self.connecting_from.is_some_and(|f| attached.contains(&f)) {
            self.connecting_from = None;
        }

        let member_set: HashSet<ElementId> = members.iter().copied().collect();
        let mut order: Vec<ElementId> = self
            .sorted_ids()
            .into_iter()
            .filter(|id| !member_set.contains(id))
            .collect();
        order.extend(members.iter().copied());
        self.renumber(&order);

        let freed: Vec<ElementId> = members.iter().chain(rehomed.iter().map(|(id, _)| id)).copied().collect();
        self.restore_cascade_hidden(&freed);
        self.selection = member_set;

        info!(%group_id, members = members.len(), rehomed = rehomed.len(), "group dissolved");
        Ok(members)
    }

    // --- Parenting ---

    /// Reparent `child` under `parent` (or make it top-level with `None`),
    /// keeping its absolute position.
    ///
    /// # Errors
    ///
    /// `Cycle` if `parent` is `child` or sits below it through either
    /// relation (a group cannot be nested inside its own member),
    /// `DepthExceeded` if the deepest element of `child`'s subtree would end
    /// up more than [`MAX_ANCESTOR_DEPTH`] levels down,
    /// `InvalidParent` if either side is a connection, `NotFound` for unknown
    /// ids, and geometry errors for a corrupted chain. Rejections are logged
    /// and leave the tree unchanged.
    pub fn set_parent(&mut self, child: &ElementId, parent: Option<ElementId>) -> Result<(), DocError> {
        let result = self.try_set_parent(child, parent);
        match &result {
            Ok(()) => info!(%child, parent = ?parent, "element reparented"),
            Err(e) => warn!(%child, parent = ?parent, error = %e, "reparent rejected"),
        }
        result
    }

    fn try_set_parent(&mut self, child: &ElementId, parent: Option<ElementId>) -> Result<(), DocError> {
        let element = self.get(child).ok_or(DocError::NotFound(*child))?;
        if element.kind == ElementKind::Connection {
            return Err(DocError::InvalidParent(*child));
        }

        if let Some(parent_id) = parent {
            if parent_id == *child {
                return Err(DocError::Cycle { child: *child, parent: parent_id });
            }
            let candidate = self.get(&parent_id).ok_or(DocError::NotFound(parent_id))?;
            if candidate.kind == ElementKind::Connection {
                return Err(DocError::InvalidParent(parent_id));
            }
            let chain = self.ancestors(&parent_id)?;
            if chain.contains(child) || self.descendants(child).contains(&parent_id) {
                return Err(DocError::Cycle { child: *child, parent: parent_id });
            }
            if chain.len() + 1 + self.subtree_height(child) > MAX_ANCESTOR_DEPTH {
                return Err(DocError::DepthExceeded(*child));
            }
        }

        let abs = geometry::absolute_position(self, *child)?;
        let relative = geometry::relative_position(self, abs, parent)?;

        let Some(element) = self.elements.get_mut(child) else {
            return Err(DocError::NotFound(*child));
        };
        element.parent_id = parent;
        element.position = relative;
        self.settle_visibility(child);
        Ok(())
    }
}

/// Depth-first collection of everything reachable below `root` in `index`.
fn walk(index: &HashMap<ElementId, Vec<ElementId>>, root: &ElementId) -> Vec<ElementId> {
    let mut out = Vec::new();
    let mut visited: HashSet<ElementId> = HashSet::from([*root]);
    let mut stack: Vec<ElementId> = index.get(root).cloned().unwrap_or_default();
    while let Some(next) = stack.pop() {
        if !visited.insert(next) {
            continue;
        }
        out.push(next);
        if let Some(below) = index.get(&next) {
            stack.extend(below.iter().copied());
        }
    }
    out
}
