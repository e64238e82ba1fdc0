use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use slotmap::{SecondaryMap, SlotMap, SparseSecondaryMap};

use crate::assets::prefab::Prefab;
use crate::scene::bounds::BoundingBox;
use crate::scene::mesh::Mesh;
use crate::scene::node::Node;
use crate::scene::skeleton::{Skeleton, SkinBinding};
use crate::scene::transform_system;
use crate::scene::{MeshKey, NodeHandle, SkeletonKey};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Scene graph
///
/// Nodes live in a slot map; everything else a node can carry (name, mesh,
/// skin binding, bone marker) is a sparse component keyed by its handle.
pub struct Scene {
    pub id: u32,

    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,

    // ==== Components ====
    pub names: SecondaryMap<NodeHandle, String>,
    pub mesh_components: SparseSecondaryMap<NodeHandle, MeshKey>,
    pub skins: SparseSecondaryMap<NodeHandle, SkinBinding>,
    pub bones: SparseSecondaryMap<NodeHandle, ()>,

    // ==== Resource pools ====
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub skeletons: SlotMap<SkeletonKey, Skeleton>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),

            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),

            names: SecondaryMap::new(),
            mesh_components: SparseSecondaryMap::new(),
            skins: SparseSecondaryMap::new(),
            bones: SparseSecondaryMap::new(),

            meshes: SlotMap::with_key(),
            skeletons: SlotMap::with_key(),
        }
    }

    /// Starts building a node.
    pub fn build_node(&'_ mut self, name: &str) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name)
    }

    /// Adds a node at the root level.
    pub fn add_node(&mut self, node: Node, name: &str) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.names.insert(handle, name.to_string());
        self.root_nodes.push(handle);
        handle
    }

    pub fn add_to_parent(&mut self, child: Node, name: &str, parent: NodeHandle) -> NodeHandle {
        let handle = self.add_node(child, name);
        self.attach(handle, parent);
        handle
    }

    /// Removes a node and its whole subtree, releasing meshes and any
    /// skeleton whose bones were removed.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        let subtree = self.traverse(handle);
        if subtree.is_empty() {
            return;
        }

        self.detach_from_parent(handle);

        for &h in &subtree {
            if let Some(mesh_key) = self.mesh_components.remove(h) {
                self.meshes.remove(mesh_key);
            }
            self.skins.remove(h);
            self.bones.remove(h);
            self.names.remove(h);
            self.nodes.remove(h);
        }

        let orphaned: Vec<SkeletonKey> = self
            .skeletons
            .iter()
            .filter(|(_, s)| s.bones.iter().any(|b| !self.nodes.contains_key(*b)))
            .map(|(k, _)| k)
            .collect();
        for key in orphaned {
            self.skeletons.remove(key);
            self.skins.retain(|_, binding| binding.skeleton != key);
        }
    }

    /// Reparents `child` under `parent`.
    ///
    /// Refuses to create a cycle.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            log::warn!("Cannot attach node to itself!");
            return;
        }
        if !self.nodes.contains_key(parent) {
            log::error!("Parent node not found during attach!");
            return;
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Cannot attach a node below one of its own descendants");
            return;
        }

        self.detach_from_parent(child);

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
    }

    /// Moves `child` to the root level.
    pub fn detach(&mut self, child: NodeHandle) {
        if !self.nodes.contains_key(child) {
            return;
        }
        self.detach_from_parent(child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
            c.transform.mark_dirty();
        }
        self.root_nodes.push(child);
    }

    fn detach_from_parent(&mut self, child: NodeHandle) {
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p) {
                n.children.retain(|x| *x != child);
            }
        } else {
            self.root_nodes.retain(|&x| x != child);
        }
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.nodes.get(h).and_then(|n| n.parent);
        }
        false
    }

    #[must_use]
    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn name(&self, handle: NodeHandle) -> Option<&str> {
        self.names.get(handle).map(String::as_str)
    }

    pub fn set_name(&mut self, handle: NodeHandle, name: &str) {
        if self.nodes.contains_key(handle) {
            self.names.insert(handle, name.to_string());
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn set_mesh(&mut self, handle: NodeHandle, mesh: Mesh) -> Option<MeshKey> {
        if !self.nodes.contains_key(handle) {
            return None;
        }
        let key = self.meshes.insert(mesh);
        if let Some(old) = self.mesh_components.insert(handle, key) {
            self.meshes.remove(old);
        }
        Some(key)
    }

    #[must_use]
    pub fn mesh_of(&self, handle: NodeHandle) -> Option<&Mesh> {
        self.mesh_components.get(handle).and_then(|&k| self.meshes.get(k))
    }

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        for &bone in &skeleton.bones {
            self.bones.insert(bone, ());
        }
        self.skeletons.insert(skeleton)
    }

    pub fn bind_skeleton(&mut self, handle: NodeHandle, skeleton: SkeletonKey) {
        if self.nodes.contains_key(handle) && self.skeletons.contains_key(skeleton) {
            self.skins.insert(handle, SkinBinding { skeleton });
        }
    }

    #[must_use]
    pub fn skin_of(&self, handle: NodeHandle) -> Option<&Skeleton> {
        self.skins.get(handle).and_then(|b| self.skeletons.get(b.skeleton))
    }

    pub fn mark_bone(&mut self, handle: NodeHandle) {
        if self.nodes.contains_key(handle) {
            self.bones.insert(handle, ());
        }
    }

    #[inline]
    #[must_use]
    pub fn is_bone(&self, handle: NodeHandle) -> bool {
        self.bones.contains_key(handle)
    }

    // ========================================================================
    // Hierarchy queries
    // ========================================================================

    /// Depth-first pre-order walk of `root`'s subtree, children in insertion order.
    #[must_use]
    pub fn traverse(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            out.push(h);
            if let Some(node) = self.nodes.get(h) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// First node named `name` in pre-order below (and including) `root`.
    #[must_use]
    pub fn find_by_name(&self, root: NodeHandle, name: &str) -> Option<NodeHandle> {
        self.traverse(root).into_iter().find(|&h| self.name(h) == Some(name))
    }

    // ========================================================================
    // Matrices
    // ========================================================================

    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy(&mut self.nodes, &self.root_nodes);
    }

    pub fn update_subtree(&mut self, root: NodeHandle) {
        transform_system::update_subtree(&mut self.nodes, root);
    }

    /// World-space box of everything under `root`.
    ///
    /// Skinned meshes contribute their posed vertices, rigid meshes their
    /// transformed local box, and bones their joint positions. World matrices
    /// must be current.
    #[must_use]
    pub fn world_bounds(&self, root: NodeHandle) -> Option<BoundingBox> {
        let mut bbox = BoundingBox::EMPTY;

        for handle in self.traverse(root) {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };

            if let Some(mesh) = self.mesh_of(handle) {
                match self.skin_of(handle) {
                    Some(skeleton) if mesh.is_skinned() => {
                        let joints = skeleton.joint_matrices(&self.nodes);
                        for ((p, j), w) in mesh.positions.iter().zip(&mesh.joints).zip(&mesh.weights) {
                            let mut posed = Vec3::ZERO;
                            let mut total = 0.0;
                            for k in 0..4 {
                                let weight = w[k];
                                if weight <= 0.0 {
                                    continue;
                                }
                                if let Some(m) = joints.get(j[k] as usize) {
                                    posed += m.transform_point3(*p) * weight;
                                    total += weight;
                                }
                            }
                            if total > 0.0 {
                                bbox.expand(posed / total);
                            } else {
                                bbox.expand(node.transform.world_matrix.transform_point3(*p));
                            }
                        }
                    }
                    _ => {
                        if let Some(local) = mesh.local_bounds() {
                            bbox = bbox.union(&local.transform(&node.transform.world_matrix));
                        }
                    }
                }
            }

            if self.is_bone(handle) {
                bbox.expand(node.transform.world_position());
            }
        }

        bbox.is_valid().then_some(bbox)
    }

    // ========================================================================
    // Prefab instantiation
    // ========================================================================

    /// Deep-copies a prefab into this scene below a new root named `name`.
    ///
    /// Skin bindings and skeletons are recreated against the new node
    /// handles, so the instance shares no state with the prefab.
    pub fn instantiate(&mut self, prefab: &Prefab, name: &str) -> NodeHandle {
        let root = self.add_node(Node::new(), name);

        let handles: Vec<NodeHandle> = prefab
            .nodes
            .iter()
            .enumerate()
            .map(|(i, pn)| {
                let node = Node::with_transform(pn.transform.clone());
                let fallback = format!("Node_{i}");
                self.add_node(node, pn.name.as_deref().unwrap_or(&fallback))
            })
            .collect();

        for (i, pn) in prefab.nodes.iter().enumerate() {
            for &c in &pn.children_indices {
                if let Some(&child) = handles.get(c) {
                    self.attach(child, handles[i]);
                }
            }
            if let Some(mesh) = &pn.mesh {
                self.set_mesh(handles[i], mesh.clone());
            }
            if pn.is_bone {
                self.mark_bone(handles[i]);
            }
        }

        for &r in &prefab.root_indices {
            if let Some(&h) = handles.get(r) {
                self.attach(h, root);
            }
        }

        let skeleton_keys: Vec<SkeletonKey> = prefab
            .skeletons
            .iter()
            .map(|ps| {
                let bones = ps.bone_indices.iter().filter_map(|&b| handles.get(b).copied()).collect();
                self.add_skeleton(Skeleton::new(
                    &ps.name,
                    bones,
                    ps.inverse_bind_matrices.clone(),
                    ps.root_bone_index,
                ))
            })
            .collect();

        for (i, pn) in prefab.nodes.iter().enumerate() {
            if let Some(key) = pn.skin_index.and_then(|s| skeleton_keys.get(s)) {
                self.bind_skeleton(handles[i], *key);
            }
        }

        root
    }
}

pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    name: String,
    node: Node,
    parent: Option<NodeHandle>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: &str) -> Self {
        Self {
            scene,
            name: name.to_string(),
            node: Node::new(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.position = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: glam::Quat) -> Self {
        self.node.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, s: f32) -> Self {
        self.node.transform.scale = Vec3::splat(s);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: NodeHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Inserts the node and returns its handle.
    pub fn build(self) -> NodeHandle {
        match self.parent {
            Some(parent) => self.scene.add_to_parent(self.node, &self.name, parent),
            None => self.scene.add_node(self.node, &self.name),
        }
    }
}
