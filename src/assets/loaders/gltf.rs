//! glTF 2.0 decoder (binary `.glb` and text `.gltf`).
//!
//! Produces a [`Prefab`]: one prefab node per glTF node (same index), every
//! mesh's triangle primitives merged into a single [`Mesh`], skins as
//! [`PrefabSkeleton`]s and animations as [`AnimationClip`]s addressing bones
//! by node name.

use base64::Engine as _;
use gltf::animation::util::ReadOutputs;
use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};
use rustc_hash::FxHashSet;

use crate::animation::binding::TargetPath;
use crate::animation::clip::{AnimationClip, Track, TrackData, TrackMeta};
use crate::animation::tracks::{InterpolationMode, KeyframeTrack};
use crate::assets::io::AssetReaderVariant;
use crate::assets::kind::AssetKind;
use crate::assets::prefab::{Prefab, PrefabNode, PrefabSkeleton};
use crate::errors::{Result, RigError};
use crate::scene::mesh::Mesh;

/// Magic bytes at the start of every GLB container.
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

pub struct GltfLoader;

impl GltfLoader {
    /// Decodes `bytes` declared as `kind`.
    ///
    /// External buffer URIs are fetched through `reader`; without a reader
    /// only GLB blobs and `data:` URIs can be resolved.
    pub async fn load(bytes: &[u8], kind: AssetKind, reader: Option<&AssetReaderVariant>) -> Result<Prefab> {
        let gltf = Self::parse(bytes, kind)?;
        let buffers = Self::load_buffers(&gltf, kind, reader).await?;
        Self::build_prefab(&gltf, &buffers, kind)
    }

    /// Checks the container against the declared kind and parses the document.
    fn parse(bytes: &[u8], kind: AssetKind) -> Result<gltf::Gltf> {
        let is_glb = bytes.starts_with(GLB_MAGIC);
        match kind {
            AssetKind::SkinnedMeshBinary if !is_glb => {
                return Err(RigError::decode(kind, "missing GLB magic header"));
            }
            AssetKind::SkinnedMeshText if is_glb => {
                return Err(RigError::decode(kind, "binary GLB container declared as text glTF"));
            }
            AssetKind::HierarchyMotion => {
                return Err(RigError::decode(kind, "not a glTF asset kind"));
            }
            _ => {}
        }

        // Validation rejects dangling indices the document iterators would otherwise panic on
        gltf::Gltf::from_slice(bytes).map_err(|e| RigError::decode(kind, e.to_string()))
    }

    async fn load_buffers(gltf: &gltf::Gltf, kind: AssetKind, reader: Option<&AssetReaderVariant>) -> Result<Vec<Vec<u8>>> {
        // External buffers are fetched concurrently
        let fetches = gltf.buffers().map(|buffer| async move {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => gltf
                    .blob
                    .as_deref()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| RigError::decode(kind, "missing GLB binary chunk"))?,
                gltf::buffer::Source::Uri(uri) => {
                    if let Some(encoded) = data_uri_payload(uri) {
                        base64::engine::general_purpose::STANDARD.decode(encoded)?
                    } else if let Some(reader) = reader {
                        reader.read_bytes(uri).await?
                    } else {
                        return Err(RigError::AssetNotFound(uri.to_string()));
                    }
                }
            };

            if data.len() < buffer.length() {
                return Err(RigError::decode(
                    kind,
                    format!("buffer {} is {} bytes, expected {}", buffer.index(), data.len(), buffer.length()),
                ));
            }
            Ok(data)
        });

        futures::future::try_join_all(fetches).await
    }

    fn build_prefab(gltf: &gltf::Gltf, buffers: &[Vec<u8>], kind: AssetKind) -> Result<Prefab> {
        let mut prefab = Prefab::new();

        // Step 1: nodes and transforms, indices mirror the document
        for node in gltf.nodes() {
            let (t, r, s) = node.transform().decomposed();
            let mut prefab_node = PrefabNode::named(node_name(&node));
            prefab_node.transform.position = Vec3::from_array(t);
            prefab_node.transform.rotation = Quat::from_array(r);
            prefab_node.transform.scale = Vec3::from_array(s);
            prefab_node.children_indices = node.children().map(|c| c.index()).collect();
            prefab_node.mesh = Self::load_mesh(&node, buffers, kind)?;
            prefab_node.skin_index = node.skin().map(|s| s.index());
            prefab.nodes.push(prefab_node);
        }

        // Step 2: roots of the default scene, else every parentless node
        prefab.root_indices = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
            Some(scene) => scene.nodes().map(|n| n.index()).collect(),
            None => {
                let children: FxHashSet<usize> = gltf.nodes().flat_map(|n| n.children().map(|c| c.index())).collect();
                (0..prefab.nodes.len()).filter(|i| !children.contains(i)).collect()
            }
        };

        // Step 3: skins
        prefab.skeletons = Self::load_skins(gltf, buffers);
        for skeleton in &prefab.skeletons {
            for &bone in &skeleton.bone_indices {
                if let Some(node) = prefab.nodes.get_mut(bone) {
                    node.is_bone = true;
                }
            }
        }

        // Step 4: animations
        prefab.animations = Self::load_animations(gltf, buffers, kind)?;

        log::debug!(
            "glTF decoded: {} nodes, {} meshes, {} skins, {} animations",
            prefab.nodes.len(),
            prefab.mesh_count(),
            prefab.skeletons.len(),
            prefab.animations.len()
        );

        Ok(prefab)
    }

    /// Merges every triangle primitive of the node's mesh.
    fn load_mesh(node: &gltf::Node, buffers: &[Vec<u8>], kind: AssetKind) -> Result<Option<Mesh>> {
        let Some(gltf_mesh) = node.mesh() else {
            return Ok(None);
        };

        let mut mesh = Mesh::new(gltf_mesh.name().unwrap_or("Mesh"));

        for primitive in gltf_mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!("Skipping non-triangle primitive in mesh '{}'", mesh.name);
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| RigError::decode(kind, format!("primitive of '{}' has no positions", mesh.name)))?
                .map(Vec3::from_array)
                .collect();
            let count = positions.len();

            let joints: Vec<[u16; 4]> = reader
                .read_joints(0)
                .map(|j| j.into_u16().collect())
                .unwrap_or_default();
            let weights: Vec<Vec4> = reader
                .read_weights(0)
                .map(|w| w.into_f32().map(Vec4::from_array).collect())
                .unwrap_or_default();
            let indices: Vec<u32> = reader
                .read_indices()
                .map_or_else(|| (0..count as u32).collect(), |i| i.into_u32().collect());

            let skinned = joints.len() == count && weights.len() == count;
            if !mesh.positions.is_empty() && skinned != mesh.is_skinned() {
                log::warn!("Mesh '{}' mixes skinned and rigid primitives; dropping skin attributes", mesh.name);
            }

            mesh.append(Mesh {
                name: String::new(),
                positions,
                joints: if skinned { joints } else { Vec::new() },
                weights: if skinned { weights } else { Vec::new() },
                indices,
            });
        }

        if mesh.joints.len() != mesh.positions.len() || mesh.weights.len() != mesh.positions.len() {
            mesh.joints.clear();
            mesh.weights.clear();
        }

        Ok(Some(mesh))
    }

    fn load_skins(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<PrefabSkeleton> {
        let mut skeletons = Vec::new();

        for skin in gltf.skins() {
            let name = skin.name().unwrap_or("Skeleton").to_string();
            let joints: Vec<gltf::Node> = skin.joints().collect();

            let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let mut ibms: Vec<Affine3A> = reader
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Affine3A::from_mat4(Mat4::from_cols_array_2d(&m))).collect())
                .unwrap_or_default();
            ibms.resize(joints.len(), Affine3A::IDENTITY);

            let joint_indices: FxHashSet<usize> = joints.iter().map(gltf::Node::index).collect();
            let child_joint_indices: FxHashSet<usize> = joints
                .iter()
                .flat_map(|n| n.children().map(|c| c.index()))
                .filter(|i| joint_indices.contains(i))
                .collect();

            let roots: Vec<usize> = joints
                .iter()
                .enumerate()
                .filter(|(_, n)| !child_joint_indices.contains(&n.index()))
                .map(|(i, _)| i)
                .collect();
            if roots.len() > 1 {
                log::warn!("Skin '{name}' has {} root joints; using the first", roots.len());
            }

            let root_bone_index = skin
                .skeleton()
                .and_then(|root| joints.iter().position(|n| n.index() == root.index()))
                .filter(|i| roots.contains(i))
                .or_else(|| roots.first().copied())
                .unwrap_or(0);

            skeletons.push(PrefabSkeleton {
                name,
                root_bone_index,
                bone_indices: joints.iter().map(gltf::Node::index).collect(),
                inverse_bind_matrices: ibms,
            });
        }

        skeletons
    }

    /// Rejects samplers whose output count does not fit their input count.
    fn load_animations(gltf: &gltf::Gltf, buffers: &[Vec<u8>], kind: AssetKind) -> Result<Vec<AnimationClip>> {
        let mut animations = Vec::new();

        for (anim_index, anim) in gltf.animations().enumerate() {
            let mut tracks = Vec::new();

            for channel in anim.channels() {
                let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                let target = channel.target();
                let node_name = node_name(&target.node());

                let Some(inputs) = reader.read_inputs() else {
                    continue;
                };
                let times: Vec<f32> = inputs.collect();
                let Some(outputs) = reader.read_outputs() else {
                    continue;
                };

                let interpolation = match channel.sampler().interpolation() {
                    gltf::animation::Interpolation::Linear => InterpolationMode::Linear,
                    gltf::animation::Interpolation::Step => InterpolationMode::Step,
                    gltf::animation::Interpolation::CubicSpline => InterpolationMode::CubicSpline,
                };

                let (target_path, data) = match outputs {
                    ReadOutputs::Translations(iter) => (
                        TargetPath::Translation,
                        TrackData::Vector3(KeyframeTrack::new(times, iter.map(Vec3::from_array).collect(), interpolation)),
                    ),
                    ReadOutputs::Rotations(iter) => (
                        TargetPath::Rotation,
                        TrackData::Quaternion(KeyframeTrack::new(
                            times,
                            iter.into_f32().map(Quat::from_array).collect(),
                            interpolation,
                        )),
                    ),
                    ReadOutputs::Scales(iter) => (
                        TargetPath::Scale,
                        TrackData::Vector3(KeyframeTrack::new(times, iter.map(Vec3::from_array).collect(), interpolation)),
                    ),
                    ReadOutputs::MorphTargetWeights(_) => {
                        log::debug!("Ignoring morph target weights on '{node_name}'");
                        continue;
                    }
                };

                let (value_count, expected) = data.value_counts();
                if value_count != expected {
                    return Err(RigError::decode(
                        kind,
                        format!(
                            "animation {anim_index}: '{node_name}.{}' has {value_count} values for {} keyframes",
                            target_path.as_str(),
                            data.keyframe_count()
                        ),
                    ));
                }

                tracks.push(Track {
                    meta: TrackMeta {
                        node_name,
                        target: target_path,
                    },
                    data,
                });
            }

            let name = anim.name().map_or_else(|| format!("Animation_{anim_index}"), str::to_string);
            animations.push(AnimationClip::new(name, tracks));
        }

        Ok(animations)
    }
}

/// Node name, or `Node_{index}` for unnamed nodes.
fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map_or_else(|| format!("Node_{}", node.index()), str::to_string)
}

/// Base64 payload of a `data:...;base64,` URI.
fn data_uri_payload(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    header.ends_with(";base64").then_some(payload)
}
