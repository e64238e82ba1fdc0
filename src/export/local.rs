//! Local glTF writer.
//!
//! Serializes an instance subtree (nodes, meshes, skins) plus a set of clips
//! into a binary GLB container or a text glTF document with the buffer
//! embedded as a base64 `data:` URI.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::animation::binding::TargetPath;
use crate::animation::clip::{AnimationClip, TrackData};
use crate::animation::tracks::InterpolationMode;
use crate::assets::loaders::GLB_MAGIC;
use crate::errors::{Result, RigError};
use crate::scene::{NodeHandle, Scene, SkeletonKey};

const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_U16: u32 = 5123;
const COMPONENT_U32: u32 = 5125;
const COMPONENT_F32: u32 = 5126;

const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

const MODE_TRIANGLES: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// GLB container when set, text glTF otherwise.
    pub binary: bool,
}

/// Encoded export result, ready to be written under a caller-chosen name.
#[derive(Debug, Clone)]
pub struct ExportBlob {
    pub bytes: Vec<u8>,
    pub binary: bool,
}

impl ExportBlob {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.binary { "glb" } else { "gltf" }
    }

    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        if self.binary {
            "model/gltf-binary"
        } else {
            "model/gltf+json"
        }
    }

    /// `stem` with the extension of this blob's container.
    #[must_use]
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }
}

/// Encodes the subtree of `root` and `clips`.
///
/// Every failure is reported as [`RigError::ExportFailed`].
pub fn export_local(scene: &Scene, root: NodeHandle, clips: &[Arc<AnimationClip>], options: ExportOptions) -> Result<ExportBlob> {
    let blob = build(scene, root, clips, options).map_err(|e| match e {
        RigError::ExportFailed(_) => e,
        other => RigError::ExportFailed(other.to_string()),
    })?;
    log::info!(
        "Exported {} bytes as {} ({} clips)",
        blob.bytes.len(),
        blob.extension(),
        clips.len()
    );
    Ok(blob)
}

fn build(scene: &Scene, root: NodeHandle, clips: &[Arc<AnimationClip>], options: ExportOptions) -> Result<ExportBlob> {
    if !scene.nodes.contains_key(root) {
        return Err(RigError::ExportFailed("export root is not in the scene".to_string()));
    }

    let mut writer = DocumentWriter::default();
    writer.write_nodes(scene, root)?;
    for clip in clips {
        writer.write_clip(clip)?;
    }

    let DocumentWriter {
        mut document,
        buffer,
        ..
    } = writer;

    if options.binary {
        if !buffer.data.is_empty() {
            document.buffers.push(BufferDef {
                byte_length: buffer.data.len(),
                uri: None,
            });
        }
        let json = serde_json::to_vec(&document)?;
        Ok(ExportBlob {
            bytes: assemble_glb(&json, &buffer.data),
            binary: true,
        })
    } else {
        if !buffer.data.is_empty() {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&buffer.data);
            document.buffers.push(BufferDef {
                byte_length: buffer.data.len(),
                uri: Some(format!("data:application/octet-stream;base64,{encoded}")),
            });
        }
        Ok(ExportBlob {
            bytes: serde_json::to_vec_pretty(&document)?,
            binary: false,
        })
    }
}

/// Wraps a JSON document and its binary buffer into a GLB container.
#[must_use]
pub fn assemble_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padding = (4 - json.len() % 4) % 4;
    let json_chunk_length = json.len() + json_padding;

    let bin_padding = (4 - bin.len() % 4) % 4;
    let bin_chunk_length = bin.len() + bin_padding;

    let mut total_length = 12 + 8 + json_chunk_length;
    if !bin.is_empty() {
        total_length += 8 + bin_chunk_length;
    }

    let mut glb = Vec::with_capacity(total_length);

    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json);
    glb.resize(glb.len() + json_padding, b' ');

    if !bin.is_empty() {
        glb.extend_from_slice(&(bin_chunk_length as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(bin);
        glb.resize(glb.len() + bin_padding, 0);
    }

    glb
}

// ============================================================================
// Document model
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: AssetInfo,
    scene: usize,
    scenes: Vec<SceneDef>,
    nodes: Vec<NodeDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<MeshDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skins: Vec<SkinDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    animations: Vec<AnimationDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<AccessorDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferViewDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<BufferDef>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            asset: AssetInfo {
                version: "2.0",
                generator: concat!("rigview ", env!("CARGO_PKG_VERSION")),
            },
            scene: 0,
            scenes: Vec::new(),
            nodes: Vec::new(),
            meshes: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            buffers: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct AssetInfo {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct SceneDef {
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct NodeDef {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<usize>,
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skin: Option<usize>,
}

#[derive(Serialize)]
struct MeshDef {
    name: String,
    primitives: Vec<PrimitiveDef>,
}

#[derive(Serialize)]
struct PrimitiveDef {
    attributes: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indices: Option<usize>,
    mode: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SkinDef {
    name: String,
    joints: Vec<usize>,
    inverse_bind_matrices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    skeleton: Option<usize>,
}

#[derive(Serialize)]
struct AnimationDef {
    name: String,
    channels: Vec<ChannelDef>,
    samplers: Vec<SamplerDef>,
}

#[derive(Serialize)]
struct ChannelDef {
    sampler: usize,
    target: ChannelTarget,
}

#[derive(Serialize)]
struct ChannelTarget {
    node: usize,
    path: &'static str,
}

#[derive(Serialize)]
struct SamplerDef {
    input: usize,
    output: usize,
    interpolation: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessorDef {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    type_: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<Vec<f32>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewDef {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferDef {
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

// ============================================================================
// Buffer packing
// ============================================================================

#[derive(Default)]
struct BufferBuilder {
    data: Vec<u8>,
}

impl BufferBuilder {
    /// Appends `bytes` 4-byte aligned and returns their offset.
    fn push(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        offset
    }
}

#[derive(Default)]
struct DocumentWriter {
    document: Document,
    buffer: BufferBuilder,
    node_indices: FxHashMap<NodeHandle, usize>,
    /// First exported node per name, in pre-order.
    names: FxHashMap<String, usize>,
}

impl DocumentWriter {
    fn accessor<T: bytemuck::Pod>(
        &mut self,
        items: &[T],
        component_type: u32,
        type_: &'static str,
        target: Option<u32>,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> usize {
        let bytes: &[u8] = bytemuck::cast_slice(items);
        let byte_offset = self.buffer.push(bytes);

        self.document.buffer_views.push(BufferViewDef {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            target,
        });

        let (min, max) = bounds.unzip();
        self.document.accessors.push(AccessorDef {
            buffer_view: self.document.buffer_views.len() - 1,
            component_type,
            count: items.len(),
            type_,
            min,
            max,
        });
        self.document.accessors.len() - 1
    }

    fn write_nodes(&mut self, scene: &Scene, root: NodeHandle) -> Result<()> {
        let handles = scene.traverse(root);
        for (i, &h) in handles.iter().enumerate() {
            self.node_indices.insert(h, i);
        }

        let mut skins: FxHashMap<SkeletonKey, usize> = FxHashMap::default();

        for (i, &h) in handles.iter().enumerate() {
            let Some(node) = scene.get_node(h) else {
                continue;
            };
            let name = scene.name(h).unwrap_or_default().to_string();
            self.names.entry(name.clone()).or_insert(i);

            let t = &node.transform;
            let mut def = NodeDef {
                name,
                children: node
                    .children()
                    .iter()
                    .filter_map(|c| self.node_indices.get(c).copied())
                    .collect(),
                translation: t.position.to_array(),
                rotation: t.rotation.to_array(),
                scale: t.scale.to_array(),
                mesh: None,
                skin: None,
            };

            if let Some(mesh) = scene.mesh_of(h)
                && !mesh.positions.is_empty()
            {
                let bounds = mesh
                    .local_bounds()
                    .map(|b| (b.min.to_array().to_vec(), b.max.to_array().to_vec()));

                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "POSITION",
                    self.accessor(&mesh.positions, COMPONENT_F32, "VEC3", Some(TARGET_ARRAY_BUFFER), bounds),
                );
                if mesh.is_skinned() {
                    attributes.insert(
                        "JOINTS_0",
                        self.accessor(&mesh.joints, COMPONENT_U16, "VEC4", Some(TARGET_ARRAY_BUFFER), None),
                    );
                    attributes.insert(
                        "WEIGHTS_0",
                        self.accessor(&mesh.weights, COMPONENT_F32, "VEC4", Some(TARGET_ARRAY_BUFFER), None),
                    );
                }
                let indices = (!mesh.indices.is_empty()).then(|| {
                    self.accessor(&mesh.indices, COMPONENT_U32, "SCALAR", Some(TARGET_ELEMENT_ARRAY_BUFFER), None)
                });

                self.document.meshes.push(MeshDef {
                    name: mesh.name.clone(),
                    primitives: vec![PrimitiveDef {
                        attributes,
                        indices,
                        mode: MODE_TRIANGLES,
                    }],
                });
                def.mesh = Some(self.document.meshes.len() - 1);

                if mesh.is_skinned()
                    && let Some(binding) = scene.skins.get(h)
                {
                    let skin = match skins.get(&binding.skeleton) {
                        Some(&s) => s,
                        None => {
                            let s = self.write_skin(scene, binding.skeleton)?;
                            skins.insert(binding.skeleton, s);
                            s
                        }
                    };
                    def.skin = Some(skin);
                }
            }

            self.document.nodes.push(def);
        }

        self.document.scenes.push(SceneDef { nodes: vec![0] });
        Ok(())
    }

    fn write_skin(&mut self, scene: &Scene, key: SkeletonKey) -> Result<usize> {
        let skeleton = scene
            .skeletons
            .get(key)
            .ok_or_else(|| RigError::ExportFailed("skin binding points at a removed skeleton".to_string()))?;

        let joints = skeleton
            .bones
            .iter()
            .map(|b| {
                self.node_indices.get(b).copied().ok_or_else(|| {
                    RigError::ExportFailed(format!("bone of skeleton '{}' is outside the exported hierarchy", skeleton.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let matrices: Vec<[f32; 16]> = skeleton
            .inverse_bind_matrices()
            .iter()
            .map(|m| Mat4::from(*m).to_cols_array())
            .collect();
        let ibm = self.accessor(&matrices, COMPONENT_F32, "MAT4", None, None);

        let root = skeleton.root_bone().and_then(|r| self.node_indices.get(&r).copied());

        self.document.skins.push(SkinDef {
            name: skeleton.name.clone(),
            joints,
            inverse_bind_matrices: ibm,
            skeleton: root,
        });
        Ok(self.document.skins.len() - 1)
    }

    fn write_clip(&mut self, clip: &AnimationClip) -> Result<()> {
        let mut animation = AnimationDef {
            name: clip.name.clone(),
            channels: Vec::new(),
            samplers: Vec::new(),
        };

        for track in &clip.tracks {
            let Some(&node) = self.names.get(&track.meta.node_name) else {
                log::debug!("Export: no node '{}' for clip '{}'", track.meta.node_name, clip.name);
                continue;
            };

            let (times, interpolation) = match &track.data {
                TrackData::Vector3(t) => (&t.times, t.interpolation),
                TrackData::Quaternion(t) => (&t.times, t.interpolation),
            };
            if times.is_empty() {
                continue;
            }
            let (value_count, expected) = track.data.value_counts();
            if value_count != expected {
                return Err(RigError::ExportFailed(format!(
                    "track '{}.{}' of clip '{}' has {value_count} values for {} keyframes",
                    track.meta.node_name,
                    track.meta.target.as_str(),
                    clip.name,
                    times.len()
                )));
            }

            let time_bounds = (
                vec![times.iter().copied().fold(f32::INFINITY, f32::min)],
                vec![times.iter().copied().fold(f32::NEG_INFINITY, f32::max)],
            );
            let input = self.accessor(times, COMPONENT_F32, "SCALAR", None, Some(time_bounds));
            let output = match &track.data {
                TrackData::Vector3(t) => self.accessor::<Vec3>(&t.values, COMPONENT_F32, "VEC3", None, None),
                TrackData::Quaternion(t) => self.accessor(&t.values, COMPONENT_F32, "VEC4", None, None),
            };

            animation.samplers.push(SamplerDef {
                input,
                output,
                interpolation: match interpolation {
                    InterpolationMode::Linear => "LINEAR",
                    InterpolationMode::Step => "STEP",
                    InterpolationMode::CubicSpline => "CUBICSPLINE",
                },
            });
            animation.channels.push(ChannelDef {
                sampler: animation.samplers.len() - 1,
                target: ChannelTarget {
                    node,
                    path: match track.meta.target {
                        TargetPath::Translation => "translation",
                        TargetPath::Rotation => "rotation",
                        TargetPath::Scale => "scale",
                    },
                },
            });
        }

        if animation.channels.is_empty() {
            log::debug!("Export: clip '{}' animates no exported node; skipped", clip.name);
            return Ok(());
        }

        self.document.animations.push(animation);
        Ok(())
    }
}
