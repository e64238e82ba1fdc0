//! Asset Loading Tests
//!
//! Tests for:
//! - Declared kind dispatch
//! - Malformed glTF documents rejected as decode errors
//! - Malformed BVH headers rejected as decode errors

mod common;

use base64::Engine as _;

use common::WALK_BVH;
use rigview::assets::{AssetKind, AssetLoader, GltfLoader};
use rigview::errors::RigError;

/// Text glTF with one `Hips` node and a translation sampler whose output
/// holds `output_count` of the two keyframes it needs.
fn sampler_document(output_count: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    for t in [0.0_f32, 1.0] {
        buffer.extend_from_slice(&t.to_le_bytes());
    }
    for _ in 0..output_count {
        for v in [0.0_f32, 1.0, 0.0] {
            buffer.extend_from_slice(&v.to_le_bytes());
        }
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(&buffer);
    let output_bytes = output_count * 12;

    serde_json::json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Hips" }],
        "buffers": [{
            "byteLength": buffer.len(),
            "uri": format!("data:application/octet-stream;base64,{encoded}")
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 8, "byteLength": output_bytes }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0] },
            { "bufferView": 1, "componentType": 5126, "count": output_count, "type": "VEC3" }
        ],
        "animations": [{
            "name": "Bob",
            "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }],
            "samplers": [{ "input": 0, "output": 1, "interpolation": "LINEAR" }]
        }]
    })
    .to_string()
    .into_bytes()
}

// ============================================================================
// Kind dispatch
// ============================================================================

#[tokio::test]
async fn glb_kind_requires_magic() {
    let err = GltfLoader::load(&sampler_document(2), AssetKind::SkinnedMeshBinary, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RigError::Decode { kind: AssetKind::SkinnedMeshBinary, .. }));
}

// ============================================================================
// glTF validation
// ============================================================================

#[tokio::test]
async fn well_formed_sampler_loads() {
    let prefab = GltfLoader::load(&sampler_document(2), AssetKind::SkinnedMeshText, None)
        .await
        .unwrap();
    assert_eq!(prefab.animations.len(), 1);
    assert_eq!(prefab.animations[0].name, "Bob");
    assert_eq!(prefab.animations[0].tracks[0].data.keyframe_count(), 2);
}

#[tokio::test]
async fn dangling_node_index_is_decode_error() {
    let doc = br#"{"asset":{"version":"2.0"},"nodes":[{"name":"a","children":[7]}]}"#;
    let err = GltfLoader::load(doc, AssetKind::SkinnedMeshText, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RigError::Decode { kind: AssetKind::SkinnedMeshText, .. }));
}

#[tokio::test]
async fn short_sampler_output_is_decode_error() {
    let err = GltfLoader::load(&sampler_document(1), AssetKind::SkinnedMeshText, None)
        .await
        .unwrap_err();
    match err {
        RigError::Decode { reason, .. } => assert!(reason.contains("1 values for 2 keyframes"), "{reason}"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

// ============================================================================
// BVH validation
// ============================================================================

#[tokio::test]
async fn absurd_frame_count_is_decode_error() {
    let text = WALK_BVH.replace("Frames: 2", "Frames: 4611686018427387904");
    let err = AssetLoader::new()
        .load_from_bytes("walk.bvh", text.into_bytes(), AssetKind::HierarchyMotion)
        .await
        .unwrap_err();
    assert!(matches!(err, RigError::Decode { kind: AssetKind::HierarchyMotion, .. }));
}

#[tokio::test]
async fn frame_count_above_data_is_decode_error() {
    let text = WALK_BVH.replace("Frames: 2", "Frames: 3");
    let result = AssetLoader::new()
        .load_from_bytes("walk.bvh", text.into_bytes(), AssetKind::HierarchyMotion)
        .await;
    assert!(matches!(result, Err(RigError::Decode { .. })));
}
