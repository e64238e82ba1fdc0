//! Viewer Pipeline Tests
//!
//! Tests for:
//! - Installing skinned and hierarchy-only assets end to end
//! - Motion uploads: retargeting, naming, rigs without bones
//! - Load tickets superseding stale requests
//! - Export requests served through an ExportHandle
//! - Unload

mod common;

use std::sync::Arc;

use common::{EPSILON, WALK_BVH, approx, character_prefab, prop_prefab};
use rigview::animation::{ClipOrigin, PlaybackState};
use rigview::assets::{Asset, AssetKind, AssetLoader};
use rigview::config::ViewerConfig;
use rigview::errors::RigError;
use rigview::export::ExportOptions;
use rigview::normalize::PLACEHOLDER_NODE_NAME;
use rigview::viewer::ModelViewer;

fn asset(source: &str, kind: AssetKind, prefab: rigview::assets::Prefab) -> Asset {
    Asset {
        source: source.to_string(),
        kind,
        prefab: Arc::new(prefab),
    }
}

fn hero_viewer() -> ModelViewer {
    let mut viewer = ModelViewer::default();
    viewer
        .install_asset(asset("hero.glb", AssetKind::SkinnedMeshBinary, character_prefab()))
        .unwrap();
    viewer
}

// ============================================================================
// Installing assets
// ============================================================================

#[test]
fn skinned_asset_plays_first_embedded_clip() {
    let viewer = hero_viewer();

    assert_eq!(viewer.clip_names(), vec!["Wave", "Idle"]);
    assert_eq!(*viewer.state(), PlaybackState::Playing("Wave".to_string()));

    let model = viewer.model().unwrap();
    assert_eq!(model.skeleton.as_ref().unwrap().bones.len(), 2);
    assert_eq!(
        viewer.playback().library().get("Idle").unwrap().origin,
        ClipOrigin::Embedded
    );
}

#[test]
fn skinned_asset_is_fitted_to_target_height() {
    let viewer = hero_viewer();
    let result = viewer.normalization().unwrap();
    assert!(approx(result.scale_factor, 2.0 / 1.8));

    let root = viewer.model().unwrap().normalized.root;
    let bounds = viewer.scene().world_bounds(root).unwrap();
    assert!((bounds.size().y - 2.0).abs() < 1e-4);
    assert!(bounds.min.y.abs() < 1e-4);
    assert!(bounds.center().x.abs() < 1e-4);
    assert!(bounds.center().z.abs() < 1e-4);
}

#[test]
fn autoplay_off_stays_idle() {
    let mut viewer = ModelViewer::new(ViewerConfig {
        autoplay: false,
        ..ViewerConfig::default()
    });
    viewer
        .install_asset(asset("hero.glb", AssetKind::SkinnedMeshBinary, character_prefab()))
        .unwrap();

    assert_eq!(*viewer.state(), PlaybackState::Idle);
    viewer.play().unwrap();
    assert_eq!(*viewer.state(), PlaybackState::Playing("Wave".to_string()));
}

#[tokio::test]
async fn hierarchy_only_asset_gets_placeholder_and_plays() {
    let loaded = AssetLoader::new()
        .load_from_bytes("walk.bvh", WALK_BVH.as_bytes().to_vec(), AssetKind::HierarchyMotion)
        .await
        .unwrap();

    let mut viewer = ModelViewer::default();
    viewer.install_asset(loaded).unwrap();

    let model = viewer.model().unwrap();
    let scene = viewer.scene();
    assert_eq!(scene.name(model.normalized.mixer_target), Some(PLACEHOLDER_NODE_NAME));
    let meshes = scene
        .traverse(model.normalized.root)
        .into_iter()
        .filter(|&h| scene.mesh_of(h).is_some())
        .count();
    assert_eq!(meshes, 1);

    assert_eq!(viewer.clip_names(), vec!["walk"]);
    assert_eq!(*viewer.state(), PlaybackState::Playing("walk".to_string()));
}

#[tokio::test]
async fn glb_written_to_disk_loads_through_path() {
    let blob = hero_viewer().export_local(ExportOptions { binary: true }).unwrap();
    let dir = std::env::temp_dir().join(format!("rigview-pipeline-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("hero.glb");
    tokio::fs::write(&path, &blob.bytes).await.unwrap();

    let mut viewer = ModelViewer::default();
    viewer
        .load(path.to_str().unwrap(), AssetKind::SkinnedMeshBinary)
        .await
        .unwrap();

    assert_eq!(viewer.clip_names(), vec!["Wave", "Idle"]);
    assert!(viewer.model().unwrap().skeleton.is_some());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn failed_load_leaves_view_empty() {
    let mut viewer = hero_viewer();
    let err = viewer
        .load("/definitely/not/here.glb", AssetKind::SkinnedMeshBinary)
        .await
        .unwrap_err();

    assert!(matches!(err, RigError::AssetNotFound(_)));
    assert!(viewer.model().is_none());
    assert!(viewer.clip_names().is_empty());
    assert_eq!(*viewer.state(), PlaybackState::Idle);
}

// ============================================================================
// Load tickets
// ============================================================================

#[test]
fn superseded_load_is_discarded() {
    let mut viewer = ModelViewer::default();
    let (stale, _) = viewer.request_load("first.glb", AssetKind::SkinnedMeshBinary);
    let (current, _) = viewer.request_load("second.glb", AssetKind::SkinnedMeshBinary);

    let applied = viewer
        .apply_load(stale, Ok(asset("first.glb", AssetKind::SkinnedMeshBinary, character_prefab())))
        .unwrap();
    assert!(!applied);
    assert!(viewer.model().is_none());

    let applied = viewer
        .apply_load(current, Ok(asset("second.glb", AssetKind::SkinnedMeshBinary, prop_prefab())))
        .unwrap();
    assert!(applied);
    assert_eq!(viewer.model().unwrap().asset.source, "second.glb");
}

// ============================================================================
// Motion uploads
// ============================================================================

#[test]
fn motion_upload_is_retargeted_and_selected() {
    let mut viewer = hero_viewer();
    let name = viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();

    assert_eq!(name, "walk");
    assert_eq!(*viewer.state(), PlaybackState::Playing("walk".to_string()));
    assert_eq!(
        viewer.playback().library().get("walk").unwrap().origin,
        ClipOrigin::Retargeted
    );
    assert_eq!(viewer.retarget_cache().len(), 1);
}

#[test]
fn repeated_upload_gets_unique_name() {
    let mut viewer = hero_viewer();
    viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();
    let second = viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();

    assert_eq!(second, "walk (1)");
    assert_eq!(viewer.clip_names(), vec!["Wave", "Idle", "walk", "walk (1)"]);
    assert_eq!(viewer.playback().library().get("walk (1)").unwrap().clip.name, "walk (1)");
}

#[tokio::test]
async fn shared_motion_loaded_twice_keeps_distinct_names() {
    let dir = std::env::temp_dir().join(format!("rigview-motion-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("walk.bvh");
    tokio::fs::write(&path, WALK_BVH).await.unwrap();
    let source = path.to_str().unwrap();

    let mut viewer = hero_viewer();
    viewer.load_motion(source).await.unwrap();
    let second = viewer.load_motion(source).await.unwrap();

    // The decoded motion is shared, so the second upload is a cache hit
    assert_eq!(second, "walk (1)");
    assert_eq!(viewer.retarget_cache().len(), 1);
    assert_eq!(viewer.playback().library().get("walk").unwrap().clip.name, "walk");
    assert_eq!(viewer.playback().library().get("walk (1)").unwrap().clip.name, "walk (1)");

    let blob = viewer.export_local(ExportOptions { binary: false }).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&blob.bytes).unwrap();
    let names: Vec<&str> = json["animations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Wave", "Idle", "walk", "walk (1)"]);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[test]
fn upload_onto_rig_without_bones_is_kept_unretargeted() {
    let mut viewer = ModelViewer::default();
    viewer
        .install_asset(asset("crate.glb", AssetKind::SkinnedMeshBinary, prop_prefab()))
        .unwrap();
    assert!(viewer.model().unwrap().skeleton.is_none());

    let name = viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();
    assert_eq!(
        viewer.playback().library().get(&name).unwrap().origin,
        ClipOrigin::Uploaded
    );
    assert_eq!(viewer.retarget_cache().len(), 0);
}

#[test]
fn upload_without_model_fails() {
    let mut viewer = ModelViewer::default();
    let err = viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap_err();
    assert!(matches!(err, RigError::NoAnimationTarget));
}

#[test]
fn malformed_motion_is_rejected() {
    let mut viewer = hero_viewer();
    assert!(viewer.add_motion_clip("broken.bvh", "MOTION\nFrames: 1\n").is_err());
    assert_eq!(viewer.clip_names(), vec!["Wave", "Idle"]);
}

#[test]
fn motion_with_oversized_frame_count_is_rejected() {
    let mut viewer = hero_viewer();
    let text = WALK_BVH.replace("Frames: 2", "Frames: 4611686018427387904");
    let err = viewer.add_motion_clip("walk.bvh", &text).unwrap_err();
    assert!(matches!(err, RigError::Decode { kind: AssetKind::HierarchyMotion, .. }));
    assert_eq!(viewer.clip_names(), vec!["Wave", "Idle"]);
}

// ============================================================================
// Playback through the viewer
// ============================================================================

#[test]
fn update_advances_selected_clip() {
    let mut viewer = hero_viewer();
    viewer.select_clip("Idle").unwrap();
    assert_eq!(*viewer.state(), PlaybackState::Playing("Idle".to_string()));
    viewer.update(0.5);
    assert!((viewer.playback().elapsed() - 0.5).abs() < EPSILON);

    viewer.pause();
    assert_eq!(*viewer.state(), PlaybackState::Paused("Idle".to_string()));
    assert!(matches!(viewer.select_clip("Run"), Err(RigError::UnknownClip(_))));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn export_handle_is_served_on_update() {
    let mut viewer = hero_viewer();
    let handle = viewer.export_handle();
    let reply = handle.export_local(ExportOptions { binary: true }).unwrap();
    assert!(reply.try_recv().is_err());

    viewer.update(0.0);
    let blob = reply.try_recv().unwrap().unwrap();
    assert!(blob.bytes.starts_with(b"glTF"));
}

#[test]
fn export_without_model_fails() {
    let viewer = ModelViewer::default();
    let err = viewer.export_local(ExportOptions::default()).unwrap_err();
    assert!(matches!(err, RigError::ExportFailed(_)));
}

#[test]
fn export_includes_uploaded_clips() {
    let mut viewer = hero_viewer();
    viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();

    let blob = viewer.export_local(ExportOptions { binary: false }).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&blob.bytes).unwrap();
    let names: Vec<&str> = json["animations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Wave", "Idle", "walk"]);
}

// ============================================================================
// Unload
// ============================================================================

#[test]
fn unload_clears_scene_and_clips() {
    let mut viewer = hero_viewer();
    viewer.add_motion_clip("walk.bvh", WALK_BVH).unwrap();

    viewer.unload();
    assert!(viewer.model().is_none());
    assert!(viewer.clip_names().is_empty());
    assert!(viewer.scene().nodes.is_empty());
    assert_eq!(viewer.retarget_cache().len(), 0);
    assert_eq!(*viewer.state(), PlaybackState::Idle);
}
