//! The owning view.
//!
//! [`ModelViewer`] runs the whole pipeline for one asset at a time:
//! load, normalize, fit, locate the skeleton, register clips, play. It owns
//! its scene exclusively; the only thing it hands out is an
//! [`ExportHandle`] through which other parts of an application can request
//! local exports.

use std::sync::Arc;

use crate::animation::{
    ClipOrigin, PlaybackController, PlaybackState, RetargetCache, RetargetOptions, RigSkeleton, locate_skeleton,
};
use crate::animation::clip::AnimationClip;
use crate::assets::{Asset, AssetKind, AssetLoader, AssetReaderVariant, BvhLoader, LoadTicket, LoadTickets};
use crate::config::ViewerConfig;
use crate::errors::{Result, RigError};
use crate::export::{ExportBlob, ExportOptions, export_local};
use crate::normalize::{BoundsNormalizer, NormalizationResult, NormalizedScene, SceneNormalizer};
use crate::scene::Scene;

/// The asset currently shown by a viewer.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub asset: Asset,
    pub normalized: NormalizedScene,
    pub normalization: NormalizationResult,
    /// Skeleton uploaded clips are retargeted onto, if the rig has one.
    pub skeleton: Option<RigSkeleton>,
}

enum ExportCommand {
    Local {
        options: ExportOptions,
        reply: flume::Sender<Result<ExportBlob>>,
    },
}

/// Requests exports from the viewer that issued it.
///
/// Requests are served the next time the viewer is updated.
#[derive(Clone)]
pub struct ExportHandle {
    sender: flume::Sender<ExportCommand>,
}

impl ExportHandle {
    /// Queues a local export and returns the channel its result arrives on.
    pub fn export_local(&self, options: ExportOptions) -> Result<flume::Receiver<Result<ExportBlob>>> {
        let (reply, receiver) = flume::bounded(1);
        self.sender
            .send(ExportCommand::Local { options, reply })
            .map_err(|_| RigError::ExportFailed("viewer is gone".to_string()))?;
        Ok(receiver)
    }
}

pub struct ModelViewer {
    config: ViewerConfig,
    loader: AssetLoader,
    tickets: Arc<LoadTickets>,

    scene: Scene,
    model: Option<LoadedModel>,

    normalizer: SceneNormalizer,
    bounds: BoundsNormalizer,
    retarget_cache: RetargetCache,
    playback: PlaybackController,

    export_sender: flume::Sender<ExportCommand>,
    export_receiver: flume::Receiver<ExportCommand>,
}

impl Default for ModelViewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl ModelViewer {
    #[must_use]
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_loader(config, AssetLoader::new())
    }

    /// Creates a viewer sharing decoded templates with other views.
    #[must_use]
    pub fn with_loader(config: ViewerConfig, loader: AssetLoader) -> Self {
        let (export_sender, export_receiver) = flume::unbounded();
        Self {
            normalizer: SceneNormalizer::new(config.placeholder_size),
            bounds: BoundsNormalizer::new(config.target_height),
            playback: PlaybackController::new(config.crossfade_seconds),
            retarget_cache: RetargetCache::new(),
            scene: Scene::new(),
            model: None,
            loader,
            tickets: Arc::new(LoadTickets::new()),
            export_sender,
            export_receiver,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    #[must_use]
    pub fn normalization(&self) -> Option<NormalizationResult> {
        self.model.as_ref().map(|m| m.normalization)
    }

    #[inline]
    #[must_use]
    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        self.playback.state()
    }

    #[must_use]
    pub fn clip_names(&self) -> Vec<String> {
        self.playback.clip_names()
    }

    #[must_use]
    pub fn retarget_cache(&self) -> &RetargetCache {
        &self.retarget_cache
    }

    #[must_use]
    pub fn export_handle(&self) -> ExportHandle {
        ExportHandle {
            sender: self.export_sender.clone(),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Loads `source` as `kind` and installs it, replacing the current asset.
    pub async fn load(&mut self, source: &str, kind: AssetKind) -> Result<()> {
        let (ticket, pending) = self.request_load(source, kind);
        let result = pending.await;
        self.apply_load(ticket, result).map(|_| ())
    }

    /// Installs an asset decoded elsewhere, e.g. by
    /// [`AssetLoader::load_from_bytes`]. Supersedes any pending request.
    pub fn install_asset(&mut self, asset: Asset) -> Result<()> {
        let ticket = self.tickets.issue();
        self.apply_load(ticket, Ok(asset)).map(|_| ())
    }

    /// Starts a load without borrowing the viewer.
    ///
    /// The returned future can run anywhere; feed its output back through
    /// [`apply_load`](Self::apply_load). Issuing another request makes this
    /// one stale.
    pub fn request_load(
        &self,
        source: &str,
        kind: AssetKind,
    ) -> (LoadTicket, impl Future<Output = Result<Asset>> + Send + 'static) {
        let ticket = self.tickets.issue();
        let loader = self.loader.clone();
        let source = source.to_string();
        (ticket, async move { loader.load(&source, kind).await })
    }

    /// Installs the outcome of a load request.
    ///
    /// Returns `Ok(false)` when a newer request superseded `ticket`; the
    /// result is dropped and the view is left untouched. A failed load
    /// leaves the view empty.
    pub fn apply_load(&mut self, ticket: LoadTicket, result: Result<Asset>) -> Result<bool> {
        if !self.tickets.is_current(ticket) {
            log::debug!("Discarding superseded load {ticket:?}");
            return Ok(false);
        }

        let asset = match result {
            Ok(asset) => asset,
            Err(e) => {
                self.unload();
                return Err(e);
            }
        };

        if let Err(e) = self.install(asset) {
            self.unload();
            return Err(e);
        }
        Ok(true)
    }

    fn install(&mut self, asset: Asset) -> Result<()> {
        self.unload();

        let name = AssetReaderVariant::source_stem(&asset.source).to_string();
        let normalized = self
            .normalizer
            .normalize(&mut self.scene, &asset.prefab, asset.kind, &name)?;
        let normalization = self.bounds.fit(&mut self.scene, normalized.root);
        let skeleton = locate_skeleton(&self.scene, normalized.mixer_target);

        self.playback.attach_target(normalized.mixer_target);
        for clip in asset.clips() {
            self.playback
                .register_clip(&clip.name, Arc::new(clip.clone()), ClipOrigin::Embedded);
        }

        log::info!(
            "Loaded '{name}' ({}): {} clips, {} bones, scale {:.4}",
            asset.kind,
            asset.clips().len(),
            skeleton.as_ref().map_or(0, |s| s.bones.len()),
            normalization.scale_factor
        );

        self.model = Some(LoadedModel {
            asset,
            normalized,
            normalization,
            skeleton,
        });

        if self.config.autoplay {
            self.playback.play(&self.scene)?;
        }
        Ok(())
    }

    /// Removes the current asset and every clip; the view goes back to idle.
    pub fn unload(&mut self) {
        self.playback.reset();
        if let Some(model) = self.model.take() {
            self.scene.remove_node(model.normalized.root);
        }
        self.retarget_cache.clear();
        self.bounds.invalidate();
    }

    // ========================================================================
    // Motion clips
    // ========================================================================

    /// Adds an uploaded BVH clip: parse, retarget onto the loaded rig,
    /// register under a unique name, select and play it.
    ///
    /// The clip name defaults to the file stem. Returns the registered name.
    pub fn add_motion_clip(&mut self, file_name: &str, text: &str) -> Result<String> {
        let stem = AssetReaderVariant::source_stem(file_name).to_string();
        let prefab = BvhLoader::parse(text, &stem)?;
        let clip = prefab
            .animations
            .into_iter()
            .next()
            .ok_or_else(|| RigError::decode(AssetKind::HierarchyMotion, "no motion in file"))?;
        self.register_motion(&stem, &clip)
    }

    /// Like [`add_motion_clip`](Self::add_motion_clip) for a path or URL.
    ///
    /// The decoded motion is shared through the template cache.
    pub async fn load_motion(&mut self, source: &str) -> Result<String> {
        let asset = self.loader.load(source, AssetKind::HierarchyMotion).await?;
        let clip = asset
            .clips()
            .first()
            .ok_or_else(|| RigError::decode(AssetKind::HierarchyMotion, "no motion in file"))?;
        let stem = AssetReaderVariant::source_stem(source).to_string();
        self.register_motion(&stem, clip)
    }

    fn register_motion(&mut self, name: &str, source: &AnimationClip) -> Result<String> {
        let model = self.model.as_ref().ok_or(RigError::NoAnimationTarget)?;

        // The clip carries the same name it is registered under
        let name = self.playback.library().unique_name(name);
        let options = RetargetOptions {
            name: Some(name.clone()),
            hip_scale: self.config.hip_scale,
        };
        let (clip, skipped) = self
            .retarget_cache
            .get_or_retarget(model.skeleton.as_ref(), source, &options);
        let origin = if skipped {
            ClipOrigin::Uploaded
        } else {
            ClipOrigin::Retargeted
        };

        let registered = self.playback.register_clip(&name, clip, origin);
        self.playback.select_clip(&self.scene, &registered)?;
        Ok(registered)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub fn select_clip(&mut self, name: &str) -> Result<()> {
        self.playback.select_clip(&self.scene, name)
    }

    pub fn play(&mut self) -> Result<()> {
        self.playback.play(&self.scene)
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    /// Advances playback by `dt` seconds, refreshes world matrices and
    /// serves queued export requests.
    pub fn update(&mut self, dt: f32) {
        self.playback.update(dt, &mut self.scene);
        self.scene.update_matrix_world();
        self.process_export_requests();
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Encodes the current asset and every registered clip.
    pub fn export_local(&self, options: ExportOptions) -> Result<ExportBlob> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RigError::ExportFailed("no asset loaded".to_string()))?;
        let clips: Vec<Arc<AnimationClip>> = self.playback.library().iter().map(|e| e.clip.clone()).collect();
        export_local(&self.scene, model.normalized.root, &clips, options)
    }

    /// Serves every export request queued through an [`ExportHandle`].
    pub fn process_export_requests(&mut self) {
        while let Ok(command) = self.export_receiver.try_recv() {
            match command {
                ExportCommand::Local { options, reply } => {
                    let result = self.export_local(options);
                    if let Err(e) = &result {
                        log::warn!("Export request failed: {e}");
                    }
                    let _ = reply.send(result);
                }
            }
        }
    }
}
