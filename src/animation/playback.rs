use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::animation::clip::AnimationClip;
use crate::animation::library::{ClipLibrary, ClipOrigin};
use crate::animation::mixer::{ActionKey, AnimationMixer};
use crate::errors::{Result, RigError};
use crate::scene::{NodeHandle, Scene};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(String),
    Paused(String),
}

/// Owns the mixer of one view and the set of selectable clips.
///
/// Only one clip is active outside a crossfade. Switching clips fades the
/// old one out and the new one in over the same window, both driven by
/// [`PlaybackController::update`].
pub struct PlaybackController {
    mixer: Option<AnimationMixer>,
    library: ClipLibrary,
    actions: FxHashMap<String, ActionKey>,
    state: PlaybackState,
    selected: Option<String>,
    crossfade: f32,
    elapsed: f32,
}

impl PlaybackController {
    #[must_use]
    pub fn new(crossfade_seconds: f32) -> Self {
        Self {
            mixer: None,
            library: ClipLibrary::new(),
            actions: FxHashMap::default(),
            state: PlaybackState::Idle,
            selected: None,
            crossfade: crossfade_seconds.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Points the controller at a new mixer target, dropping any actions.
    pub fn attach_target(&mut self, target: NodeHandle) {
        self.unload();
        self.mixer = Some(AnimationMixer::new(target));
    }

    #[must_use]
    pub fn target(&self) -> Option<NodeHandle> {
        self.mixer.as_ref().map(AnimationMixer::root)
    }

    /// Adds a clip to the selectable set, returning its unique name.
    pub fn register_clip(&mut self, name: &str, clip: Arc<AnimationClip>, origin: ClipOrigin) -> String {
        self.library.insert(name, clip, origin)
    }

    #[must_use]
    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    #[must_use]
    pub fn clip_names(&self) -> Vec<String> {
        self.library.names()
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing(_))
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    #[must_use]
    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    /// Blend weight currently applied for `name`; `None` if it never played.
    #[must_use]
    pub fn action_weight(&self, name: &str) -> Option<f32> {
        let key = self.actions.get(name)?;
        self.mixer.as_ref()?.action(*key).map(|a| a.effective_weight())
    }

    /// Crossfades from whatever is active to `name` and starts playing it.
    pub fn select_clip(&mut self, scene: &Scene, name: &str) -> Result<()> {
        let clip = self
            .library
            .get(name)
            .map(|e| e.clip.clone())
            .ok_or_else(|| RigError::UnknownClip(name.to_string()))?;
        let mixer = self.mixer.as_mut().ok_or(RigError::NoAnimationTarget)?;

        for (other, &key) in &self.actions {
            if other == name {
                continue;
            }
            if let Some(action) = mixer.action_mut(key)
                && action.enabled
            {
                log::debug!("Crossfade: '{other}' -> '{name}' over {}s", self.crossfade);
                action.fade_out(self.crossfade);
            }
        }

        let key = *self
            .actions
            .entry(name.to_string())
            .or_insert_with(|| mixer.clip_action(scene, clip));

        if let Some(action) = mixer.action_mut(key) {
            action.reset();
            action.fade_in(self.crossfade);
        }

        self.selected = Some(name.to_string());
        self.state = PlaybackState::Playing(name.to_string());
        Ok(())
    }

    /// Resumes a paused clip, or starts the selected (else first) clip.
    ///
    /// A no-op while playing or when there is nothing to play.
    pub fn play(&mut self, scene: &Scene) -> Result<()> {
        match self.state.clone() {
            PlaybackState::Playing(_) => Ok(()),
            PlaybackState::Paused(name) => {
                self.set_paused(false);
                self.state = PlaybackState::Playing(name);
                Ok(())
            }
            PlaybackState::Idle => {
                let name = self
                    .selected
                    .clone()
                    .filter(|n| self.library.contains(n))
                    .or_else(|| self.library.first_name().map(str::to_string));
                match name {
                    Some(name) => self.select_clip(scene, &name),
                    None => Ok(()),
                }
            }
        }
    }

    /// Halts the playhead without rewinding.
    pub fn pause(&mut self) {
        if let PlaybackState::Playing(name) = &self.state {
            let name = name.clone();
            self.set_paused(true);
            self.state = PlaybackState::Paused(name);
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if let Some(mixer) = self.mixer.as_mut() {
            for key in self.actions.values() {
                if let Some(action) = mixer.action_mut(*key) {
                    action.paused = paused;
                }
            }
        }
    }

    /// Disposes every action and returns to `Idle`. Registered clips stay.
    pub fn unload(&mut self) {
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.clear();
        }
        self.actions.clear();
        self.state = PlaybackState::Idle;
    }

    /// Forgets the target and every clip.
    pub fn reset(&mut self) {
        self.unload();
        self.mixer = None;
        self.library.clear();
        self.selected = None;
        self.elapsed = 0.0;
    }

    /// Advances the clock, fades and playheads, and poses the target.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        self.elapsed += dt;
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.update(dt, scene);
        }
    }
}
