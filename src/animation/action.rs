use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::animation::{
    binding::PropertyBinding,
    clip::{AnimationClip, TrackData},
    tracks::KeyframeCursor,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

/// Linear weight ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn value(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub loop_mode: LoopMode,
    pub paused: bool,
    pub enabled: bool,

    pub bindings: Vec<PropertyBinding>,

    pub(crate) track_cursors: Vec<KeyframeCursor>,

    fade: Option<Fade>,
    /// +1 on a forward leg, -1 on the way back. Only ping-pong reads it.
    direction: f32,
}

impl AnimationAction {
    #[must_use]
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        let track_count = clip.tracks.len();
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::Loop,
            paused: false,
            enabled: true,
            bindings: Vec::new(),
            track_cursors: vec![KeyframeCursor::default(); track_count],
            fade: None,
            direction: 1.0,
        }
    }

    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    /// Rewinds to the start and re-enables the action at full weight.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.paused = false;
        self.enabled = true;
        self.weight = 1.0;
        self.fade = None;
        self.direction = 1.0;
        for cursor in &mut self.track_cursors {
            *cursor = KeyframeCursor::default();
        }
    }

    /// Ramps the weight from 0 to 1 over `duration` seconds.
    pub fn fade_in(&mut self, duration: f32) {
        self.enabled = true;
        self.weight = 0.0;
        self.fade = Some(Fade {
            from: 0.0,
            to: 1.0,
            elapsed: 0.0,
            duration,
        });
        if duration <= 0.0 {
            self.finish_fade();
        }
    }

    /// Ramps the current weight down to 0; the action disables itself at the end.
    pub fn fade_out(&mut self, duration: f32) {
        self.fade = Some(Fade {
            from: self.weight,
            to: 0.0,
            elapsed: 0.0,
            duration,
        });
        if duration <= 0.0 {
            self.finish_fade();
        }
    }

    #[inline]
    #[must_use]
    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Weight actually used for blending.
    #[inline]
    #[must_use]
    pub fn effective_weight(&self) -> f32 {
        if self.enabled { self.weight } else { 0.0 }
    }

    fn finish_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            self.weight = fade.to;
            if fade.to <= 0.0 {
                self.enabled = false;
            }
        }
    }

    /// Advances the fade and, unless paused, the playhead.
    ///
    /// Fades progress while paused so a paused clip can still be crossfaded out.
    pub fn update(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }

        if let Some(fade) = &mut self.fade {
            fade.elapsed += dt;
            self.weight = fade.value();
            if fade.finished() {
                self.finish_fade();
            }
        }

        if self.paused {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }

        let step = dt * self.time_scale;

        match self.loop_mode {
            LoopMode::Once => {
                self.time += step;
                if self.time >= duration {
                    self.time = duration;
                    self.paused = true;
                } else if self.time < 0.0 {
                    self.time = 0.0;
                    self.paused = true;
                }
            }
            LoopMode::Loop => {
                self.time = (self.time + step).rem_euclid(duration);
            }
            LoopMode::PingPong => self.advance_ping_pong(step, duration),
        }
    }

    /// Moves the playhead `step` seconds along its current leg, reflecting at both ends.
    fn advance_ping_pong(&mut self, step: f32, duration: f32) {
        let period = duration * 2.0;
        // Phase 0..duration is the forward leg, duration..period the return
        let phase = if self.direction > 0.0 { self.time } else { period - self.time };
        let phase = (phase + step).rem_euclid(period);
        if phase > duration {
            self.time = period - phase;
            self.direction = -1.0;
        } else {
            self.time = phase;
            self.direction = 1.0;
        }
    }

    /// Gets the value of the specified track at the current time.
    pub fn sample_track(&mut self, track_index: usize) -> Option<TrackValue> {
        let track = self.clip.tracks.get(track_index)?;
        let cursor = self.track_cursors.get_mut(track_index)?;

        match &track.data {
            TrackData::Vector3(t) => t.sample_with_cursor(self.time, cursor).map(TrackValue::Vector3),
            TrackData::Quaternion(t) => t.sample_with_cursor(self.time, cursor).map(TrackValue::Quaternion),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackValue {
    Vector3(Vec3),
    Quaternion(Quat),
}
