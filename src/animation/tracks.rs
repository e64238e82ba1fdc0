use crate::animation::values::Interpolatable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    Step,
    CubicSpline,
}

/// How far the cursor scans linearly before falling back to binary search.
const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the last keyframe interval hit by a track so that sequential
/// playback resolves in O(1).
#[derive(Debug, Clone, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

/// A time-sampled curve.
///
/// For [`InterpolationMode::CubicSpline`] every keyframe stores three values
/// (in-tangent, value, out-tangent), so `values.len() == times.len() * 3`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: InterpolationMode,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the last keyframe, `0.0` for an empty track.
    #[inline]
    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Number of values `times` calls for under this interpolation.
    #[inline]
    #[must_use]
    pub fn expected_value_count(&self) -> usize {
        match self.interpolation {
            InterpolationMode::CubicSpline => self.times.len() * 3,
            _ => self.times.len(),
        }
    }

    /// Value of keyframe `index`, skipping the tangents of cubic tracks.
    #[must_use]
    pub fn keyframe_value(&self, index: usize) -> Option<T> {
        let slot = match self.interpolation {
            InterpolationMode::CubicSpline => index * 3 + 1,
            _ => index,
        };
        self.values.get(slot).copied()
    }

    /// Returns a copy of the track with `f` applied to every stored value
    /// (tangents included).
    #[must_use]
    pub fn map_values(&self, f: impl Fn(T) -> T) -> Self {
        Self {
            times: self.times.clone(),
            values: self.values.iter().copied().map(f).collect(),
            interpolation: self.interpolation,
        }
    }

    /// Stateless sampling. Returns `None` for an empty track.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.times.is_empty() {
            return None;
        }
        let next_idx = self.times.partition_point(|&t| t <= time);
        Some(self.sample_at_frame(next_idx.saturating_sub(1), time))
    }

    /// Sampling with a cursor; `cursor` is updated to the resolved interval.
    ///
    /// Returns `None` for an empty track.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> Option<T> {
        let len = self.times.len();
        if len == 0 {
            return None;
        }
        if len == 1 {
            return self.keyframe_value(0);
        }

        let index = self
            .scan_from(cursor.last_index.min(len - 1), time)
            .unwrap_or_else(|| self.times.partition_point(|&t| t <= time).saturating_sub(1));

        cursor.last_index = index;
        Some(self.sample_at_frame(index, time))
    }

    /// Local search around `start`, forward when time moved on, backward
    /// otherwise. `None` means the jump was too large.
    fn scan_from(&self, start: usize, time: f32) -> Option<usize> {
        let len = self.times.len();

        if time >= self.times[start] {
            for idx in start..=(start + MAX_SCAN_OFFSET) {
                if idx >= len - 1 {
                    return (time >= self.times[len - 1]).then_some(len - 1);
                }
                if time < self.times[idx + 1] {
                    return Some(idx);
                }
            }
            None
        } else {
            (0..=MAX_SCAN_OFFSET)
                .take_while(|&offset| offset <= start)
                .map(|offset| start - offset)
                .find(|&idx| time >= self.times[idx])
        }
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> T {
        let len = self.times.len();
        let value_at = |i: usize| match self.interpolation {
            InterpolationMode::CubicSpline => self.values[i * 3 + 1],
            _ => self.values[i],
        };

        if index >= len - 1 {
            return value_at(len - 1);
        }

        let next_idx = index + 1;
        let t0 = self.times[index];
        let t1 = self.times[next_idx];
        let dt = t1 - t0;

        let t = if dt > 1e-6 { (time - t0) / dt } else { 0.0 };
        let t = t.clamp(0.0, 1.0);

        match self.interpolation {
            InterpolationMode::Step => value_at(index),
            InterpolationMode::Linear => T::interpolate_linear(value_at(index), value_at(next_idx), t),
            InterpolationMode::CubicSpline => {
                let i_prev = index * 3;
                let i_next = next_idx * 3;

                let v0 = self.values[i_prev + 1];
                let out_tangent0 = self.values[i_prev + 2];
                let in_tangent1 = self.values[i_next];
                let v1 = self.values[i_next + 1];

                T::interpolate_cubic(v0, out_tangent0, in_tangent1, v1, t, dt)
            }
        }
    }
}
