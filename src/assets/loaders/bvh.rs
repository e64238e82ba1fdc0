//! Biovision Hierarchy (`.bvh`) motion-capture decoder.
//!
//! Joints become bone nodes at their `OFFSET`, `End Site`s become leaf bones
//! named `{parent}_End`. Every joint gets a translation track (offset plus
//! any position channels) and a rotation track composed from its rotation
//! channels in file order. Angles are in degrees.

use glam::{Quat, Vec3};

use crate::animation::binding::TargetPath;
use crate::animation::clip::{AnimationClip, Track, TrackData, TrackMeta};
use crate::animation::tracks::{InterpolationMode, KeyframeTrack};
use crate::assets::kind::AssetKind;
use crate::assets::prefab::{Prefab, PrefabNode};
use crate::errors::{Result, RigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    XPosition,
    YPosition,
    ZPosition,
    XRotation,
    YRotation,
    ZRotation,
}

impl Channel {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "xposition" => Some(Channel::XPosition),
            "yposition" => Some(Channel::YPosition),
            "zposition" => Some(Channel::ZPosition),
            "xrotation" => Some(Channel::XRotation),
            "yrotation" => Some(Channel::YRotation),
            "zrotation" => Some(Channel::ZRotation),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Joint {
    name: String,
    offset: Vec3,
    channels: Vec<Channel>,
}

fn err(reason: impl Into<String>) -> RigError {
    RigError::decode(AssetKind::HierarchyMotion, reason)
}

/// Whitespace tokenizer over the whole file.
struct Tokens<'a> {
    iter: std::iter::Peekable<std::str::SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            iter: text.split_whitespace().peekable(),
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        self.iter.next().ok_or_else(|| err("unexpected end of file"))
    }

    /// Tokens left, without consuming them.
    fn remaining(&self) -> usize {
        self.iter.clone().count()
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.iter.peek().copied()
    }

    fn expect(&mut self, expected: &str) -> Result<()> {
        let token = self.next()?;
        if token.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(err(format!("expected '{expected}', found '{token}'")))
        }
    }

    fn float(&mut self) -> Result<f32> {
        let token = self.next()?;
        token
            .parse::<f32>()
            .map_err(|_| err(format!("expected a number, found '{token}'")))
    }

    fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.float()?, self.float()?, self.float()?))
    }
}

pub struct BvhLoader;

impl BvhLoader {
    /// Parses a BVH document into a bone-only prefab with exactly one clip.
    pub fn parse(text: &str, clip_name: &str) -> Result<Prefab> {
        if !text.trim_start().starts_with("HIERARCHY") {
            return Err(err("missing HIERARCHY header"));
        }

        let mut tokens = Tokens::new(text);
        tokens.expect("HIERARCHY")?;

        let mut prefab = Prefab::new();
        let mut joints = Vec::new();

        tokens.expect("ROOT")?;
        let root = Self::read_joint(&mut tokens, &mut prefab, &mut joints)?;
        prefab.root_indices.push(root);

        if let Some(extra) = tokens.peek().filter(|t| t.eq_ignore_ascii_case("ROOT")) {
            return Err(err(format!("multiple '{extra}' hierarchies are not supported")));
        }

        tokens.expect("MOTION")?;
        tokens.expect("Frames:")?;
        let frame_count = tokens
            .next()?
            .parse::<usize>()
            .map_err(|_| err("invalid frame count"))?;
        tokens.expect("Frame")?;
        tokens.expect("Time:")?;
        let frame_time = tokens.float()?;
        if frame_time <= 0.0 {
            return Err(err(format!("invalid frame time {frame_time}")));
        }

        // The header count sizes every track, so it must match the values present
        let channel_total: usize = joints.iter().map(|j| j.channels.len()).sum();
        if channel_total == 0 && frame_count > 0 {
            return Err(err("motion data without any channels"));
        }
        let remaining = tokens.remaining();
        match frame_count.checked_mul(channel_total) {
            Some(needed) if needed <= remaining => {}
            _ => {
                return Err(err(format!(
                    "{frame_count} frames of {channel_total} channels declared, {remaining} values present"
                )));
            }
        }

        let clip = Self::read_motion(&mut tokens, &joints, frame_count, frame_time, clip_name)?;
        prefab.animations.push(clip);

        log::debug!(
            "BVH decoded: {} joints, {} frames at {}s",
            joints.len(),
            frame_count,
            frame_time
        );

        Ok(prefab)
    }

    /// Reads the joint whose name is next, plus its subtree. Returns its node index.
    fn read_joint(tokens: &mut Tokens<'_>, prefab: &mut Prefab, joints: &mut Vec<Joint>) -> Result<usize> {
        let name = tokens.next()?.to_string();
        tokens.expect("{")?;
        tokens.expect("OFFSET")?;
        let offset = tokens.vec3()?;

        let mut channels = Vec::new();
        if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("CHANNELS")) {
            tokens.next()?;
            let count = tokens
                .next()?
                .parse::<usize>()
                .map_err(|_| err(format!("invalid channel count for '{name}'")))?;
            for _ in 0..count {
                let token = tokens.next()?;
                channels.push(Channel::parse(token).ok_or_else(|| err(format!("unknown channel '{token}'")))?);
            }
        }

        let mut node = PrefabNode::named(&name);
        node.transform.position = offset;
        node.is_bone = true;
        let index = prefab.add_node(node);

        joints.push(Joint {
            name: name.clone(),
            offset,
            channels,
        });

        loop {
            match tokens.next()? {
                "}" => break,
                t if t.eq_ignore_ascii_case("JOINT") => {
                    let child = Self::read_joint(tokens, prefab, joints)?;
                    prefab.nodes[index].children_indices.push(child);
                }
                t if t.eq_ignore_ascii_case("End") => {
                    tokens.expect("Site")?;
                    tokens.expect("{")?;
                    tokens.expect("OFFSET")?;
                    let end_offset = tokens.vec3()?;
                    tokens.expect("}")?;

                    let mut end = PrefabNode::named(format!("{name}_End"));
                    end.transform.position = end_offset;
                    end.is_bone = true;
                    let child = prefab.add_node(end);
                    prefab.nodes[index].children_indices.push(child);
                }
                other => return Err(err(format!("unexpected token '{other}' in joint '{name}'"))),
            }
        }

        Ok(index)
    }

    fn read_motion(
        tokens: &mut Tokens<'_>,
        joints: &[Joint],
        frame_count: usize,
        frame_time: f32,
        clip_name: &str,
    ) -> Result<AnimationClip> {
        let times: Vec<f32> = (0..frame_count).map(|i| i as f32 * frame_time).collect();

        let mut positions: Vec<Vec<Vec3>> = joints.iter().map(|_| Vec::with_capacity(frame_count)).collect();
        let mut rotations: Vec<Vec<Quat>> = joints.iter().map(|_| Vec::with_capacity(frame_count)).collect();

        for frame in 0..frame_count {
            for (j, joint) in joints.iter().enumerate() {
                let mut position = Vec3::ZERO;
                let mut rotation = Quat::IDENTITY;

                for channel in &joint.channels {
                    let value = tokens
                        .float()
                        .map_err(|e| err(format!("frame {frame}, joint '{}': {e}", joint.name)))?;
                    match channel {
                        Channel::XPosition => position.x = value,
                        Channel::YPosition => position.y = value,
                        Channel::ZPosition => position.z = value,
                        Channel::XRotation => rotation *= Quat::from_rotation_x(value.to_radians()),
                        Channel::YRotation => rotation *= Quat::from_rotation_y(value.to_radians()),
                        Channel::ZRotation => rotation *= Quat::from_rotation_z(value.to_radians()),
                    }
                }

                positions[j].push(joint.offset + position);
                rotations[j].push(rotation);
            }
        }

        let mut tracks = Vec::with_capacity(joints.len() * 2);
        for (j, joint) in joints.iter().enumerate() {
            tracks.push(Track {
                meta: TrackMeta {
                    node_name: joint.name.clone(),
                    target: TargetPath::Translation,
                },
                data: TrackData::Vector3(KeyframeTrack::new(
                    times.clone(),
                    std::mem::take(&mut positions[j]),
                    InterpolationMode::Linear,
                )),
            });
            tracks.push(Track {
                meta: TrackMeta {
                    node_name: joint.name.clone(),
                    target: TargetPath::Rotation,
                },
                data: TrackData::Quaternion(KeyframeTrack::new(
                    times.clone(),
                    std::mem::take(&mut rotations[j]),
                    InterpolationMode::Linear,
                )),
            });
        }

        let duration = times.last().copied().unwrap_or(0.0);
        Ok(AnimationClip::with_duration(clip_name, duration, tracks))
    }
}
