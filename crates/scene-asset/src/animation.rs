use std::fmt::{self, Debug, Display, Formatter};

use glam::{Quat, Vec3, Vec4};

use crate::index::DependencyKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LINEAR" => Some(Interpolation::Linear),
            "STEP" => Some(Interpolation::Step),
            "CUBICSPLINE" => Some(Interpolation::CubicSpline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationKeyFrame<T: Debug + Clone> {
    pub time: f32,
    pub value: T,
}

#[derive(Debug, Clone)]
pub enum AnimationKeyFrames<T: Debug + Clone> {
    Linear(Vec<AnimationKeyFrame<T>>),
    Step(Vec<AnimationKeyFrame<T>>),
    // in, val, out
    CubicSpline(Vec<AnimationKeyFrame<(T, T, T)>>),
}

/// Index `k` of the keyframe segment `[t_k, t_k+1)` holding `time`.
///
/// `None` when `time` lies before the first or at/after the last keyframe.
fn find_segment(times: impl Iterator<Item = f32>, time: f32) -> Option<usize> {
    let mut previous = None;
    for (index, key_time) in times.enumerate() {
        if time < key_time {
            return previous;
        }
        previous = Some(index);
    }
    None
}

impl<T: Debug + Clone + Interpolate> AnimationKeyFrames<T> {
    pub fn len(&self) -> usize {
        match self {
            AnimationKeyFrames::Linear(frames) | AnimationKeyFrames::Step(frames) => frames.len(),
            AnimationKeyFrames::CubicSpline(frames) => frames.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn interpolation(&self) -> Interpolation {
        match self {
            AnimationKeyFrames::Linear(_) => Interpolation::Linear,
            AnimationKeyFrames::Step(_) => Interpolation::Step,
            AnimationKeyFrames::CubicSpline(_) => Interpolation::CubicSpline,
        }
    }

    /// Time of the last keyframe.
    pub fn length(&self) -> f32 {
        let last = match self {
            AnimationKeyFrames::Linear(frames) | AnimationKeyFrames::Step(frames) => {
                frames.last().map(|frame| frame.time)
            }
            AnimationKeyFrames::CubicSpline(frames) => frames.last().map(|frame| frame.time),
        };
        last.unwrap_or(0.0)
    }

    /// Value at `time`. Outside the keyframe range the boundary value is returned.
    pub fn sample(&self, time: f32) -> Option<T> {
        match self {
            AnimationKeyFrames::Linear(frames) | AnimationKeyFrames::Step(frames) => {
                let first = frames.first()?;
                let Some(k) = find_segment(frames.iter().map(|frame| frame.time), time) else {
                    return if time < first.time {
                        Some(first.value.clone())
                    } else {
                        frames.last().map(|frame| frame.value.clone())
                    };
                };
                let (from, to) = (&frames[k], &frames[k + 1]);
                if matches!(self, AnimationKeyFrames::Step(_)) {
                    return Some(from.value.clone());
                }
                let td = to.time - from.time;
                let p = if td > 0.0 { (time - from.time) / td } else { 0.0 };
                Some(T::linear(from.value.clone(), to.value.clone(), p))
            }
            AnimationKeyFrames::CubicSpline(frames) => {
                let first = frames.first()?;
                let Some(k) = find_segment(frames.iter().map(|frame| frame.time), time) else {
                    // Tangents are ignored at the open ends
                    return if time < first.time {
                        Some(first.value.1.clone())
                    } else {
                        frames.last().map(|frame| frame.value.1.clone())
                    };
                };
                let (from, to) = (&frames[k], &frames[k + 1]);
                let td = to.time - from.time;
                let p = if td > 0.0 { (time - from.time) / td } else { 0.0 };
                Some(T::cubic_spline(
                    from.value.1.clone(),
                    from.value.2.clone(),
                    to.value.1.clone(),
                    to.value.0.clone(),
                    p,
                    td,
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl AnimationPath {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "translation" => Some(AnimationPath::Translation),
            "rotation" => Some(AnimationPath::Rotation),
            "scale" => Some(AnimationPath::Scale),
            "weights" => Some(AnimationPath::Weights),
            _ => None,
        }
    }

    /// Name of the animated property on the target object.
    pub fn property(&self) -> &'static str {
        match self {
            AnimationPath::Translation => "position",
            AnimationPath::Rotation => "quaternion",
            AnimationPath::Scale => "scale",
            AnimationPath::Weights => "morphTargetInfluences",
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnimationSampler {
    Rotation(AnimationKeyFrames<Quat>),
    Translation(AnimationKeyFrames<Vec3>),
    Scale(AnimationKeyFrames<Vec3>),
    Weights(AnimationKeyFrames<Vec<f32>>),
}

impl AnimationSampler {
    pub fn path(&self) -> AnimationPath {
        match self {
            AnimationSampler::Rotation(_) => AnimationPath::Rotation,
            AnimationSampler::Translation(_) => AnimationPath::Translation,
            AnimationSampler::Scale(_) => AnimationPath::Scale,
            AnimationSampler::Weights(_) => AnimationPath::Weights,
        }
    }

    pub fn length(&self) -> f32 {
        match self {
            AnimationSampler::Rotation(frames) => frames.length(),
            AnimationSampler::Translation(frames) | AnimationSampler::Scale(frames) => {
                frames.length()
            }
            AnimationSampler::Weights(frames) => frames.length(),
        }
    }
}

/// Object animated by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationTarget {
    pub node: DependencyKey,
    /// Name used in the track path, the node or primitive name.
    pub name: String,
    /// Set for morph weight tracks, which animate one primitive.
    pub primitive: Option<usize>,
}

impl Display for AnimationTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct AnimationChannelAsset {
    /// Track path, `{target}.{property}`.
    pub name: String,
    pub target: AnimationTarget,
    pub sampler: AnimationSampler,
    pub length: f32,
}

#[derive(Debug, Clone)]
pub struct AnimationAsset {
    pub id: DependencyKey,
    pub name: String,
    pub channels: Vec<AnimationChannelAsset>,
    pub duration: f32,
}

/// Hermite basis weights for normalized segment position `p`.
///
/// Returns the weights of vertex k, out-tangent k, vertex k+1 and in-tangent k+1.
#[inline]
pub fn hermite_weights(p: f32) -> (f32, f32, f32, f32) {
    let pp = p * p;
    let ppp = pp * p;
    let s2 = -2.0 * ppp + 3.0 * pp;
    let s3 = ppp - pp;
    let s0 = 1.0 - s2;
    let s1 = s3 - pp + p;
    (s0, s1, s2, s3)
}

pub trait Interpolate {
    fn linear(a: Self, b: Self, t: f32) -> Self;
    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self;
}

macro_rules! impl_interpolate_linear_space {
    ($($ty:ty),*) => {
        $(
            impl Interpolate for $ty {
                fn linear(a: Self, b: Self, t: f32) -> Self {
                    a * (1.0 - t) + b * t
                }

                fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self {
                    let (s0, s1, s2, s3) = hermite_weights(t);
                    vk * s0 + bk * (s1 * td) + vk_1 * s2 + ak_1 * (s3 * td)
                }
            }
        )*
    };
}

impl_interpolate_linear_space!(f32, Vec3, Vec4);

impl Interpolate for Quat {
    fn linear(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self {
        let value = Vec4::cubic_spline(vk.into(), bk.into(), vk_1.into(), ak_1.into(), t, td);
        Quat::from_vec4(value).normalize()
    }
}

impl Interpolate for Vec<f32> {
    fn linear(a: Self, b: Self, t: f32) -> Self {
        a.into_iter()
            .zip(b)
            .map(|(a, b)| f32::linear(a, b, t))
            .collect()
    }

    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self {
        vk.into_iter()
            .zip(bk)
            .zip(vk_1)
            .zip(ak_1)
            .map(|(((vk, bk), vk_1), ak_1)| f32::cubic_spline(vk, bk, vk_1, ak_1, t, td))
            .collect()
    }
}
