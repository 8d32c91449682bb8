use std::{collections::HashSet, fmt::Debug, rc::Rc, sync::Arc};

use futures::{future::try_join_all, try_join};
use glam::{Quat, Vec3};
use log::debug;

use crate::{
    accessor::AccessorView,
    animation::{
        AnimationAsset, AnimationChannelAsset, AnimationKeyFrame, AnimationKeyFrames,
        AnimationPath, AnimationSampler, AnimationTarget, Interpolation,
    },
    index::{DependencyKey, EntityKind},
};

use super::{
    accessor::normalized_component_scale,
    schema::{AnimationDef, ChannelDef},
    session::missing,
    GltfDocumentLoader, GltfLoadResult, GltfLoaderError,
};

/// Output values as floats, rescaled when the accessor stores normalized integers.
fn output_values(view: &AccessorView) -> GltfLoadResult<Vec<f32>> {
    let mut values = view.read_f32();
    if view.normalized {
        let scale = normalized_component_scale(view.component_type)?;
        values.iter_mut().for_each(|value| *value *= scale);
    }
    Ok(values)
}

/// Pair keyframe times with output items. Cubic-spline outputs hold an
/// (in-tangent, value, out-tangent) triple per keyframe.
fn key_frames<T: Debug + Clone>(
    times: &[f32],
    items: Vec<T>,
    interpolation: Interpolation,
) -> AnimationKeyFrames<T> {
    match interpolation {
        Interpolation::Linear => AnimationKeyFrames::Linear(zip_frames(times, items)),
        Interpolation::Step => AnimationKeyFrames::Step(zip_frames(times, items)),
        Interpolation::CubicSpline => {
            let mut items = items.into_iter();
            let frames = times
                .iter()
                .map_while(|time| {
                    let in_tangent = items.next()?;
                    let value = items.next()?;
                    let out_tangent = items.next()?;
                    Some(AnimationKeyFrame {
                        time: *time,
                        value: (in_tangent, value, out_tangent),
                    })
                })
                .collect();
            AnimationKeyFrames::CubicSpline(frames)
        }
    }
}

fn zip_frames<T: Debug + Clone>(times: &[f32], items: Vec<T>) -> Vec<AnimationKeyFrame<T>> {
    times
        .iter()
        .zip(items)
        .map(|(time, value)| AnimationKeyFrame { time: *time, value })
        .collect()
}

fn build_sampler(
    path: AnimationPath,
    interpolation: Interpolation,
    times: &[f32],
    values: &[f32],
) -> AnimationSampler {
    match path {
        AnimationPath::Translation | AnimationPath::Scale => {
            let items = values.chunks_exact(3).map(Vec3::from_slice).collect();
            let frames = key_frames(times, items, interpolation);
            if path == AnimationPath::Translation {
                AnimationSampler::Translation(frames)
            } else {
                AnimationSampler::Scale(frames)
            }
        }
        AnimationPath::Rotation => {
            let items = values.chunks_exact(4).map(Quat::from_slice).collect();
            AnimationSampler::Rotation(key_frames(times, items, interpolation))
        }
        AnimationPath::Weights => {
            let elements = match interpolation {
                Interpolation::CubicSpline => times.len() * 3,
                _ => times.len(),
            };
            let stride = if elements > 0 { values.len() / elements } else { 0 };
            let items = if stride > 0 {
                values.chunks_exact(stride).map(<[f32]>::to_vec).collect()
            } else {
                Vec::new()
            };
            AnimationSampler::Weights(key_frames(times, items, interpolation))
        }
    }
}

impl GltfDocumentLoader {
    pub(crate) async fn load_animation(
        self: Rc<Self>,
        index: usize,
    ) -> GltfLoadResult<Arc<AnimationAsset>> {
        let def = self
            .json
            .animations
            .get(index)
            .ok_or_else(|| missing(EntityKind::Animation, index))?;
        let channels: Vec<AnimationChannelAsset> = try_join_all(
            def.channels
                .iter()
                .map(|channel| self.animation_channel(index, def, channel)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();
        let duration = channels
            .iter()
            .map(|channel| channel.length)
            .fold(0.0, f32::max);
        Ok(Arc::new(AnimationAsset {
            id: DependencyKey::new(EntityKind::Animation, index),
            name: def
                .name
                .clone()
                .unwrap_or_else(|| format!("animation_{}", index)),
            channels,
            duration,
        }))
    }

    /// Tracks of one channel: one for node transforms, one per morphed
    /// primitive below the node for weights.
    async fn animation_channel(
        self: &Rc<Self>,
        animation: usize,
        def: &AnimationDef,
        channel: &ChannelDef,
    ) -> GltfLoadResult<Vec<AnimationChannelAsset>> {
        let Some(node) = channel
            .target
            .node
            .filter(|node| *node < self.json.nodes.len())
        else {
            debug!("Skipping channel of animation #{} without target node", animation);
            return Ok(Vec::new());
        };
        let sampler = def
            .samplers
            .get(channel.sampler)
            .ok_or(GltfLoaderError::MissingAnimationSampler {
                animation,
                sampler: channel.sampler,
            })?;
        let path = AnimationPath::from_name(&channel.target.path)
            .ok_or_else(|| GltfLoaderError::UnsupportedAnimationPath(channel.target.path.clone()))?;
        let interpolation_name = sampler.interpolation.as_deref().unwrap_or("LINEAR");
        let interpolation = Interpolation::from_name(interpolation_name)
            .ok_or_else(|| GltfLoaderError::UnsupportedInterpolation(interpolation_name.to_string()))?;

        let (input, output, content) = try_join!(
            self.accessor(sampler.input),
            self.accessor(sampler.output),
            self.node(node),
        )?;
        let times = input.map(|input| input.read_f32()).unwrap_or_default();
        let values = match output {
            Some(output) => output_values(&output)?,
            None => Vec::new(),
        };
        let sampler = build_sampler(path, interpolation, &times, &values);
        let length = sampler.length();

        if path != AnimationPath::Weights {
            let target = AnimationTarget {
                node: content.id,
                name: content
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("node_{}", node)),
                primitive: None,
            };
            return Ok(vec![AnimationChannelAsset {
                name: format!("{}.{}", target, path.property()),
                target,
                sampler,
                length,
            }]);
        }

        let mut tracks = Vec::new();
        for morphed in self.morphed_nodes(node)? {
            let content = self.node(morphed).await?;
            let Some(mesh) = &content.mesh else {
                continue;
            };
            for (primitive, asset) in mesh.primitives.iter().enumerate() {
                if !asset.has_morph_targets() {
                    continue;
                }
                let target = AnimationTarget {
                    node: content.id,
                    name: asset.name.clone(),
                    primitive: Some(primitive),
                };
                tracks.push(AnimationChannelAsset {
                    name: format!("{}.{}", target, path.property()),
                    target,
                    sampler: sampler.clone(),
                    length,
                });
            }
        }
        Ok(tracks)
    }

    /// Nodes in the subtree of `root` carrying a mesh, in depth-first order.
    fn morphed_nodes(&self, root: usize) -> GltfLoadResult<Vec<usize>> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![root];
        while let Some(index) = pending.pop() {
            if !visited.insert(index) {
                continue;
            }
            let def = self
                .json
                .nodes
                .get(index)
                .ok_or_else(|| missing(EntityKind::Node, index))?;
            if def.mesh.is_some() {
                found.push(index);
            }
            pending.extend(def.children.iter().rev());
        }
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;
    use crate::accessor::{ComponentType, Dimensions};

    #[test]
    fn test_cubic_spline_layout() {
        let values = [
            0.0, 0.0, 0.0, // in
            1.0, 2.0, 3.0, // value
            0.5, 0.5, 0.5, // out
            0.0, 0.0, 0.0, //
            4.0, 5.0, 6.0, //
            0.0, 0.0, 0.0, //
        ];
        let sampler = build_sampler(
            AnimationPath::Translation,
            Interpolation::CubicSpline,
            &[0.0, 1.0],
            &values,
        );
        let AnimationSampler::Translation(AnimationKeyFrames::CubicSpline(frames)) = &sampler else {
            panic!("unexpected sampler {:?}", sampler);
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].value.1, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(frames[0].value.2, Vec3::splat(0.5));
        assert_eq!(frames[1].value.1, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(sampler.length(), 1.0);
    }

    #[test]
    fn test_weights_per_keyframe() {
        let sampler = build_sampler(
            AnimationPath::Weights,
            Interpolation::Step,
            &[0.0, 1.0],
            &[0.0, 1.0, 1.0, 0.0],
        );
        let AnimationSampler::Weights(frames) = sampler else {
            panic!("expected weights");
        };
        assert_eq!(frames.sample(0.5), Some(vec![0.0, 1.0]));
        assert_eq!(frames.sample(1.5), Some(vec![1.0, 0.0]));
    }

    #[test]
    fn test_normalized_output() {
        let view = AccessorView::packed(
            ComponentType::I8,
            Dimensions::Scalar,
            true,
            Bytes::from_static(&[127, 0x81]),
        );
        let values = output_values(&view).unwrap();
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!((values[1] + 1.0).abs() < 1e-6);

        let view = AccessorView::packed(
            ComponentType::U32,
            Dimensions::Scalar,
            true,
            Bytes::from_static(&[0, 0, 0, 0]),
        );
        assert!(matches!(
            output_values(&view),
            Err(GltfLoaderError::UnsupportedNormalizedComponent(ComponentType::U32))
        ));
    }
}
