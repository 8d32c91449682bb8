use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    sync::Arc,
};

use base64::Engine;
use bytes::Bytes;
use futures::{future::LocalBoxFuture, FutureExt};
use glam::Vec3;
use pollster::block_on;
use serde_json::{json, Value};

use super::{
    container::{test::pack, CHUNK_TYPE_BIN, CHUNK_TYPE_JSON},
    extension::{
        CompressedAttribute, DecoderError, ExtensionOptions, ExtensionRegistry, MeshDecoder,
        TextureDecoder,
    },
    schema::Root,
    GltfDocumentLoader, GltfLoader, GltfLoaderError,
};
use crate::{
    accessor::{AccessorView, ComponentType, Dimensions},
    animation::{AnimationPath, AnimationSampler},
    fetch::MemoryFetcher,
    index::{DependencyKey, EntityKind},
    loader::AssetLoadParams,
    node::NodeKind,
    primitive::{GeometryAsset, VertexAttribute},
    scene::GltfAsset,
    texture::{TextureAssetFormat, TextureImage},
};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// One triangle in the XY plane.
fn triangle() -> Vec<u8> {
    f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
}

fn position_accessor(buffer_view: usize) -> Value {
    json!({
        "bufferView": buffer_view,
        "componentType": 5126,
        "count": 3,
        "type": "VEC3",
        "min": [0.0, 0.0, 0.0],
        "max": [1.0, 1.0, 0.0],
    })
}

fn glb(document: &Value, binary: &[u8]) -> Bytes {
    let json = serde_json::to_vec(document).unwrap();
    Bytes::from(pack(2, &[(CHUNK_TYPE_JSON, &json), (CHUNK_TYPE_BIN, binary)]))
}

fn parse_glb(document: Value, binary: &[u8]) -> Result<GltfAsset, GltfLoaderError> {
    block_on(GltfLoader::new(MemoryFetcher::new()).parse(glb(&document, binary)))
}

fn session(document: Value, binary: Vec<u8>) -> Rc<GltfDocumentLoader> {
    session_with(
        document,
        binary,
        ExtensionOptions::default(),
        AssetLoadParams::default(),
    )
}

fn session_with(
    document: Value,
    binary: Vec<u8>,
    options: ExtensionOptions,
    params: AssetLoadParams,
) -> Rc<GltfDocumentLoader> {
    let root: Root = serde_json::from_value(document).unwrap();
    let registry = ExtensionRegistry::build(&root, &options, &params).unwrap();
    GltfDocumentLoader::new(
        root,
        Some(Bytes::from(binary)),
        params,
        Rc::new(MemoryFetcher::new()),
        registry,
    )
}

#[test]
fn test_empty_container() {
    let data = pack(2, &[(CHUNK_TYPE_JSON, br#"{"asset":{"version":"2.0"}}"#)]);
    let asset = block_on(GltfLoader::new(MemoryFetcher::new()).parse(data)).unwrap();
    assert!(asset.scene.is_none());
    assert!(asset.scenes.is_empty());
    assert!(asset.animations.is_empty());
    assert_eq!(asset.asset.version, "2.0");
}

#[test]
fn test_version_checks() {
    let loader = GltfLoader::new(MemoryFetcher::new());
    assert!(matches!(
        block_on(loader.parse(Bytes::from_static(br#"{"asset":{"version":"1.0"}}"#))),
        Err(GltfLoaderError::UnsupportedVersion(_))
    ));
    assert!(matches!(
        block_on(loader.parse(Bytes::from_static(b"{}"))),
        Err(GltfLoaderError::MissingAsset)
    ));
    let data = pack(1, &[(CHUNK_TYPE_JSON, br#"{"asset":{"version":"2.0"}}"#)]);
    assert!(matches!(
        block_on(loader.parse(data)),
        Err(GltfLoaderError::Container(_))
    ));
}

#[test]
fn test_shared_accessor_loads_once() {
    let session = session(
        json!({
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [0, 1]}],
            "nodes": [{"mesh": 0}, {"mesh": 1}],
            "meshes": [
                {"primitives": [{"attributes": {"POSITION": 0}}]},
                {"primitives": [{"attributes": {"POSITION": 0}, "mode": 0}]},
            ],
            "accessors": [position_accessor(0)],
            "bufferViews": [{"buffer": 0, "byteLength": 36}],
            "buffers": [{"byteLength": 36}],
        }),
        triangle(),
    );
    let asset = block_on(session.clone().load()).unwrap();
    assert_eq!(asset.scenes.len(), 1);
    assert_eq!(session.load_count(DependencyKey::new(EntityKind::Accessor, 0)), 1);
    assert_eq!(session.load_count(DependencyKey::new(EntityKind::BufferView, 0)), 1);
    assert_eq!(session.load_count(DependencyKey::new(EntityKind::Buffer, 0)), 1);

    let scene = asset.scene.unwrap();
    let first = scene.nodes[0].content.mesh.as_ref().unwrap();
    let second = scene.nodes[1].content.mesh.as_ref().unwrap();
    assert!(Arc::ptr_eq(
        &first.primitives[0].geometry.attributes[&VertexAttribute::Position],
        &second.primitives[0].geometry.attributes[&VertexAttribute::Position],
    ));
    // Both primitives lack a material and share the default one.
    assert!(first.primitives[0].material.id.is_none());
    assert!(second.primitives[0].material.id.is_none());
}

#[test]
fn test_mesh_instances_are_independent() {
    let asset = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [0, 1, 2]}],
            "nodes": [{"mesh": 0}, {"mesh": 0}, {"mesh": 0, "name": "third copy"}],
            "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}, "material": 0}]}],
            "materials": [{"pbrMetallicRoughness": {"baseColorFactor": [1.0, 0.0, 0.0, 1.0]}}],
            "accessors": [position_accessor(0)],
            "bufferViews": [{"buffer": 0, "byteLength": 36}],
            "buffers": [{"byteLength": 36}],
        }),
        &triangle(),
    )
    .unwrap();

    let scene = asset.scene.unwrap();
    let meshes: Vec<_> = scene
        .nodes
        .iter()
        .map(|node| node.content.mesh.clone().unwrap())
        .collect();
    assert_eq!(meshes[0].name, "tri");
    assert_eq!(meshes[1].name, "tri_instance_1");
    assert_eq!(meshes[2].name, "tri_instance_2");
    assert_eq!(scene.nodes[2].name(), Some("third_copy"));
    assert_eq!(scene.nodes[0].content.kind, NodeKind::Mesh);

    for (a, b) in [(0, 1), (1, 2), (0, 2)] {
        let (a, b) = (&meshes[a].primitives[0], &meshes[b].primitives[0]);
        assert!(!Arc::ptr_eq(&a.material, &b.material));
        assert!(!Arc::ptr_eq(&a.geometry, &b.geometry));
        assert_eq!(a.material.data.base_color_factor(), [1.0, 0.0, 0.0, 1.0]);
    }
}

#[test]
fn test_normalized_u16_positions() {
    let data: Vec<u8> = [65535u16, 0, 0, 0, 65535, 0, 0, 0, 65535, 0]
        .iter()
        .flat_map(|value| value.to_le_bytes())
        .collect();
    let asset = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["KHR_mesh_quantization"],
            "extensionsRequired": ["KHR_mesh_quantization"],
            "scenes": [{"nodes": [0]}],
            "nodes": [{"mesh": 0}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "accessors": [{
                "bufferView": 0,
                "componentType": 5123,
                "normalized": true,
                "count": 3,
                "type": "VEC3",
                "min": [0, 0, 0],
                "max": [65535, 65535, 65535],
            }],
            "bufferViews": [{"buffer": 0, "byteLength": 18}],
            "buffers": [{"byteLength": 20}],
        }),
        &data,
    )
    .unwrap();

    let scene = asset.scene.unwrap();
    let geometry = &scene.nodes[0].content.mesh.as_ref().unwrap().primitives[0].geometry;
    let position = &geometry.attributes[&VertexAttribute::Position];
    assert_eq!(position.component_type, ComponentType::U16);
    assert!(position.normalized);
    assert_eq!(position.count, 3);
    assert_eq!(
        position.read_vec3(),
        vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
    );
    let bounds = geometry.bounding_box.unwrap();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert!(bounds.max.abs_diff_eq(Vec3::ONE, 1e-6));
}

#[test]
fn test_sparse_accessor_does_not_alias_base() {
    let mut binary = triangle();
    binary.extend_from_slice(&[1, 0, 0, 0]);
    binary.extend_from_slice(&f32_bytes(&[5.0, 5.0, 5.0]));
    let session = session(
        json!({
            "asset": {"version": "2.0"},
            "accessors": [
                position_accessor(0),
                {
                    "bufferView": 0,
                    "componentType": 5126,
                    "count": 3,
                    "type": "VEC3",
                    "sparse": {
                        "count": 1,
                        "indices": {"bufferView": 1, "componentType": 5121},
                        "values": {"bufferView": 2},
                    },
                },
            ],
            "bufferViews": [
                {"buffer": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 1},
                {"buffer": 0, "byteOffset": 40, "byteLength": 12},
            ],
            "buffers": [{"byteLength": 52}],
        }),
        binary,
    );
    let (base, patched) = block_on(async {
        futures::try_join!(session.accessor(0), session.accessor(1))
    })
    .unwrap();
    let (base, patched) = (base.unwrap(), patched.unwrap());
    assert_eq!(base.read_vec3()[1], [1.0, 0.0, 0.0]);
    assert_eq!(patched.read_vec3()[1], [5.0, 5.0, 5.0]);
    assert_eq!(patched.read_vec3()[2], [0.0, 1.0, 0.0]);
}

#[test]
fn test_unknown_extensions_in_side_channel() {
    let asset = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["EXT_vendor_data"],
            "extensions": {"EXT_vendor_data": {"revision": 3}},
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "marker", "extensions": {"EXT_vendor_data": {"tag": "spawn"}}}],
        }),
        &[],
    )
    .unwrap();
    let node = asset.unknown_extensions(DependencyKey::node(0)).unwrap();
    assert_eq!(node["EXT_vendor_data"], json!({"tag": "spawn"}));
    let root = asset.unknown_extensions(crate::index::ObjectId::Document).unwrap();
    assert_eq!(root["EXT_vendor_data"]["revision"], 3);
    assert_eq!(asset.scene.unwrap().nodes[0].content.kind, NodeKind::Empty);
}

#[test]
fn test_required_extension_without_handler() {
    let result = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["EXT_meshopt_compression"],
            "extensionsRequired": ["EXT_meshopt_compression"],
        }),
        &[],
    );
    assert!(matches!(
        result,
        Err(GltfLoaderError::UnsupportedRequiredExtension(name)) if name == "EXT_meshopt_compression"
    ));
}

#[test]
fn test_data_uri_buffer() {
    let encoded = base64::engine::general_purpose::STANDARD.encode(triangle());
    let document = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
        "accessors": [position_accessor(0)],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "buffers": [{
            "byteLength": 36,
            "uri": format!("data:application/octet-stream;base64,{}", encoded),
        }],
    });
    let asset = block_on(
        GltfLoader::new(MemoryFetcher::new()).parse(serde_json::to_vec(&document).unwrap()),
    )
    .unwrap();
    let scene = asset.scene.unwrap();
    let geometry = &scene.nodes[0].content.mesh.as_ref().unwrap().primitives[0].geometry;
    assert_eq!(geometry.vertex_count(), 3);
}

#[test]
fn test_relative_resources_are_fetched() {
    let document = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
        "accessors": [position_accessor(0)],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "buffers": [{"byteLength": 36, "uri": "tri.bin"}],
    });
    let fetcher = MemoryFetcher::new()
        .with("models/scene.gltf", serde_json::to_vec(&document).unwrap())
        .with("models/tri.bin", triangle());
    let asset = block_on(GltfLoader::new(fetcher).load("models/scene.gltf")).unwrap();
    assert_eq!(asset.scenes.len(), 1);

    let missing = MemoryFetcher::new().with("scene.gltf", serde_json::to_vec(&document).unwrap());
    assert!(matches!(
        block_on(GltfLoader::new(missing).load("scene.gltf")),
        Err(GltfLoaderError::Fetch(_))
    ));
}

#[test]
fn test_node_cycle_is_fatal() {
    let result = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [0]}],
            "nodes": [{"children": [1]}, {"children": [0]}],
        }),
        &[],
    );
    assert!(matches!(result, Err(GltfLoaderError::NodeCycle(0))));
}

#[test]
fn test_morph_weights_animation() {
    let mut binary = triangle();
    binary.extend(f32_bytes(&[0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0]));
    binary.extend(f32_bytes(&[0.0, 1.0]));
    binary.extend(f32_bytes(&[0.0, 1.0]));
    let asset = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "root", "children": [1]}, {"mesh": 0}],
            "meshes": [{
                "name": "face",
                "weights": [0.25],
                "extras": {"targetNames": ["bulge"]},
                "primitives": [{
                    "attributes": {"POSITION": 0},
                    "targets": [{"POSITION": 1}],
                }],
            }],
            "accessors": [
                position_accessor(0),
                {
                    "bufferView": 1,
                    "componentType": 5126,
                    "count": 3,
                    "type": "VEC3",
                    "min": [0.0, 0.0, 2.0],
                    "max": [0.0, 0.0, 2.0],
                },
                {"bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR"},
                {"bufferView": 3, "componentType": 5126, "count": 2, "type": "SCALAR"},
            ],
            "bufferViews": [
                {"buffer": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 36},
                {"buffer": 0, "byteOffset": 72, "byteLength": 8},
                {"buffer": 0, "byteOffset": 80, "byteLength": 8},
            ],
            "buffers": [{"byteLength": 88}],
            "animations": [{
                "channels": [
                    {"sampler": 0, "target": {"node": 0, "path": "weights"}},
                    {"sampler": 0, "target": {"path": "weights"}},
                ],
                "samplers": [{"input": 2, "output": 3}],
            }],
        }),
        &binary,
    )
    .unwrap();

    let scene = asset.scene.unwrap();
    let primitive = &scene.nodes[0].children[0].content.mesh.as_ref().unwrap().primitives[0];
    assert_eq!(primitive.morph_target_influences, vec![0.25]);
    assert_eq!(primitive.morph_target_dictionary["bulge"], 0);
    assert!(primitive.geometry.morph_targets_relative);
    assert!(primitive.material.variant.morph_targets);
    let bounds = primitive.geometry.bounding_box.unwrap();
    assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -2.0));
    assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 2.0));

    let animation = &asset.animations[0];
    assert_eq!(animation.name, "animation_0");
    assert_eq!(animation.duration, 1.0);
    assert_eq!(animation.channels.len(), 1);
    let channel = &animation.channels[0];
    assert_eq!(channel.name, "face.morphTargetInfluences");
    assert_eq!(channel.target.node, DependencyKey::node(1));
    assert_eq!(channel.target.primitive, Some(0));
    assert_eq!(channel.sampler.path(), AnimationPath::Weights);
    let AnimationSampler::Weights(frames) = &channel.sampler else {
        panic!("expected weights track");
    };
    assert_eq!(frames.sample(0.5), Some(vec![0.5]));
}

#[test]
fn test_skinned_node_binds_skeleton() {
    let mut binary = triangle();
    // Weights summing to two, renormalized on load.
    binary.extend(f32_bytes(&[
        1.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ]));
    let asset = parse_glb(
        json!({
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [0, 1]}],
            "nodes": [
                {"mesh": 0, "skin": 0},
                {"name": "hip bone", "translation": [0.0, 1.0, 0.0]},
            ],
            "skins": [{"joints": [1, 9]}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "WEIGHTS_0": 1}}]}],
            "accessors": [
                position_accessor(0),
                {"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC4"},
            ],
            "bufferViews": [
                {"buffer": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 48},
            ],
            "buffers": [{"byteLength": 84}],
        }),
        &binary,
    )
    .unwrap();

    let scene = asset.scene.unwrap();
    assert_eq!(scene.nodes[1].content.kind, NodeKind::Joint);
    let mesh = scene.nodes[0].content.mesh.as_ref().unwrap();
    let skeleton = mesh.skeleton.as_ref().unwrap();
    assert_eq!(skeleton.bones.len(), 1);
    assert_eq!(skeleton.bones[0].name.as_deref(), Some("hip_bone"));
    assert_eq!(skeleton.bones[0].inverse_bind_matrix, glam::Mat4::IDENTITY);

    let primitive = &mesh.primitives[0];
    assert!(primitive.skinned);
    assert!(primitive.material.variant.skinning);
    assert_eq!(
        primitive.geometry.attributes[&VertexAttribute::SkinWeight].read_f32(),
        vec![0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
    );
}

#[test]
fn test_container_with_empty_default_scene() {
    let data = pack(
        2,
        &[(
            CHUNK_TYPE_JSON,
            br#"{"asset":{"version":"2.0"},"scenes":[{"nodes":[]}],"scene":0}"#,
        )],
    );
    let asset = block_on(GltfLoader::new(MemoryFetcher::new()).parse(data)).unwrap();
    let scene = asset.scene.unwrap();
    assert!(scene.nodes.is_empty());
    assert_eq!(asset.scenes.len(), 1);
}

#[test]
fn test_non_ascii_relative_uri() {
    let document = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
        "accessors": [position_accessor(0)],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "buffers": [{"byteLength": 36, "uri": "abcdé.bin"}],
    });
    let fetcher = MemoryFetcher::new().with("abcdé.bin", triangle());
    let asset = block_on(
        GltfLoader::new(fetcher).parse(serde_json::to_vec(&document).unwrap()),
    )
    .unwrap();
    let scene = asset.scene.unwrap();
    let geometry = &scene.nodes[0].content.mesh.as_ref().unwrap().primitives[0].geometry;
    assert_eq!(geometry.vertex_count(), 3);
}

#[test]
fn test_overflowing_ranges_are_rejected() {
    let mut binary = triangle();
    binary.extend(f32_bytes(&[5.0, 5.0, 5.0]));
    let huge = usize::MAX / 2;
    let session = session(
        json!({
            "asset": {"version": "2.0"},
            "accessors": [
                {"bufferView": 1, "componentType": 5126, "count": huge, "type": "VEC3"},
                {
                    "componentType": 5126,
                    "count": huge,
                    "type": "VEC3",
                    "sparse": {
                        "count": 1,
                        "indices": {"bufferView": 2, "componentType": 5121},
                        "values": {"bufferView": 3},
                    },
                },
                {
                    "bufferView": 1,
                    "componentType": 5126,
                    "count": 3,
                    "type": "VEC3",
                    "sparse": {
                        "count": 1,
                        "indices": {"bufferView": 2, "byteOffset": u64::MAX, "componentType": 5121},
                        "values": {"bufferView": 3},
                    },
                },
                {"bufferView": 4, "componentType": 5126, "count": huge, "type": "VEC3"},
            ],
            "bufferViews": [
                {"buffer": 0, "byteOffset": u64::MAX, "byteLength": 2},
                {"buffer": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 1},
                {"buffer": 0, "byteOffset": 36, "byteLength": 12},
                {"buffer": 0, "byteLength": 48, "byteStride": 24},
            ],
            "buffers": [{"byteLength": 48}],
        }),
        binary,
    );
    assert!(matches!(
        block_on(session.buffer_view(0)),
        Err(GltfLoaderError::BufferViewOutOfBounds { view: 0, .. })
    ));
    for index in 0..4 {
        let result = block_on(session.accessor(index));
        assert!(
            matches!(result, Err(GltfLoaderError::AccessorOutOfBounds(i)) if i == index),
            "accessor #{} gave {:?}",
            index,
            result
        );
    }
}

#[test]
fn test_interleaved_accessors_share_buffer() {
    // Two vertices of position followed by normal.
    let binary = f32_bytes(&[
        1.0, 2.0, 3.0, 0.0, 0.0, 1.0, //
        4.0, 5.0, 6.0, 0.0, 1.0, 0.0, //
    ]);
    let session = session(
        json!({
            "asset": {"version": "2.0"},
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 12, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 24, "componentType": 5126, "count": 1, "type": "VEC3"},
            ],
            "bufferViews": [{"buffer": 0, "byteLength": 48, "byteStride": 24}],
            "buffers": [{"byteLength": 48}],
        }),
        binary,
    );
    let (position, normal, second) = block_on(async {
        futures::try_join!(session.accessor(0), session.accessor(1), session.accessor(2))
    })
    .unwrap();
    let (position, normal, second) = (position.unwrap(), normal.unwrap(), second.unwrap());
    assert!(position.is_interleaved());
    assert_eq!(position.read_vec3(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    assert_eq!(normal.read_vec3(), vec![[0.0, 0.0, 1.0], [0.0, 1.0, 0.0]]);
    assert!(position.shares_buffer_with(&normal));

    // Starts one stride in, so it gets its own allocation.
    assert_eq!(second.read_vec3(), vec![[4.0, 5.0, 6.0]]);
    assert!(!second.shares_buffer_with(&position));
}

#[test]
fn test_morph_target_without_data_keeps_alignment() {
    let mut binary = triangle();
    binary.extend(f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
    let session = session(
        json!({
            "asset": {"version": "2.0"},
            "meshes": [{
                "primitives": [{
                    "attributes": {"POSITION": 0},
                    "targets": [{"POSITION": 1}, {"POSITION": 2}],
                }],
            }],
            "accessors": [
                position_accessor(0),
                {"componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3"},
            ],
            "bufferViews": [
                {"buffer": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 36},
            ],
            "buffers": [{"byteLength": 72}],
        }),
        binary,
    );
    let mesh = block_on(session.mesh(0)).unwrap();
    let primitive = &mesh.primitives[0];
    assert_eq!(primitive.morph_target_influences, vec![0.0, 0.0]);
    let targets = &primitive.geometry.morph_attributes.position;
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].read_vec3(), vec![[0.0; 3]; 3]);
    assert_eq!(targets[1].read_vec3(), vec![[0.0, 0.0, 1.0]; 3]);
}

/// Hands out fixed positions and records what it was asked to decode.
#[derive(Default)]
struct FixedMeshDecoder {
    requests: Rc<RefCell<Vec<(Bytes, BTreeMap<VertexAttribute, CompressedAttribute>)>>>,
}

impl MeshDecoder for FixedMeshDecoder {
    fn decode<'a>(
        &'a self,
        data: Bytes,
        attributes: &'a BTreeMap<VertexAttribute, CompressedAttribute>,
    ) -> LocalBoxFuture<'a, Result<GeometryAsset, DecoderError>> {
        async move {
            self.requests.borrow_mut().push((data, attributes.clone()));
            let positions: Vec<u8> = [0u16, 0, 0, 65535, 0, 0, 0, 65535, 0]
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect();
            let position =
                AccessorView::packed(ComponentType::U16, Dimensions::Vec3, false, Bytes::from(positions));
            let mut geometry = GeometryAsset::default();
            geometry
                .attributes
                .insert(VertexAttribute::Position, Arc::new(position));
            Ok(geometry)
        }
        .boxed_local()
    }
}

#[test]
fn test_compressed_primitive_uses_decoder() {
    let mut binary = b"DRCO".to_vec();
    binary.extend([0u16, 1, 2].iter().flat_map(|value| value.to_le_bytes()));
    let decoder = FixedMeshDecoder::default();
    let requests = decoder.requests.clone();
    let loader = GltfLoader::new(MemoryFetcher::new()).with_mesh_decoder(decoder);
    let document = json!({
        "asset": {"version": "2.0"},
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"],
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": 0},
            "indices": 1,
            "extensions": {"KHR_draco_mesh_compression": {
                "bufferView": 0,
                "attributes": {"POSITION": 7},
            }},
        }]}],
        "accessors": [
            {"componentType": 5123, "count": 3, "type": "VEC3", "normalized": true},
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"},
        ],
        "bufferViews": [
            {"buffer": 0, "byteLength": 4},
            {"buffer": 0, "byteOffset": 4, "byteLength": 6},
        ],
        "buffers": [{"byteLength": 10}],
    });
    let asset = block_on(loader.parse(glb(&document, &binary))).unwrap();

    let requests = requests.borrow();
    assert_eq!(requests.len(), 1);
    let (data, attributes) = &requests[0];
    assert_eq!(&data[..], b"DRCO");
    let layout = attributes[&VertexAttribute::Position];
    assert_eq!(layout.id, 7);
    assert_eq!(layout.component_type, ComponentType::U16);
    assert!(layout.normalized);

    let scene = asset.scene.unwrap();
    let geometry = &scene.nodes[0].content.mesh.as_ref().unwrap().primitives[0].geometry;
    assert_eq!(geometry.vertex_count(), 3);
    assert!(geometry.attributes[&VertexAttribute::Position].normalized);
    assert_eq!(geometry.indices.as_ref().unwrap().read_u32(), vec![0, 1, 2]);
    assert!(geometry.bounding_box.is_none());
}

/// Turns any input into a single white pixel.
#[derive(Default)]
struct WhitePixelDecoder {
    inputs: Rc<RefCell<Vec<Bytes>>>,
    calls: Rc<Cell<usize>>,
}

impl TextureDecoder for WhitePixelDecoder {
    fn decode(&self, data: Bytes) -> LocalBoxFuture<'_, Result<TextureImage, DecoderError>> {
        async move {
            self.calls.set(self.calls.get() + 1);
            self.inputs.borrow_mut().push(data);
            Ok(TextureImage::Decoded {
                size: (1, 1),
                format: TextureAssetFormat::Rgbau8,
                data: vec![255; 4],
            })
        }
        .boxed_local()
    }
}

#[test]
fn test_dds_texture_source() {
    let decoder = WhitePixelDecoder::default();
    let (inputs, calls) = (decoder.inputs.clone(), decoder.calls.clone());
    let options = ExtensionOptions {
        dds_decoder: Some(Rc::new(decoder)),
        ..Default::default()
    };
    let params = AssetLoadParams {
        decode_images: false,
        ..Default::default()
    };
    let session = session_with(
        json!({
            "asset": {"version": "2.0"},
            "extensionsUsed": ["MSFT_texture_dds"],
            "images": [
                {"bufferView": 0, "mimeType": "image/png"},
                {"bufferView": 1, "mimeType": "image/vnd-ms.dds"},
            ],
            "textures": [
                {"source": 0, "extensions": {"MSFT_texture_dds": {"source": 1}}},
                {"source": 1},
                {"source": 0, "extensions": {"MSFT_texture_dds": {"source": 1}}},
            ],
            "bufferViews": [
                {"buffer": 0, "byteLength": 4},
                {"buffer": 0, "byteOffset": 4, "byteLength": 4},
            ],
            "buffers": [{"byteLength": 8}],
        }),
        b"PNG!DDS ".to_vec(),
        options,
        params,
    );
    let (dds, plain, again) = block_on(async {
        futures::try_join!(session.texture(0), session.texture(1), session.texture(2))
    })
    .unwrap();

    assert!(matches!(
        *dds.image,
        TextureImage::Decoded { size: (1, 1), .. }
    ));
    assert!(Arc::ptr_eq(&dds.image, &again.image));
    // The same image read without the extension stays encoded.
    let TextureImage::Encoded { mime_type, data } = &*plain.image else {
        panic!("expected encoded image, got {:?}", plain.image);
    };
    assert_eq!(mime_type.as_deref(), Some("image/vnd-ms.dds"));
    assert_eq!(&data[..], b"DDS ");

    assert_eq!(calls.get(), 1);
    assert_eq!(&inputs.borrow()[0][..], b"DDS ");
}
