//! Provide scene assets decoded from glTF 2.0 documents.
//!
//! This library provides a node structure modelled upon glTF and the
//! loader producing it from `.gltf` text or `.glb` binary containers.
//! External buffers and images are requested through a
//! [`fetch::ResourceFetcher`], isolating resource loading from the
//! file-system so documents can be decoded from memory as well.
//!
pub mod accessor;
pub mod animation;
pub mod camera;
pub mod fetch;
pub mod index;
pub mod light;
/// Document loaders
pub mod loader;
pub mod material;
pub mod mesh;
pub mod node;
pub mod primitive;
pub mod scene;
pub mod skin;
pub mod texture;
