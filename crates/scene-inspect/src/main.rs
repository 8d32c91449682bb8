use std::{
    path::{Path, PathBuf},
    process,
};

use clap::Parser;
use log::error;
use scene_asset::{
    fetch::DirectoryFetcher,
    loader::{gltf::GltfLoader, AssetLoadParams},
    node::NodeAsset,
    scene::GltfAsset,
};

/// Print the scene graph decoded from a glTF document
#[derive(Parser)]
#[command(name = "scene-inspect")]
struct Args {
    /// `.gltf` or `.glb` file; external resources are read relative to it
    path: PathBuf,

    /// Keep images encoded instead of decoding their pixels
    #[arg(long)]
    keep_images: bool,
}

fn print_node(node: &NodeAsset, depth: usize) {
    let name = node.name().unwrap_or("<unnamed>");
    print!("{:indent$}{} ({:?})", "", name, node.content.kind, indent = depth * 2);
    if let Some(mesh) = &node.content.mesh {
        let vertices: usize = mesh
            .primitives
            .iter()
            .map(|primitive| primitive.geometry.vertex_count())
            .sum();
        print!(
            " mesh {}: {} primitives, {} vertices",
            mesh.name,
            mesh.primitives.len(),
            vertices
        );
        if let Some(skeleton) = &mesh.skeleton {
            print!(", {} bones", skeleton.bones.len());
        }
    }
    if let Some(light) = &node.content.light {
        print!(" light {:?}", light.kind);
    }
    println!();
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn print_summary(asset: &GltfAsset) {
    println!(
        "glTF {}{}",
        asset.asset.version,
        asset
            .asset
            .generator
            .as_deref()
            .map(|generator| format!(" by {}", generator))
            .unwrap_or_default()
    );
    for (index, scene) in asset.scenes.iter().enumerate() {
        let default = asset
            .scene
            .as_ref()
            .is_some_and(|default| default.id == scene.id);
        println!(
            "Scene #{} {}{}",
            index,
            scene.name.as_deref().unwrap_or(""),
            if default { " (default)" } else { "" }
        );
        for node in &scene.nodes {
            print_node(node, 1);
        }
    }
    for camera in &asset.cameras {
        println!("Camera {}: {:?}", camera.id, camera.projection);
    }
    for animation in &asset.animations {
        println!(
            "Animation {}: {} tracks, {:.3}s",
            animation.name,
            animation.channels.len(),
            animation.duration
        );
    }
    for (object, extensions) in &asset.extensions {
        let names: Vec<&str> = extensions.keys().map(String::as_str).collect();
        println!("Unhandled extensions on {}: {}", object, names.join(", "));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args = Args::parse();

    let path = args.path.as_path();
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        eprintln!("Invalid path {}", path.display());
        process::exit(2);
    };

    let params = AssetLoadParams {
        decode_images: !args.keep_images,
        ..Default::default()
    };
    let loader = GltfLoader::new(DirectoryFetcher::new(directory)).with_params(params);
    match loader.load(file_name).await {
        Ok(asset) => print_summary(&asset),
        Err(err) => {
            error!("Failed to load {}: {}", path.display(), err);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::try_parse_from(["scene-inspect", "models/a.glb", "--keep-images"]).unwrap();
        assert_eq!(args.path, PathBuf::from("models/a.glb"));
        assert!(args.keep_images);

        let args = Args::try_parse_from(["scene-inspect", "a.gltf"]).unwrap();
        assert!(!args.keep_images);
        assert!(Args::try_parse_from(["scene-inspect"]).is_err());
    }
}
