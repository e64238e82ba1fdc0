//! rigview - inspect, fit and export character rigs
//!
//! Loads a glTF/GLB/BVH asset through the same pipeline a viewer uses and
//! either prints what it found, writes a fitted glTF/GLB with all clips, or
//! hands the files to the remote conversion service.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use rigview::export::{ExportRequest, HttpExportClient, RemoteExporter, RemoteOperation, UploadFile};
use rigview::{AssetKind, ExportOptions, ModelViewer, ViewerConfig};

#[derive(Parser)]
#[command(name = "rigview")]
#[command(about = "Character rig normalization, retargeting and export")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print skeleton, clips and fit of an asset
    Inspect {
        /// Asset path or URL (glb, gltf, bvh)
        asset: String,

        /// Asset kind tag, overrides the extension
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Write the fitted asset with every clip as glTF/GLB
    Export {
        /// Asset path or URL (glb, gltf, bvh)
        asset: String,

        /// BVH motion files to retarget onto the asset
        #[arg(short, long)]
        motion: Vec<PathBuf>,

        /// Output file (default: <asset stem>.glb / .gltf)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write text glTF with an embedded buffer instead of GLB
        #[arg(long)]
        text: bool,
    },

    /// Submit files to the remote conversion service and wait for the result
    Remote {
        /// Character file (fbx, glb, gltf, bvh)
        character: PathBuf,

        /// Animation file, required for retargeting
        #[arg(short, long)]
        animation: Option<PathBuf>,

        /// retarget, autorig or sprint
        #[arg(long, default_value = "retarget")]
        op: String,
    },
}

fn asset_kind(asset: &str, tag: Option<&str>) -> Result<AssetKind> {
    let kind = match tag {
        Some(tag) => AssetKind::from_tag(tag),
        None => AssetKind::from_path(asset),
    };
    kind.with_context(|| format!("cannot determine the kind of '{asset}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    match cli.command {
        Commands::Inspect { asset, kind } => {
            let kind = asset_kind(&asset, kind.as_deref())?;
            let mut viewer = ModelViewer::new(ViewerConfig {
                autoplay: false,
                ..config
            });
            viewer.load(&asset, kind).await?;

            let Some(model) = viewer.model() else {
                bail!("nothing was loaded");
            };
            println!("{asset} ({kind})");
            println!("  nodes:     {}", model.asset.prefab.nodes.len());
            println!("  meshes:    {}", model.asset.prefab.mesh_count());
            println!("  scale:     {:.6}", model.normalization.scale_factor);
            println!("  offset:    {}", model.normalization.offset);
            match &model.skeleton {
                Some(skeleton) => {
                    println!("  bones:     {}", skeleton.bones.len());
                    for name in skeleton.bone_names() {
                        println!("    {name}");
                    }
                }
                None => println!("  bones:     none"),
            }
            println!("  clips:");
            for entry in viewer.playback().library().iter() {
                println!(
                    "    {} ({:.2}s, {} tracks, {:?})",
                    entry.name,
                    entry.clip.duration,
                    entry.clip.tracks.len(),
                    entry.origin
                );
            }
        }

        Commands::Export {
            asset,
            motion,
            out,
            text,
        } => {
            let kind = asset_kind(&asset, None)?;
            let mut viewer = ModelViewer::new(config);
            viewer.load(&asset, kind).await?;

            for path in &motion {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("motion.bvh");
                let name = viewer.add_motion_clip(file_name, &content)?;
                log::info!("Added motion clip '{name}'");
            }

            let blob = viewer.export_local(ExportOptions { binary: !text })?;
            let out = out.unwrap_or_else(|| {
                let stem = rigview::assets::AssetReaderVariant::source_stem(&asset);
                PathBuf::from(blob.file_name(stem))
            });
            tokio::fs::write(&out, &blob.bytes)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{} ({} bytes)", out.display(), blob.bytes.len());
        }

        Commands::Remote {
            character,
            animation,
            op,
        } => {
            let operation: RemoteOperation = op.parse()?;
            let request = ExportRequest {
                operation,
                character: UploadFile::read(&character).await?,
                animation: match &animation {
                    Some(path) => Some(UploadFile::read(path).await?),
                    None => None,
                },
            };

            let client = HttpExportClient::new(&config.export)?;
            let exporter = RemoteExporter::new(client, config.export.clone());
            let outcome = exporter
                .export(&request, |report| {
                    let progress = report.progress.map(|p| format!(" {p:.0}%")).unwrap_or_default();
                    eprintln!("{:?}{progress}", report.status);
                })
                .await?;
            println!("{}", outcome.download_url);
        }
    }

    Ok(())
}
