//! inventory: Command-line host for the inventory catalog.
//!
//! Uses the same inventory-core as the web build, but persists the tree as a
//! JSON document and attachment bodies as files under the data directory.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use inventory_core::{InventoryState, Node, NodeId, ThumbnailOptions};
use inventory_native::{Catalog, Config, NewAttachment, NewItem};

#[derive(Parser, Debug)]
#[command(name = "inventory")]
#[command(about = "Catalog physical objects in a folder tree")]
struct Args {
    /// Data directory (defaults to INVENTORY_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the catalog if it does not exist yet
    Init,

    /// List the children of a folder (the root by default)
    Ls { folder: Option<String> },

    /// Print the whole tree
    Tree,

    /// Create a folder
    Mkdir { parent: String, name: String },

    /// Create an item, optionally with an image attachment
    Add {
        parent: String,
        name: String,

        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Rename a folder or item
    Rename { id: String, name: String },

    /// Move a node under another folder
    Mv {
        id: String,
        new_parent: String,

        /// Position among the new siblings (appends when omitted)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Delete a node, its descendants and their stored attachments
    Rm { id: String },

    /// Render a preview for an image file
    Thumb {
        file: PathBuf,

        #[arg(long = "max", default_value_t = 320)]
        max_dimension: u32,

        #[arg(long, default_value_t = 0.82)]
        quality: f32,

        /// Write the preview here: JPEG bytes for .jpg/.jpeg, the data URL otherwise
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Resolve a CLI folder argument; `/` and `root` both name the root.
fn folder_arg(arg: Option<&str>) -> NodeId {
    match arg {
        None | Some("/") => NodeId::root(),
        Some(id) => NodeId::from(id),
    }
}

fn describe(node: &Node) -> String {
    match node {
        Node::Folder(folder) => format!("{}/  [{}]", folder.name, folder.id),
        Node::Item(item) => {
            let mut line = format!("{}  [{}]", item.name, item.id);
            if let Some(tags) = &item.tags {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                line.push_str(&format!("  #{}", tags.join(" #")));
            }
            if item.images.as_ref().is_some_and(|images| !images.is_empty()) {
                line.push_str("  (image)");
            }
            line
        }
    }
}

fn print_tree(state: &InventoryState) {
    let Some(root) = state.root() else {
        return;
    };
    println!("{}", root.name);

    let mut stack: Vec<(&Node, usize)> = state
        .children(&root.id)
        .into_iter()
        .rev()
        .map(|node| (node, 1))
        .collect();
    while let Some((node, depth)) = stack.pop() {
        println!("{}{}", "  ".repeat(depth), describe(node));
        if node.as_folder().is_some() {
            stack.extend(
                state
                    .children(node.id())
                    .into_iter()
                    .rev()
                    .map(|child| (child, depth + 1)),
            );
        }
    }
}

async fn read_attachment(path: &PathBuf) -> Result<NewAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    debug!("Attachment {} ({}, {} bytes)", name, mime, bytes.len());
    Ok(NewAttachment { name, mime, bytes })
}

async fn run(catalog: &Catalog, command: Command) -> Result<()> {
    let nodes = catalog.nodes();
    match command {
        Command::Init => {
            let state = nodes.ensure_ready().await?;
            info!("Catalog ready with {} node(s)", state.nodes.len());
        }
        Command::Ls { folder } => {
            let folder = folder_arg(folder.as_deref());
            if nodes.get_node(&folder).await?.is_none() {
                bail!("no such folder: {}", folder);
            }
            for child in nodes.get_children(&folder).await? {
                println!("{}", describe(&child));
            }
        }
        Command::Tree => {
            let state = nodes.ensure_ready().await?;
            print_tree(&state);
        }
        Command::Mkdir { parent, name } => {
            let folder = nodes
                .create_folder(&folder_arg(Some(&parent)), &name)
                .await?;
            println!("{}", folder.id());
        }
        Command::Add {
            parent,
            name,
            image,
            tags,
            notes,
        } => {
            let attachment = match image {
                Some(path) => Some(read_attachment(&path).await?),
                None => None,
            };
            let item = catalog
                .add_item(NewItem {
                    parent_id: folder_arg(Some(&parent)),
                    name,
                    tags: tags.into_iter().collect::<BTreeSet<_>>(),
                    notes,
                    attachment,
                })
                .await?;
            println!("{}", item.id);
        }
        Command::Rename { id, name } => {
            nodes.rename_node(&NodeId::from(id), &name).await?;
        }
        Command::Mv {
            id,
            new_parent,
            index,
        } => {
            nodes
                .move_node(&NodeId::from(id), &folder_arg(Some(&new_parent)), index)
                .await?;
        }
        Command::Rm { id } => {
            let removed = catalog.delete(&NodeId::from(id)).await?;
            info!("Removed {} node(s)", removed.len());
        }
        Command::Thumb {
            file,
            max_dimension,
            quality,
            out,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let thumb = catalog
                .thumbnail(
                    bytes,
                    ThumbnailOptions {
                        max_dimension,
                        quality,
                    },
                )
                .await?;
            info!("Preview is {}x{}", thumb.width, thumb.height);

            match out {
                None => println!("{}", thumb.data_url),
                Some(out) => {
                    let is_jpeg = out.extension().is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
                    });
                    if is_jpeg {
                        let payload = thumb
                            .data_url
                            .split_once(',')
                            .map(|(_, payload)| payload)
                            .context("malformed data URL")?;
                        tokio::fs::write(&out, STANDARD.decode(payload)?).await?;
                    } else {
                        tokio::fs::write(&out, &thumb.data_url).await?;
                    }
                    info!("Wrote {}", out.display());
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, otherwise quiet except our own info (debug with --verbose)
    let default_filter = if args.verbose {
        "debug,inventory_native=debug,inventory_core=debug"
    } else {
        "warn,inventory_native=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.data_dir)?;
    debug!("Data directory: {}", config.data_dir().display());

    let catalog = Catalog::open(&config);
    run(&catalog, args.command).await
}
