use std::collections::VecDeque;
use std::fs::{create_dir_all, read_dir};
use std::panic::resume_unwind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::spawn;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lgdb_reader::{
    decode_world_geometry_with, open_container, AxisConvention, ChannelOrder, ContainerFile,
    DecodeOptions, WorldGeometry, WorldSlot,
};
use log::{error, info};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    decode: DecodeArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DecodeArgs {
    /// Which packed lightmap field is red
    #[arg(long, global = true, value_enum, default_value_t = ChannelOrderArg::Rgb)]
    channel_order: ChannelOrderArg,

    /// Coordinate convention for positions, normals and winding
    #[arg(long, global = true, value_enum, default_value_t = AxisArg::Native)]
    axis: AxisArg,

    /// Largest lightmap atlas edge in texels
    #[arg(long, global = true, default_value_t = 4096)]
    max_atlas: usize,
}

impl DecodeArgs {
    fn options(&self) -> DecodeOptions {
        DecodeOptions {
            channel_order: match self.channel_order {
                ChannelOrderArg::Rgb => ChannelOrder::Rgb,
                ChannelOrderArg::Bgr => ChannelOrder::Bgr,
            },
            axis_convention: match self.axis {
                AxisArg::Native => AxisConvention::Native,
                AxisArg::YUpRh => AxisConvention::YUpRightHanded,
                AxisArg::YUpLh => AxisConvention::YUpLeftHanded,
            },
            max_atlas_dimension: self.max_atlas,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelOrderArg {
    Rgb,
    Bgr,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    /// File coordinates
    Native,
    /// Y up, right handed: (x, z, -y)
    YUpRh,
    /// Y up, left handed: (x, z, y), winding reversed
    YUpLh,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the container header, table of contents and world geometry summary
    Describe {
        file: PathBuf,
    },
    /// Writes one cell's lightmap atlas as a PNG
    ExportAtlas {
        file: PathBuf,
        /// Cell index
        #[arg(long)]
        cell: usize,
        /// Directory to write to (default: .)
        #[arg(long)]
        dst: Option<PathBuf>,
    },
    /// Decodes every file in a directory and prints a line per file
    Scan {
        dir: PathBuf,
        #[arg(long, default_value_t = 8)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = cli.decode.options();
    match cli.command {
        Command::Describe { file } => describe(&file, &options),
        Command::ExportAtlas { file, cell, dst } => export_atlas(&file, cell, dst, &options),
        Command::Scan { dir, threads } => scan(&dir, threads, &options),
    }
}

fn describe(path: &Path, options: &DecodeOptions) -> Result<()> {
    let mut slot = WorldSlot::new();
    let world = slot
        .load_with(path, options)
        .with_context(|| format!("Loading {}", path.display()))?;

    print_container(world.container());
    println!();
    print_geometry(world.geometry());
    Ok(())
}

fn print_container(container: &ContainerFile) {
    let header = container.header();
    println!("File: {} bytes", container.len());
    println!("  TOC offset: {}", header.toc_offset);
    println!("  Version:    {}", header.version);
    println!("  Marker:     {}", header.marker_string());
    println!("Items: {}", container.toc().len());
    for entry in container.toc() {
        println!(
            "  {:<12} offset {:>10} size {:>10}",
            entry.name, entry.offset, entry.size
        );
    }
}

fn print_geometry(geometry: &WorldGeometry) {
    let header = geometry.header();
    println!(
        "World: {} v{} ({:?} lightmaps)",
        geometry.chunk_name(),
        geometry.chunk_version(),
        geometry.params().texel_format,
    );
    println!("  Cells:            {}", header.cell_count);
    println!("  Data size:        {}", header.data_size);
    println!("  Lightmap format:  {}", header.lightmap_format);
    println!("  Lightmap scale:   {}", header.lightmap_scale);

    let mut vertices = 0;
    let mut polygons = 0;
    let mut triangles = 0;
    let mut lightmaps = 0;
    for cell in geometry.cells() {
        let record = cell.record();
        vertices += record.vertices.len();
        polygons += record.polygons.len();
        triangles += cell.mesh().triangle_count();
        lightmaps += record.lightmaps.len();
    }
    println!(
        "  Totals:           {} vertices, {} polygons, {} triangles, {} lightmaps",
        vertices, polygons, triangles, lightmaps,
    );
}

fn export_atlas(
    path: &Path,
    cell_index: usize,
    dst: Option<PathBuf>,
    options: &DecodeOptions,
) -> Result<()> {
    let container =
        open_container(path).with_context(|| format!("Opening {}", path.display()))?;
    let geometry = decode_world_geometry_with(&container, options)
        .with_context(|| format!("Decoding {}", path.display()))?;
    let cell = geometry.cell(cell_index).ok_or_else(|| {
        anyhow!(
            "{} has {} cells, no cell {}",
            path.display(),
            geometry.cells().len(),
            cell_index,
        )
    })?;

    let atlas = cell.lightmap_atlas();
    if atlas.image().is_empty() {
        bail!("cell {} has no rendered polygons", cell_index);
    }

    let dst = dst.unwrap_or_else(|| PathBuf::from("."));
    create_dir_all(&dst)?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "world".to_string());
    let png_path = dst.join(format!("{}_cell{}.png", stem, cell_index));
    atlas
        .image()
        .write_to_png(&png_path)
        .with_context(|| format!("Writing {}", png_path.display()))?;
    info!(
        "wrote {}x{} atlas with {} lightmaps to {}",
        atlas.width(),
        atlas.height(),
        atlas.rects().len(),
        png_path.display(),
    );
    Ok(())
}

fn scan(dir: &Path, threads: usize, options: &DecodeOptions) -> Result<()> {
    if threads == 0 {
        bail!("--threads must be at least 1");
    }

    let file_queue = Arc::new(Mutex::new(VecDeque::new()));
    let mut locked_queue = file_queue
        .lock()
        .map_err(|_| anyhow!("file queue poisoned"))?;
    for entry in read_dir(dir).with_context(|| format!("Listing {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            locked_queue.push_back(entry.path());
        }
    }
    locked_queue.make_contiguous().sort();
    let file_count = locked_queue.len();
    drop(locked_queue);

    let start = Instant::now();
    let mut workers = Vec::new();
    for _ in 0..threads.min(file_count.max(1)) {
        workers.push(spawn({
            let file_queue = Arc::clone(&file_queue);
            let options = *options;
            move || {
                let mut failures = 0;
                loop {
                    let path = match file_queue.lock() {
                        Ok(mut queue) => match queue.pop_front() {
                            Some(path) => path,
                            None => break,
                        },
                        Err(_) => break,
                    };
                    match scan_file(&path, &options) {
                        Ok(summary) => println!("{}: {}", path.display(), summary),
                        Err(err) => {
                            error!("{}: {:#}", path.display(), err);
                            failures += 1;
                        }
                    }
                }
                failures
            }
        }));
    }

    let mut failures = 0;
    for worker in workers {
        match worker.join() {
            Ok(count) => failures += count,
            Err(panic_payload) => resume_unwind(panic_payload),
        }
    }
    info!(
        "scanned {} files in {:?}, {} failed",
        file_count,
        start.elapsed(),
        failures,
    );
    Ok(())
}

fn scan_file(path: &Path, options: &DecodeOptions) -> Result<String> {
    let container = open_container(path)?;
    let geometry = decode_world_geometry_with(&container, options)?;
    let triangles: usize = geometry
        .cells()
        .iter()
        .map(|cell| cell.mesh().triangle_count())
        .sum();
    Ok(format!(
        "{} v{}, {} cells, {} triangles",
        geometry.chunk_name(),
        geometry.chunk_version(),
        geometry.cells().len(),
        triangles,
    ))
}
