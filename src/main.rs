use anyhow::{bail, Context};
use clap::Parser;
use log::LevelFilter;
use pianodisc::{
    build_image,
    floppy::{BootSector, BuildOptions, FloppyImage},
    logger,
    sources::collect_sources,
    transfer::ImageLocation,
};
use std::process;

#[derive(Parser, Debug)]
#[command(version, about, arg_required_else_help = true)]
struct Args {
    /// MIDI file, directory or wildcard pattern to put on a new image
    #[arg(long, value_name = "PATH", num_args = 1.., conflicts_with = "simg")]
    midi: Vec<String>,

    /// Source image: a file or <device>:<n>
    #[arg(long, value_name = "LOC")]
    simg: Option<ImageLocation>,

    /// Destination image: a file or <device>:<n>
    #[arg(long, value_name = "LOC")]
    dimg: Option<ImageLocation>,

    /// List the files on the source image
    #[arg(long, requires = "simg", conflicts_with = "dimg")]
    list: bool,

    /// Overwrite a destination file even if it is not a floppy image
    #[arg(short, long)]
    force: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug)]
enum Request {
    Create {
        midi: Vec<String>,
        dest: ImageLocation,
    },
    Copy {
        source: ImageLocation,
        dest: ImageLocation,
    },
    List {
        source: ImageLocation,
    },
}

impl TryFrom<Args> for Request {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        Ok(match (args.simg, args.dimg) {
            (Some(source), None) if args.list => Request::List { source },
            (Some(source), Some(dest)) => Request::Copy { source, dest },
            (None, Some(dest)) if !args.midi.is_empty() => Request::Create {
                midi: args.midi,
                dest,
            },
            (None, Some(_)) => bail!("nothing to do: give --midi or --simg"),
            (_, None) => bail!("no destination image given (--dimg)"),
        })
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(err) = logger::init(level) {
        eprintln!("failed to set up logging: {err}");
    }

    let force = args.force;
    if let Err(err) = Request::try_from(args).and_then(|request| run(request, force)) {
        log::error!("{err:#}");
        process::exit(1);
    }
}

fn run(request: Request, force: bool) -> anyhow::Result<()> {
    match request {
        Request::Create { midi, dest } => {
            let sources = collect_sources(&midi)?;
            let (image, added) = build_image(&sources, &BuildOptions::default())
                .context("failed to build image")?;
            for (source, file) in sources.iter().zip(&added) {
                log::debug!(
                    "{} -> {} ({} bytes, {} clusters from {})",
                    source.path.display(),
                    file.name,
                    source.len,
                    file.clusters,
                    file.first_cluster
                );
            }

            write_image(&image, &dest, force)?;
            log::info!("wrote {} file(s) to {dest}", added.len());
        }
        Request::Copy { source, dest } => {
            let image = source
                .read()
                .with_context(|| format!("failed to read image from {source}"))?;
            write_image(&image, &dest, force)?;
            log::info!("copied {source} to {dest}");
        }
        Request::List { source } => {
            let image = source
                .read()
                .with_context(|| format!("failed to read image from {source}"))?;
            list(&image);
        }
    }
    Ok(())
}

fn write_image(image: &FloppyImage, dest: &ImageLocation, force: bool) -> anyhow::Result<()> {
    dest.write(image, force)
        .with_context(|| format!("failed to write image to {dest}"))
}

fn list(image: &FloppyImage) {
    if let Some(boot) = BootSector::parse(image.boot_sector()) {
        println!(
            "volume {} serial {:08X} ({})",
            boot.label_str(),
            boot.serial,
            String::from_utf8_lossy(&boot.fs_type).trim_end()
        );
    }

    let mut total = 0u64;
    let mut files = 0usize;
    for entry in image.entries() {
        if entry.is_volume_label() {
            continue;
        }
        let size = if entry.is_dir() {
            String::from("<DIR>")
        } else {
            entry.size.to_string()
        };
        println!(
            "{:<12} {:>8} {:>5} {}",
            entry.name.to_string(),
            size,
            entry.first_cluster,
            entry.modified
        );
        total += entry.size as u64;
        files += 1;
    }
    println!("{files} file(s), {total} bytes");
}
