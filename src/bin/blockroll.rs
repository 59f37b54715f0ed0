//! blockroll CLI
//!
//! Splits a byte stream into rotating block files and joins them back.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use blockroll::{BlockSink, BlockSource, EngineConfig, SequentialPaths};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// blockroll
#[derive(Parser, Debug)]
#[command(name = "blockroll")]
#[command(about = "Stream bytes through rotating fixed-capacity block files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a file (or stdin) into block files
    Split {
        /// Input file; stdin when omitted
        input: Option<PathBuf>,

        #[command(flatten)]
        blocks: BlockArgs,

        /// Block capacity in bytes
        #[arg(short, long, default_value = "8388608")]
        capacity: u64,

        /// Fraction of the block left when the next one is pre-opened
        #[arg(short, long, default_value = "0.2")]
        threshold: f64,

        /// Sync after every N writes
        #[arg(short, long, default_value = "1")]
        sync_every: u32,

        /// Size of each write handed to the sink
        #[arg(long, default_value = "65536")]
        chunk: usize,
    },

    /// Reassemble block files into a file (or stdout)
    Join {
        /// Output file; stdout when omitted
        output: Option<PathBuf>,

        #[command(flatten)]
        blocks: BlockArgs,

        /// Size of each read requested from the source
        #[arg(long, default_value = "65536")]
        chunk: usize,
    },
}

/// Where the block files live and how they are named
#[derive(ClapArgs, Debug)]
struct BlockArgs {
    /// Block directory
    #[arg(short, long, default_value = "./blocks")]
    dir: PathBuf,

    /// Block file name prefix
    #[arg(long, default_value = SequentialPaths::DEFAULT_PREFIX)]
    prefix: String,

    /// Block file extension
    #[arg(long, default_value = SequentialPaths::DEFAULT_EXTENSION)]
    extension: String,
}

impl BlockArgs {
    fn writer_paths(&self) -> SequentialPaths {
        SequentialPaths::new(&self.dir)
            .with_prefix(&self.prefix)
            .with_extension(&self.extension)
    }

    fn reader_paths(&self) -> SequentialPaths {
        SequentialPaths::existing(&self.dir)
            .with_prefix(&self.prefix)
            .with_extension(&self.extension)
    }
}

fn main() {
    // Logs go to stderr so `join` can stream data on stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blockroll=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Split {
            input,
            blocks,
            capacity,
            threshold,
            sync_every,
            chunk,
        } => {
            let config = EngineConfig::builder()
                .block_capacity(capacity)
                .pre_open_threshold(threshold)
                .sync_every(sync_every)
                .build();
            split(input, &blocks, config, chunk.max(1))
        }
        Commands::Join {
            output,
            blocks,
            chunk,
        } => join(output, &blocks, chunk.max(1)),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn split(
    input: Option<PathBuf>,
    blocks: &BlockArgs,
    config: EngineConfig,
    chunk: usize,
) -> blockroll::Result<()> {
    let mut reader: Box<dyn Read> = match &input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };

    tracing::info!("blockroll v{}", blockroll::VERSION);
    tracing::info!("Block directory: {}", blocks.dir.display());

    let sink = BlockSink::new(config, blocks.writer_paths())?;
    let mut buf = vec![0u8; chunk];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink.write(&buf[..n])?;
        total += n as u64;
    }

    let block_count = sink.block_count();
    sink.close();

    tracing::info!("Wrote {} bytes into {} block(s)", total, block_count);
    Ok(())
}

fn join(output: Option<PathBuf>, blocks: &BlockArgs, chunk: usize) -> blockroll::Result<()> {
    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let source = BlockSource::new(EngineConfig::default(), blocks.reader_paths())?;
    let mut buf = vec![0u8; chunk];
    let mut total: u64 = 0;

    loop {
        let status = source.read(&mut buf)?;
        if status.is_end() {
            break;
        }
        let n = status.bytes();
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;

    let block_count = source.block_count();
    source.close();

    tracing::info!("Read {} bytes from {} block(s)", total, block_count);
    Ok(())
}
