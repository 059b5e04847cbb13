//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use undertow_core::{
    AccessMode, BlockingVfs, FileId, OpenFlags, ResultCode, SwarmClient, SwarmSource,
    TorrentSpecifier, UndertowConfig, UndertowError, VfsConfig,
};
use undertow_sim::{SimulatedSwarmClient, StreamProfile, seed_directory};

/// Identifier used for the single file each command opens.
const CLI_FILE_ID: FileId = FileId(1);

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show size and swarm details of a file
    Stat {
        #[command(flatten)]
        swarm: SwarmArgs,
        /// File inside the torrent; defaults to the main file
        name: Option<String>,
    },
    /// Check whether a file exists in the torrent
    Access {
        #[command(flatten)]
        swarm: SwarmArgs,
        /// File inside the torrent
        name: String,
    },
    /// Read a byte range and print it as hex
    Read {
        #[command(flatten)]
        swarm: SwarmArgs,
        /// File inside the torrent; defaults to the main file
        name: Option<String>,
        /// Byte offset to start reading at
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of bytes to read
        #[arg(long, default_value_t = 256)]
        length: usize,
    },
}

/// Options describing the simulated swarm a command runs against.
///
/// Adapter settings start from the `UNDERTOW_*` environment variables; flags
/// given here win over them.
#[derive(Args)]
pub struct SwarmArgs {
    /// Directory (or single file) whose contents the swarm serves
    dir: PathBuf,
    /// Select opened files for download immediately
    #[arg(long)]
    prefetch: bool,
    /// How long to wait for torrent metadata [default: 5000]
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// File an unnamed open refers to
    #[arg(long)]
    main_file: Option<String>,
    /// Largest chunk the swarm delivers at once
    #[arg(long, default_value_t = 16 * 1024)]
    chunk_size: usize,
    /// Delay before each delivered chunk
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    /// Delay before torrent metadata becomes available
    #[arg(long, default_value_t = 0)]
    metadata_delay_ms: u64,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Stat { swarm, name } => stat_file(&swarm, name.as_deref()),
        Commands::Access { swarm, name } => access_file(&swarm, &name),
        Commands::Read {
            swarm,
            name,
            offset,
            length,
        } => read_range(&swarm, name.as_deref(), offset, length),
    }
}

/// Print size, info hash and gate state of a file
///
/// # Errors
/// - Seeding the directory failed
/// - The file could not be opened
pub fn stat_file(args: &SwarmArgs, name: Option<&str>) -> anyhow::Result<()> {
    let vfs = connect(args)?;
    open(&vfs, name)?;

    let size = vfs
        .file_size(CLI_FILE_ID)
        .map_err(|code| anyhow::anyhow!("Failed to stat file: {code}"))?;

    println!("File: {}", name.unwrap_or("<main>"));
    println!("  Size: {size} bytes");
    println!("  Info hash: {}", vfs.inner().info_hash());
    println!("  Gate: {:?}", vfs.gate_state());
    println!(
        "  Device characteristics: {:#06x}",
        vfs.device_characteristics().bits()
    );

    vfs.close(CLI_FILE_ID);
    vfs.shutdown();
    Ok(())
}

/// Print whether a file exists in the torrent
///
/// # Errors
/// - Seeding the directory failed
pub fn access_file(args: &SwarmArgs, name: &str) -> anyhow::Result<()> {
    let vfs = connect(args)?;

    let exists = vfs
        .access(Some(name), AccessMode::Exists)
        .map_err(|code| anyhow::anyhow!("Access check failed: {code}"))?;
    println!("{name}: {}", if exists { "exists" } else { "missing" });

    vfs.shutdown();
    Ok(())
}

/// Read `length` bytes at `offset` and hex-dump them
///
/// A read past the end of the file is reported as short; the zero-filled
/// tail is still printed.
///
/// # Errors
/// - Seeding the directory failed
/// - The file could not be opened
/// - The swarm stream failed
pub fn read_range(
    args: &SwarmArgs,
    name: Option<&str>,
    offset: u64,
    length: usize,
) -> anyhow::Result<()> {
    let vfs = connect(args)?;
    open(&vfs, name)?;

    let mut buf = vec![0u8; length];
    match vfs.read(CLI_FILE_ID, &mut buf, offset) {
        Ok(()) => {}
        Err(ResultCode::IoErrShortRead) => {
            println!("Short read: file ended before {length} bytes");
        }
        Err(code) => bail!("Read failed at offset {offset}: {code}"),
    }

    print_hex(offset, &buf);

    vfs.close(CLI_FILE_ID);
    vfs.shutdown();
    Ok(())
}

fn connect(args: &SwarmArgs) -> anyhow::Result<BlockingVfs> {
    let client = Arc::new(SimulatedSwarmClient::new());
    let mut torrent = seed_directory(&args.dir)
        .with_context(|| format!("Failed to seed {}", args.dir.display()))?
        .profile(stream_profile(args));
    if args.metadata_delay_ms > 0 {
        torrent = torrent.metadata_delay(Duration::from_millis(args.metadata_delay_ms));
    }
    let info_hash = client.publish(torrent);

    let config = vfs_config(args).map_err(user_facing)?;
    let source = SwarmSource::New {
        client: client as Arc<dyn SwarmClient>,
        torrent: TorrentSpecifier::InfoHash(info_hash),
    };
    BlockingVfs::connect(source, config).map_err(|e| user_facing(e.into()))
}

/// Environment configuration with the command-line flags applied on top.
fn vfs_config(args: &SwarmArgs) -> undertow_core::Result<VfsConfig> {
    let mut config = UndertowConfig::from_env().vfs;
    if args.prefetch {
        config = config.with_prefetch(true);
    }
    if let Some(millis) = args.timeout_ms {
        config = config.with_ready_timeout(Duration::from_millis(millis));
    }
    if let Some(main_file) = &args.main_file {
        config = config.with_main_file(main_file.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Turns a core error into a CLI error led by its user-facing message.
fn user_facing(error: UndertowError) -> anyhow::Error {
    let message = error.user_message();
    if error.is_user_error() {
        anyhow::anyhow!(message)
    } else {
        anyhow::Error::new(error).context(message)
    }
}

fn stream_profile(args: &SwarmArgs) -> StreamProfile {
    StreamProfile::default()
        .with_chunk_size(args.chunk_size)
        .with_chunk_latency(Duration::from_millis(args.latency_ms))
}

fn open(vfs: &BlockingVfs, name: Option<&str>) -> anyhow::Result<()> {
    if let Err(code) = vfs.open(name, CLI_FILE_ID, OpenFlags::READONLY | OpenFlags::MAIN_DB) {
        bail!(
            "Cannot open {} ({code}, gate {:?})",
            name.unwrap_or("<main>"),
            vfs.gate_state()
        );
    }
    Ok(())
}

fn print_hex(offset: u64, bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        println!("{:08x}  {}", offset + (row * 16) as u64, hex::encode(chunk));
    }
}
