use clap::{Parser, Subcommand};
use lzpak::archive::{pack_dir, Archive};
use lzpak::codec::{decode_measured, read_header};
use lzpak::container::{PackOptions, ReaderOptions, DEFAULT_MAX_SUBFILE_SIZE};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lzpak", about = "Offset-table archive tool with LZ10/LZ11 support")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every subfile of an archive as NNNN.bin
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Largest stored subfile to accept, in KiB
        #[arg(long, default_value_t = DEFAULT_MAX_SUBFILE_SIZE / 1024)]
        max_size: u64,
    },
    /// Pack a directory of indexed files into an archive
    Pack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Store every file as raw instead of detecting LZ streams
        #[arg(long)]
        no_detect: bool,
    },
    /// List archive contents
    List {
        input: PathBuf,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the decoded contents of one subfile
    Cat {
        input: PathBuf,
        index: usize,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode a standalone LZ10/LZ11 file
    Decompress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir, max_size } => {
            let opts = ReaderOptions { max_subfile_size: kib_to_bytes(max_size) };
            let mut ar = Archive::open_with_options(&input, opts)?;
            let written = ar.extract_all(&output_dir)?;
            println!("Unpacked {} of {} subfiles to: {}", written, ar.len(), output_dir.display());
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { input, output, no_detect } => {
            let opts = PackOptions { detect_compression: !no_detect };
            let layout = pack_dir(&input, &output, &opts)?;
            for (index, entry) in layout.entries.iter().enumerate() {
                if entry.is_gap() { continue; }
                println!("  packed  {:04}  {}{}", index, entry.size,
                    if entry.compressed { "  (lz)" } else { "" });
            }
            println!("Created: {} ({} bytes)", output.display(), layout.end);
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let mut ar = Archive::open(&input)?;
            let infos = ar.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
                return Ok(());
            }
            println!("Archive: {} ({} bytes)", input.display(), ar.file_len());
            println!("{:>6} {:>10} {:>10} {:>10} {:>4}  CRC32",
                     "Index", "Offset", "Size", "Stored", "LZ");
            for info in infos {
                println!("{:>6} {:>10} {:>10} {:>10} {:>4}  {:08x}",
                    info.index, info.offset, info.size, info.stored_len,
                    if info.compressed { "yes" } else { "" }, info.crc32);
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, index, output } => {
            let mut ar = Archive::open(&input)?;
            let data = ar.read_decompressed(index)?;
            match output {
                Some(path) => std::fs::write(path, &data)?,
                None       => std::io::stdout().lock().write_all(&data)?,
            }
        }

        // ── Decompress ───────────────────────────────────────────────────────
        Commands::Decompress { input, output } => {
            let data = std::fs::read(&input)?;
            let header = read_header(&data[..])?;
            let (decoded, consumed) = decode_measured(&data)?;
            std::fs::write(&output, &decoded)?;
            println!("{}: {} -> {} bytes ({})", input.display(), consumed, decoded.len(),
                header.format.name());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn kib_to_bytes(kib: u64) -> u64 {
    kib.saturating_mul(1024)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_size_saturates() {
        assert_eq!(kib_to_bytes(DEFAULT_MAX_SUBFILE_SIZE / 1024), DEFAULT_MAX_SUBFILE_SIZE);
        assert_eq!(kib_to_bytes(u64::MAX), u64::MAX);
    }

    #[test]
    fn cli_accepts_huge_max_size() {
        let cli = Cli::try_parse_from(["lzpak", "unpack", "a.bin", "--max-size", "18446744073709551615"]).unwrap();
        match cli.command {
            Commands::Unpack { max_size, .. } => assert_eq!(kib_to_bytes(max_size), u64::MAX),
            _ => panic!("expected unpack"),
        }
    }
}
