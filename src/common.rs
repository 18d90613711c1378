//! Common functionality.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use byte_unit::{Byte, UnitType};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use clap::Parser;
use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};
use tracing::{debug, trace};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    match procfs::process::Process::myself().and_then(|me| me.stat()) {
        Ok(stat) => debug!(
            "RSS now: {}",
            Byte::from_u64(stat.rss * procfs::page_size()).get_appropriate_unit(UnitType::Binary)
        ),
        Err(e) => debug!("could not determine RSS: {}", e),
    }
}

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn Read>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open {:?} for reading: {}", path.as_ref(), e))?;
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        trace!("Opening {:?} as gzip for reading", path.as_ref());
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(decoder))
    } else {
        trace!("Opening {:?} as plain text for reading", path.as_ref());
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open a file with gzip encoder.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open {:?} for writing: {}", path.as_ref(), e))?;
    let bufwriter = BufWriter::new(file);
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        trace!("Opening {:?} as gzip for writing", path.as_ref());
        let encoder = GzEncoder::new(bufwriter, Compression::default());
        Ok(Box::new(encoder))
    } else {
        trace!("Opening {:?} as plain text for writing", path.as_ref());
        Ok(Box::new(bufwriter))
    }
}
