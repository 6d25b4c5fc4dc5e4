// src/bin/tdigest_cli.rs
use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use stream_tdigest::tdigest::frontends::{
    parse_probability, parse_value_line, parse_values, parse_variant_str, DigestConfig,
    DigestFormat,
};
use stream_tdigest::tdigest::{ScaleFamily, TDigest};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scale {
    Quad,
    K1,
    K2,
    K3,
}
impl From<Scale> for ScaleFamily {
    fn from(s: Scale) -> Self {
        match s {
            Scale::Quad => ScaleFamily::Quad,
            Scale::K1 => ScaleFamily::K1,
            Scale::K2 => ScaleFamily::K2,
            Scale::K3 => ScaleFamily::K3,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Binary,
    Json,
}
impl From<Format> for DigestFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Binary => DigestFormat::Binary,
            Format::Json => DigestFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Compression parameter (> 0)
    #[arg(short = 'c', long, global = true, default_value_t = 100.0)]
    compression: f64,

    /// Centroid storage (default|array|avltree|tree)
    #[arg(long, global = true, default_value = "default")]
    variant: String,

    /// Scale family (quad|k1|k2|k3)
    #[arg(short = 's', long, global = true, value_enum, default_value_t = Scale::K2)]
    scale: Scale,

    /// Training values (space/comma/newline separated). Defaults to stdin.
    #[arg(short = 'i', long, global = true)]
    input: Option<PathBuf>,

    /// Start from a saved digest instead of an empty one
    #[arg(long, global = true)]
    from_digest: Option<PathBuf>,

    /// Save the digest after training
    #[arg(long, global = true)]
    to_digest: Option<PathBuf>,

    /// Encoding of --from-digest / --to-digest
    #[arg(long, global = true, value_enum, default_value_t = Format::Binary)]
    digest_format: Format,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Read one number per line, print the running quantile after each one
    Stream {
        /// Probability in [0,1]
        prob: f64,
        /// Data file, or '-' for stdin
        data_file: String,
        /// Overrides --variant
        #[arg(value_name = "VARIANT")]
        stream_variant: Option<String>,
        /// Overrides --compression
        #[arg(value_name = "COMPRESSION")]
        stream_compression: Option<f64>,
    },
    /// Print a single quantile value
    Quantile {
        /// q in [0,1]
        #[arg(short, long)]
        p: f64,
    },
    /// Print "x<TAB>cdf(x)" at --probes (or at the training values if omitted)
    Cdf {
        /// Probe xs (space/comma/newline separated)
        #[arg(long)]
        probes: Option<String>,
    },
    /// Print the median
    Median,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TDIGEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn config(
    args: &Args,
    variant: Option<&str>,
    compression: Option<f64>,
) -> Result<DigestConfig, Box<dyn Error>> {
    let config = DigestConfig {
        compression: compression.unwrap_or(args.compression),
        variant: parse_variant_str(Some(variant.unwrap_or(&args.variant)))?,
        scale: args.scale.into(),
    };
    // Validate now so a bad compression fails before any input is read.
    config.build()?;
    Ok(config)
}

fn open_input(path: &str) -> Result<Box<dyn BufRead>, Box<dyn Error>> {
    if path == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = fs::File::open(path).map_err(|e| format!("cannot open {path}: {e}"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_text(path: Option<&Path>) -> Result<String, Box<dyn Error>> {
    match path {
        Some(p) => Ok(fs::read_to_string(p)
            .map_err(|e| format!("cannot read {}: {e}", p.display()))?),
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        }
    }
}

fn load_digest(path: &Path, format: DigestFormat) -> Result<TDigest, Box<dyn Error>> {
    let bytes = fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let td = format.decode(&bytes)?;
    info!(path = %path.display(), weight = td.total_weight(), "loaded digest");
    Ok(td)
}

fn save_digest(td: &mut TDigest, path: &Path, format: DigestFormat) -> Result<(), Box<dyn Error>> {
    let bytes = format.encode(td)?;
    fs::write(path, bytes).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    info!(path = %path.display(), format = format.as_str(), "saved digest");
    Ok(())
}

/// Start digest for the batch commands plus the values it was trained on.
fn train(args: &Args) -> Result<(TDigest, Vec<f64>), Box<dyn Error>> {
    let format = DigestFormat::from(args.digest_format);
    let mut td = match &args.from_digest {
        Some(path) => load_digest(path, format)?,
        None => config(args, None, None)?.build()?,
    };

    // A loaded digest only reads more data when --input says so.
    let xs = if args.from_digest.is_none() || args.input.is_some() {
        parse_values(&read_text(args.input.as_deref())?)?
    } else {
        Vec::new()
    };
    td.add_many(&xs)?;
    debug!(samples = xs.len(), centroids = td.centroid_count(), "trained");

    if let Some(path) = &args.to_digest {
        save_digest(&mut td, path, format)?;
    }
    Ok((td, xs))
}

fn stream(
    args: &Args,
    prob: f64,
    data_file: &str,
    variant: Option<&str>,
    compression: Option<f64>,
) -> Result<ExitCode, Box<dyn Error>> {
    let prob = parse_probability(prob)?;
    let mut td = config(args, variant, compression)?.build()?;
    let reader = open_input(data_file)?;

    let mut status = ExitCode::SUCCESS;
    for (i, line) in reader.lines().enumerate() {
        let added: Result<(), Box<dyn Error>> = match line {
            Err(e) => Err(format!("line {}: {e}", i + 1).into()),
            Ok(line) => match parse_value_line(i + 1, &line) {
                None => continue,
                Some(Ok(x)) => td.add(x).map_err(Into::into),
                Some(Err(e)) => Err(e.into()),
            },
        };
        if let Err(e) = added {
            eprintln!("error: {e}");
            status = ExitCode::FAILURE;
            break;
        }
        println!("{}", td.quantile(prob)?);
    }
    debug!(samples = td.total_weight(), "stream finished");

    match td.quantile(prob) {
        Ok(q) => eprintln!("Final {}-th percentile: {q}", prob * 100.0),
        Err(_) => eprintln!("Final {}-th percentile: no data", prob * 100.0),
    }
    if let Some(path) = &args.to_digest {
        save_digest(&mut td, path, args.digest_format.into())?;
    }
    Ok(status)
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn Error>> {
    match &args.cmd {
        Cmd::Stream {
            prob,
            data_file,
            stream_variant,
            stream_compression,
        } => stream(
            args,
            *prob,
            data_file,
            stream_variant.as_deref(),
            *stream_compression,
        ),
        Cmd::Quantile { p } => {
            let (mut td, _) = train(args)?;
            println!("{}", td.quantile(*p)?);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Median => {
            let (mut td, _) = train(args)?;
            println!("{}", td.median()?);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Cdf { probes } => {
            let (mut td, xs) = train(args)?;
            let probes = match probes {
                Some(p) => parse_values(p)?,
                None => xs,
            };
            let cdf = td.cdf_many(&probes)?;
            for (x, p) in probes.iter().zip(cdf.iter()) {
                println!("{x}\t{p}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
