//! `serial-probe`: list serial devices and run quick exchanges against one.

use clap::{Parser, Subcommand};
use serial_session::config::{ConfigLoader, LogFormat, LoggingConfig};
use serial_session::{Config, OpenOptions, PortSession};
use std::error::Error;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-probe",
    version,
    about = "List serial devices and exercise them with echo and loopback exchanges."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the serial devices currently visible.
    List {
        /// Emit JSON instead of one line per device.
        #[arg(long)]
        json: bool,
    },

    /// Write bytes and print the reply.
    Echo {
        #[command(flatten)]
        port: PortArgs,

        /// Bytes to send, as hex (e.g. "00 17 FE FF" or "0017fefF").
        #[arg(long, default_value = "00 17 FE FF")]
        hex: String,

        /// Number of reply bytes to wait for; defaults to the number sent.
        #[arg(long)]
        expect: Option<usize>,
    },

    /// Write a pseudo-random block and check it comes back unchanged.
    ///
    /// Needs TX wired to RX, or a device that echoes what it receives.
    Loopback {
        #[command(flatten)]
        port: PortArgs,

        /// Number of bytes to send.
        #[arg(long, default_value_t = 100)]
        count: usize,
    },
}

#[derive(clap::Args, Debug)]
struct PortArgs {
    /// Device name or a configured alias; falls back to the testing port.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate; falls back to the configured default.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Give up waiting for the reply after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Wait this long after opening before the first write, for boards that
    /// reset when the port opens.
    #[arg(long)]
    settle_ms: Option<u64>,
}

fn main() {
    let args = Args::parse();
    let config = match ConfigLoader::load() {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            eprintln!("warning: {e}; using built-in defaults");
            ConfigLoader::with_defaults().into_config()
        }
    };
    init_logging(&config.logging);

    if let Err(e) = run(args, &config) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialised: {e}");
    }
}

fn run(args: Args, config: &Config) -> CliResult<()> {
    match args.command {
        Command::List { json } => list(json),
        Command::Echo { port, hex, expect } => {
            let data = parse_hex(&hex)?;
            let expect = expect.unwrap_or(data.len());
            let session = open_session(&port, config)?;
            let result = echo(&session, &data, expect, timeout(&port, config));
            session.close()?;
            result
        }
        Command::Loopback { port, count } => {
            if count == 0 {
                return Err("--count must be at least 1".into());
            }
            let session = open_session(&port, config)?;
            let result = loopback(&session, count, timeout(&port, config));
            session.close()?;
            result
        }
    }
}

fn list(json: bool) -> CliResult<()> {
    let ports = serial_session::list();
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in &ports {
        match port.description() {
            Some(description) => println!("{}\t{}", port.name, description),
            None => println!("{}", port.name),
        }
    }
    Ok(())
}

fn open_session(args: &PortArgs, config: &Config) -> CliResult<PortSession> {
    let name = args
        .port
        .clone()
        .or_else(|| config.testing.port.clone())
        .ok_or("no port given; pass --port or set SERIAL_PORT")?;

    let mut options: OpenOptions = config.serial.open_options(&name);
    if let Some(baud) = args.baud {
        options = options.baud_rate(baud);
    }

    let session = serial_session::open(options)?;
    let settle = args
        .settle_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.testing.settle());
    if !settle.is_zero() {
        debug!(settle_ms = settle.as_millis() as u64, "waiting for device to settle");
        std::thread::sleep(settle);
    }
    Ok(session)
}

fn timeout(args: &PortArgs, config: &Config) -> Duration {
    args.timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.testing.timeout())
}

fn echo(session: &PortSession, data: &[u8], expect: usize, timeout: Duration) -> CliResult<()> {
    session.write_all(data)?;
    let mut reply = vec![0u8; expect];
    let n = session.read_exact_with_timeout(&mut reply, timeout)?;

    println!("sent:     {}", format_hex(data));
    println!("received: {}", format_hex(&reply[..n]));
    if n < expect {
        return Err(format!("timed out after {n} of {expect} bytes").into());
    }
    Ok(())
}

fn loopback(session: &PortSession, count: usize, timeout: Duration) -> CliResult<()> {
    let data = pattern(count, seed());
    let start = Instant::now();

    // Write and read in step so a device without flow control is never more
    // than one chunk behind.
    let mut received = vec![0u8; count];
    let mut got = 0;
    for chunk in data.chunks(64) {
        session.write_all(chunk)?;
        let end = got + chunk.len();
        let n = session.read_exact_with_timeout(&mut received[got..end], timeout)?;
        got += n;
        if n < chunk.len() {
            break;
        }
    }

    info!(
        bytes = got,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loopback finished"
    );
    if got < count {
        return Err(format!("timed out after {got} of {count} bytes").into());
    }
    if let Some(offset) = data.iter().zip(&received).position(|(a, b)| a != b) {
        warn!(offset, "loopback mismatch");
        return Err(format!(
            "mismatch at byte {offset}: sent {:02X}, received {:02X}",
            data[offset], received[offset]
        )
        .into());
    }
    println!("loopback ok: {count} bytes");
    Ok(())
}

/// Parse hex digits, ignoring whitespace, commas and `0x` prefixes.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if digits.is_empty() {
        return Err("no bytes given".into());
    }
    if !digits.is_ascii() {
        return Err(format!("invalid hex in {input:?}").into());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {input:?}").into());
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| Box::<dyn Error>::from(format!("invalid hex byte {:?}", &digits[i..i + 2])))
        })
        .collect()
}

fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15)
}

/// xorshift64 byte stream; any nonzero seed gives a full-period sequence.
fn pattern(count: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
