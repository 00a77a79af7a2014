// Command-line front end.
//
// Fetches JVM-serialized blobs from a memcached server (or reads them from
// a file), decodes them, and prints either the Control Center session table
// or the JSON rendering of the decoded values.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde_json::json;

use crate::memcache::{ClientConfig, DEFAULT_PORT, MemcacheClient};
use crate::report::{self, DEFAULT_SESSION_PREFIX, DEFAULT_USERS_KEY, SessionRow};
use crate::stream::decoder::DEFAULT_MAX_DEPTH;
use crate::stream::{DecodeOptions, Stream, decode_stream_with};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_SERVER: &str = "lbvip02";

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Decode Java-serialized objects stored in memcached.
#[derive(Parser, Debug)]
#[command(
    name = "javaser",
    version,
    about = "Java serialization stream decoder and session inspector",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Memcached server to connect to.
    #[arg(short = 's', long, global = true, default_value = DEFAULT_SERVER)]
    server: String,

    /// Memcached port.
    #[arg(short = 'p', long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Connect/read/write timeout in seconds (0 disables).
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    /// Maximum nesting depth accepted by the decoder.
    #[arg(long = "max-depth", global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Verbose debugging output (use twice for tag-level tracing).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List logged-in Control Center users and their sessions.
    Sessions(SessionsArgs),
    /// Fetch one key and print its decoded values.
    Get(GetArgs),
    /// Decode a serialized stream from a file or stdin.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct SessionsArgs {
    /// Key of the logged-in user collection.
    #[arg(long = "users-key", default_value = DEFAULT_USERS_KEY)]
    users_key: String,

    /// Prefix of per-user session keys.
    #[arg(long = "session-prefix", default_value = DEFAULT_SESSION_PREFIX)]
    session_prefix: String,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Cache key to fetch.
    key: String,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Serialized stream file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Sessions,
    Get,
    Decode,
}

#[derive(Debug)]
struct Options {
    command: Command,
    server: String,
    port: u16,
    timeout: Option<Duration>,
    verbose: u8,
    json_output: bool,
    decode: DecodeOptions,
    users_key: String,
    session_prefix: String,
    key: Option<String>,
    input_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Decode,
        server: cli.server,
        port: cli.port,
        timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        decode: DecodeOptions {
            max_depth: cli.max_depth,
        },
        users_key: DEFAULT_USERS_KEY.to_string(),
        session_prefix: DEFAULT_SESSION_PREFIX.to_string(),
        key: None,
        input_file: None,
    };

    match cli.command {
        Cmd::Sessions(args) => {
            opts.command = Command::Sessions;
            opts.users_key = args.users_key;
            opts.session_prefix = args.session_prefix;
        }
        Cmd::Get(args) => {
            opts.command = Command::Get;
            opts.key = Some(args.key);
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.input_file = args.input;
        }
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("javaser".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn verbose_hint(opts: &Options) -> &'static str {
    if opts.verbose == 0 {
        " (try with -v to see the problem)"
    } else {
        ""
    }
}

fn connect(opts: &Options) -> Option<MemcacheClient<std::net::TcpStream>> {
    log::debug!("opening socket to {}:{}", opts.server, opts.port);
    let config = ClientConfig {
        timeout: opts.timeout,
        ..ClientConfig::default()
    };
    match MemcacheClient::connect((opts.server.as_str(), opts.port), config) {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!(
                "javaser: unable to connect to {}:{}: {e}",
                opts.server, opts.port
            );
            None
        }
    }
}

fn decode_payload(opts: &Options, data: &[u8]) -> Option<Stream> {
    log::debug!("parsing Java serialized data: {} bytes", data.len());
    match decode_stream_with(data, opts.decode) {
        Ok(stream) => Some(stream),
        Err(e) => {
            eprintln!(
                "javaser: unable to parse serialized data: {e}{}",
                verbose_hint(opts)
            );
            None
        }
    }
}

fn print_json(value: &serde_json::Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(e) => {
            eprintln!("javaser: JSON output error: {e}");
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions command
// ---------------------------------------------------------------------------

fn cmd_sessions(opts: &Options) -> i32 {
    let Some(mut client) = connect(opts) else {
        return 1;
    };

    let users_item = match client.get(&opts.users_key) {
        Ok(Some(item)) => item,
        Ok(None) => {
            println!("No control center users found");
            return 0;
        }
        Err(e) => {
            eprintln!("javaser: get {}: {e}", opts.users_key);
            return 1;
        }
    };
    let Some(users_stream) = decode_payload(opts, &users_item.data) else {
        return 1;
    };
    let users = match report::logged_in_users(&users_stream) {
        Ok(users) => users,
        Err(e) => {
            eprintln!("javaser: {e}{}", verbose_hint(opts));
            return 1;
        }
    };

    let mut rows: Vec<SessionRow> = Vec::new();
    for user in &users {
        log::debug!("querying memcache about user '{user}'");
        let key = format!("{}{user}", opts.session_prefix);
        let item = match client.get(&key) {
            Ok(Some(item)) => item,
            Ok(None) => {
                log::warn!("no session entry for user '{user}'");
                continue;
            }
            Err(e) => {
                eprintln!("javaser: get {key}: {e}");
                return 1;
            }
        };
        let Some(stream) = decode_payload(opts, &item.data) else {
            return 1;
        };
        match report::session_rows(user, &stream) {
            Ok(found) => rows.extend(found),
            Err(e) => {
                eprintln!("javaser: sessions of '{user}': {e}{}", verbose_hint(opts));
                return 1;
            }
        }
    }

    if opts.json_output {
        let sessions: Vec<_> = rows
            .iter()
            .map(|r| {
                json!({
                    "user": r.user,
                    "remote_ip": r.remote_ip,
                    "session_id": r.session_id,
                    "start_time_ms": r.start_time_ms,
                    "start_time": report::format_timestamp(r.start_time_ms),
                })
            })
            .collect();
        return print_json(&json!({ "users": users, "sessions": sessions }));
    }

    println!(
        "Found the following users logged on: {}",
        users.join(", ")
    );
    println!();
    print!("{}", report::render_table(&rows));
    0
}

// ---------------------------------------------------------------------------
// Get command
// ---------------------------------------------------------------------------

fn cmd_get(opts: &Options) -> i32 {
    let Some(key) = opts.key.as_deref() else {
        eprintln!("javaser: get: missing key");
        return 1;
    };
    let Some(mut client) = connect(opts) else {
        return 1;
    };
    let item = match client.get(key) {
        Ok(Some(item)) => item,
        Ok(None) => {
            eprintln!("javaser: key not found: {key}");
            return 1;
        }
        Err(e) => {
            eprintln!("javaser: get {key}: {e}");
            return 1;
        }
    };
    if opts.verbose > 0 {
        eprintln!(
            "javaser: {} bytes, flags {}",
            item.data.len(),
            item.flags
        );
    }
    match decode_payload(opts, &item.data) {
        Some(stream) => print_json(&stream.to_json_all()),
        None => 1,
    }
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let data = match &opts.input_file {
        Some(path) => match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("javaser: input file: {}: {e}", path.display());
                return 1;
            }
        },
        None => {
            let mut data = Vec::new();
            if let Err(e) = io::stdin().lock().read_to_end(&mut data) {
                eprintln!("javaser: read error: {e}");
                return 1;
            }
            data
        }
    };

    match decode_payload(opts, &data) {
        Some(stream) => {
            if opts.verbose > 0 {
                eprintln!(
                    "javaser: decoded {} values, {} handles",
                    stream.len(),
                    stream.handles().len()
                );
            }
            print_json(&stream.to_json_all())
        }
        None => 1,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match opts.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Sessions => cmd_sessions(&opts),
        Command::Get => cmd_get(&opts),
        Command::Decode => cmd_decode(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
