//! The skv-client executable issues one request to a running skv-server:
//!
//! `skv-client insert <KEY> <VALUE> [--addr IP:PORT] [--prefix PREFIX]`
//!
//!     Store VALUE under KEY. VALUE is parsed as JSON (null, booleans,
//!     integers, strings, objects); anything that is not valid JSON is
//!     stored as plain text.
//!
//! `skv-client get <KEY>` / `skv-client delete <KEY>`
//!
//!     Look up or remove KEY.
//!
//! `skv-client select <PATTERN>`
//!
//!     List entries whose key starts with a match for the regular
//!     expression PATTERN.
//!
//! `--prefix` selects the tenant namespace; the empty prefix and `admin`
//! are the unprefixed superuser view.

use std::net::SocketAddr;
use std::process::exit;

use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use skv::{Client, Message, Result, SkvError, Status, Value};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    prefix: String,
    message: Message,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and port
    /// # Errors
    /// returns [`SkvError::Parsing`] if the address is invalid
    fn build(addr: &str, prefix: &str, message: Message) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            SkvError::Parsing(format!(
                "could not parse {} into an IP address and port",
                addr
            ))
        })?;
        Ok(Opt {
            addr,
            prefix: prefix.to_owned(),
            message,
        })
    }
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("skv-client")
        .version(crate_version!())
        .about("issues one request to a running skv-server")
        .subcommands(vec![
            SubCommand::with_name("insert")
                .about("store a value under a key")
                .arg(Arg::with_name("KEY").required(true).index(1))
                .arg(Arg::with_name("VALUE").required(true).index(2)),
            SubCommand::with_name("get")
                .about("look up the value stored under a key")
                .arg(Arg::with_name("KEY").required(true).index(1)),
            SubCommand::with_name("delete")
                .about("remove a key and its value")
                .arg(Arg::with_name("KEY").required(true).index(1)),
            SubCommand::with_name("select")
                .about("list entries whose key starts with a match for a pattern")
                .arg(Arg::with_name("PATTERN").required(true).index(1)),
        ])
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help("sets the IP_ADDR:PORT of the server to connect to")
                .default_value(DEFAULT_ADDRESS),
        )
        .arg(
            Arg::with_name("prefix")
                .long("prefix")
                .value_name("PREFIX")
                .help("the tenant prefix applied to every key-bearing field")
                .default_value(""),
        )
        .get_matches();

    match parse_options(matches).and_then(run) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    }
}

/// issues the request and prints the reply body; the exit code reflects
/// the reply status
fn run(opt: Opt) -> Result<i32> {
    let client = Client::new(opt.addr, &opt.prefix);
    let reply = client.request(&opt.message)?;
    println!("{}", reply.body);
    Ok(match reply.status {
        Status::Ok | Status::NotFound => 0,
        _ => 1,
    })
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap();
    let prefix = matches.value_of("prefix").unwrap();
    match matches.subcommand() {
        ("insert", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            let value = parse_value(args.value_of("VALUE").unwrap());
            Opt::build(addr, prefix, Message::Insert { key, value })
        }
        ("get", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            Opt::build(addr, prefix, Message::Get { key })
        }
        ("delete", Some(args)) => {
            let key = args.value_of("KEY").map(String::from).unwrap();
            Opt::build(addr, prefix, Message::Delete { key })
        }
        ("select", Some(args)) => {
            let pattern = args.value_of("PATTERN").map(String::from).unwrap();
            Opt::build(addr, prefix, Message::Select { pattern })
        }
        _ => Err(SkvError::Parsing(
            "expected one of: insert, get, delete, select".to_owned(),
        )),
    }
}

/// parses a command line value as JSON, falling back to plain text
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Text(raw.to_owned()))
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
