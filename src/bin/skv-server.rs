//! this binary starts the skv server
//! to see the list of options, type: `skv-server --help`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;

use clap::{crate_version, App, Arg};
use skv::{KvServer, Result, SkvError};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";
const DEFAULT_STORE_DIR: &str = ".store";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    dir: PathBuf,
}

impl Opt {
    /// validates the `addr` and `dir` parameters
    /// # Errors
    /// returns [`SkvError::Parsing`] if the address is invalid
    fn build(addr: &str, dir: &str) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            SkvError::Parsing(format!(
                "could not parse {} into an IP address and port",
                addr
            ))
        })?;
        Ok(Opt {
            addr,
            dir: PathBuf::from(dir),
        })
    }
}

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    let matches = App::new("skv-server")
        .version(crate_version!())
        .about("a networked key-value store server")
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help("sets the IP_ADDR:PORT that the server listens on")
                .default_value(DEFAULT_ADDRESS),
        )
        .arg(
            Arg::with_name("dir")
                .long("dir")
                .value_name("PATH")
                .help("sets the directory the store persists its keys under")
                .default_value(DEFAULT_STORE_DIR),
        )
        .get_matches();

    let addr = matches.value_of("addr").unwrap();
    let dir = matches.value_of("dir").unwrap();
    let opt = match Opt::build(addr, dir) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    if let Err(e) = run(opt) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("skv-server {}", env!("CARGO_PKG_VERSION"));
    info!("store directory: {:?}", opt.dir);

    let handle = KvServer::open(&opt.dir)?.bind(opt.addr)?;
    // runs until a shutdown message terminates the accept loop
    handle.wait()
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
