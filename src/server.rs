use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, error, info};

use crate::dispatcher::{Dispatcher, Disposition, Reply};
use crate::error::{Result, SkvError};
use crate::message::Message;
use crate::store::Store;

/// A TCP server over one [`Dispatcher`].
///
/// The transport is one message per connection: the client writes the
/// encoded message and half-closes, the server reads to EOF, dispatches,
/// and replies with a status line `SKV/1 <code>\r\n` followed by the body.
///
/// All dispatching runs under one mutex, so store mutations are serialized
/// and each insert/delete read-modify-write is atomic with respect to the
/// previous value it returns.
pub struct KvServer {
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl KvServer {
    /// opens the store rooted at `store_dir` and wraps it in a server
    pub fn open(store_dir: &Path) -> Result<KvServer> {
        let store = Store::open(store_dir)?;
        Ok(KvServer {
            dispatcher: Arc::new(Mutex::new(Dispatcher::new(store))),
        })
    }

    /// Binds `addr` (port 0 picks an ephemeral port), spawns the accept
    /// loop on a background thread and returns immediately.
    ///
    /// The returned [`ServerHandle`] is the only way to observe the bound
    /// address and to stop the loop.
    pub fn bind(self, addr: SocketAddr) -> Result<ServerHandle> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let dispatcher = self.dispatcher;
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("skv-accept".to_owned())
            .spawn(move || accept_loop(listener, dispatcher, flag))?;

        Ok(ServerHandle {
            addr: local_addr,
            shutdown,
            handle,
        })
    }
}

/// Handle to a running server's accept loop.
///
/// Dropping the handle leaks the loop; call [`ServerHandle::stop`] or
/// [`ServerHandle::wait`] to join it.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl ServerHandle {
    /// the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the accept loop and joins it, draining in-flight requests.
    ///
    /// Safe to call after a `Shutdown` message has already terminated the
    /// loop.
    pub fn stop(self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        // nudge the blocked accept so the loop observes the flag
        let _ = TcpStream::connect(self.addr);
        self.join()
    }

    /// Joins the accept loop without initiating a stop; returns once a
    /// `Shutdown` message (or a prior `stop`) has terminated it.
    pub fn wait(self) -> Result<()> {
        self.join()
    }

    fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| SkvError::Server("accept loop panicked".to_owned()))
    }
}

/// Accepts connections until the shutdown flag is set, serving each one on
/// a scoped thread. The scope joins every in-flight connection before the
/// loop returns, so stopping never drops a half-handled request.
fn accept_loop(listener: TcpListener, dispatcher: Arc<Mutex<Dispatcher>>, shutdown: Arc<AtomicBool>) {
    let scope = crossbeam::scope(|scope| {
        for stream in listener.incoming() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    let shutdown = Arc::clone(&shutdown);
                    scope.spawn(move |_| {
                        if let Err(e) = serve(&dispatcher, &shutdown, stream) {
                            error!("error serving connection: {}", e);
                        }
                    });
                }
                Err(e) => error!("connection failed: {}", e),
            }
        }
    });
    if scope.is_err() {
        error!("a connection worker panicked");
    }
    info!("accept loop stopped");
}

/// Reads one request off `stream`, dispatches it, and writes the reply.
fn serve(dispatcher: &Mutex<Dispatcher>, shutdown: &AtomicBool, stream: TcpStream) -> Result<()> {
    let peer_addr = stream.peer_addr()?;
    let mut request = Vec::new();
    BufReader::new(&stream).read_to_end(&mut request)?;

    let (reply, disposition) = match Message::decode(&request) {
        Ok(message) => {
            debug!("request from {}: {:?}", peer_addr, message);
            let mut dispatcher = dispatcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            dispatcher.dispatch(message)
        }
        Err(e) => {
            debug!("undecodable request from {}: {}", peer_addr, e);
            (Reply::bad_request(), Disposition::Continue)
        }
    };

    let mut writer = BufWriter::new(&stream);
    write!(writer, "SKV/1 {}\r\n", reply.status.code())?;
    writer.write_all(reply.body.as_bytes())?;
    writer.flush()?;
    drop(writer);
    debug!("reply sent to {}: {:?}", peer_addr, reply.status);

    if disposition == Disposition::Shutdown {
        shutdown.store(true, Ordering::SeqCst);
        // wake the accept loop; the server side of this connection is the
        // listener's address
        let _ = TcpStream::connect(stream.local_addr()?);
    }
    Ok(())
}
