//! The connection listener.
//!
//! A [`Listener`] owns one accept thread. Every accepted connection gets its
//! own worker thread which reads exactly one request, asks the
//! [`RequestHandler`] for a response (or the [`ErrorHandler`] if anything
//! failed on the way), writes it and closes the connection.

use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::{HttpError, Request, Response};

/// How long `stop` waits for the wake-up connection to the accept loop.
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default read and write timeout on accepted connections.
const IO_TIMEOUT: Duration = Duration::from_secs(5);


/// Turns a parsed request into a response.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> Result<Response, HttpError>;
}

impl<F> RequestHandler for F
    where F: Fn(Request) -> Result<Response, HttpError> + Send + Sync + 'static {
    fn handle(&self, request: Request) -> Result<Response, HttpError> {
        self(request)
    }
}

/// Turns whatever went wrong into the response the client gets.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, error: HttpError) -> Response;
}

impl<F> ErrorHandler for F
    where F: Fn(HttpError) -> Response + Send + Sync + 'static {
    fn handle(&self, error: HttpError) -> Response {
        self(error)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Starting,
    Started,
    Stopping,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("Unable to listen on http port {0}")]
    HttpListenError(u16, #[source] io::Error),
    #[error("Unable to start accept thread")]
    SpawnError(#[source] io::Error),
    #[error("Listener is still {0:?}")]
    NotStopped(State),
}


pub struct Listener {
    handler: Arc<dyn RequestHandler>,
    errors: Arc<dyn ErrorHandler>,
    io_timeout: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: State,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    accept_thread: thread::JoinHandle<()>,
}

impl Listener {
    pub fn new<H, E>(handler: H, errors: E) -> Self
        where H: RequestHandler, E: ErrorHandler {
        Listener {
            handler: Arc::new(handler),
            errors: Arc::new(errors),
            io_timeout: IO_TIMEOUT,
            inner: Mutex::new(Inner { state: State::Stopped, running: None }),
        }
    }

    /// How long a connection may sit idle while reading the request or
    /// writing the response.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    /// The address the listening socket is bound to while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().running.as_ref().map(|running| running.local_addr)
    }

    /// Binds to `port` on all interfaces and starts accepting.
    ///
    /// Does nothing unless the listener is stopped. Port 0 picks a free
    /// port; see [`local_addr`](Self::local_addr).
    pub fn start(&self, port: u16) -> Result<(), BindError> {
        let mut inner = self.lock();
        if inner.state != State::Stopped {
            log::debug!("Ignoring start on port {}: listener is {:?}", port, inner.state);
            return Ok(());
        }
        inner.state = State::Starting;

        match self.bind(port) {
            Ok(running) => {
                log::info!("Listening on {}", running.local_addr);
                inner.running = Some(running);
                inner.state = State::Started;
                Ok(())
            }
            Err(err) => {
                inner.state = State::Stopped;
                Err(err)
            }
        }
    }

    fn bind(&self, port: u16) -> Result<Running, BindError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|err| BindError::HttpListenError(port, err))?;
        let local_addr = listener.local_addr()
            .map_err(|err| BindError::HttpListenError(port, err))?;

        let stop = Arc::new(AtomicBool::new(false));
        let accept_thread = {
            let stop = stop.clone();
            let handler = self.handler.clone();
            let errors = self.errors.clone();
            let io_timeout = self.io_timeout;
            thread::Builder::new()
                .name(format!("http-accept-{}", local_addr.port()))
                .spawn(move || accept_loop(listener, &stop, io_timeout, handler, errors))
                .map_err(BindError::SpawnError)?
        };

        Ok(Running { local_addr, stop, accept_thread })
    }

    /// Closes the listening socket.
    ///
    /// Does nothing unless the listener is started, or stuck stopping.
    /// Connections that are already being served run to completion.
    ///
    /// If the accept loop can't be woken the socket stays bound and the
    /// listener stays `Stopping`; calling `stop` again retries.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != State::Started && inner.state != State::Stopping {
            log::debug!("Ignoring stop: listener is {:?}", inner.state);
            return;
        }
        inner.state = State::Stopping;

        if let Some(running) = inner.running.take() {
            running.stop.store(true, Ordering::SeqCst);

            // accept() only returns for a connection, so hand it one.
            let wake = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), running.local_addr.port());
            if let Err(err) = TcpStream::connect_timeout(&wake, WAKE_TIMEOUT) {
                // A client may have woken the loop already.
                if !running.accept_thread.is_finished() {
                    log::error!("Unable to wake accept loop on {}: {}", running.local_addr, err);
                    inner.running = Some(running);
                    return;
                }
            }
            if running.accept_thread.join().is_err() {
                log::error!("Accept thread for {} panicked", running.local_addr);
            }
            log::info!("Stopped listening on {}", running.local_addr);
        }

        inner.state = State::Stopped;
    }

    pub fn restart(&self, port: u16) -> Result<(), BindError> {
        self.stop();
        match self.state() {
            State::Stopped => self.start(port),
            state => Err(BindError::NotStopped(state)),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}


fn accept_loop(
    listener: TcpListener,
    stop: &AtomicBool,
    io_timeout: Duration,
    handler: Arc<dyn RequestHandler>,
    errors: Arc<dyn ErrorHandler>,
) {
    for stream in listener.incoming() {
        // The connection that woke us may be a real client, so it is still
        // served before the loop ends.
        let stopping = stop.load(Ordering::SeqCst);

        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("Error accepting connection: {}", err);
                if stopping {
                    break;
                }
                continue;
            }
        };

        let handler = handler.clone();
        let errors = errors.clone();
        let spawned = thread::Builder::new()
            .name("http-conn".into())
            .spawn(move || serve_connection(stream, io_timeout, &*handler, &*errors));
        if let Err(err) = spawned {
            log::error!("Unable to spawn connection worker: {}", err);
        }

        if stopping {
            break;
        }
    }
    log::debug!("Accept loop finished");
}

/// Serves exactly one request on `stream`, then closes it.
fn serve_connection(stream: TcpStream, io_timeout: Duration, handler: &dyn RequestHandler, errors: &dyn ErrorHandler) {
    let peer = stream.peer_addr().ok();
    let timeouts = stream.set_read_timeout(Some(io_timeout))
        .and_then(|_| stream.set_write_timeout(Some(io_timeout)));
    if let Err(err) = timeouts {
        log::error!("Unable to set timeouts on connection from {:?}: {}", peer, err);
        return;
    }
    let local = stream.local_addr().ok();
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::error!("Unable to clone stream objects for response: {:?}", e);
            return;
        }
    };

    let mut reader = BufReader::new(stream);
    let (summary, response) = match Request::parse(&mut reader) {
        Ok(None) => {
            log::trace!("Connection from {:?} closed without a request", peer);
            return;
        }
        Ok(Some(request)) => {
            let request = match peer {
                Some(peer) => request.with_peer(peer),
                None => request,
            };
            let request = match local {
                Some(local) => request.with_local(local),
                None => request,
            };
            let summary = format!("{} /{}", request.method().as_str(), request.path());
            log::debug!("Handling request: {} from {:?}", summary, peer);
            let response = handler.handle(request).unwrap_or_else(|err| errors.handle(err));
            (summary, response)
        }
        Err(HttpError::StreamError(err)) if is_timeout(&err) => {
            log::debug!("Connection from {:?} timed out before sending a full request", peer);
            return;
        }
        Err(err) => ("<unparsed>".to_string(), errors.handle(err)),
    };

    log::info!("{:?} \"{}\" {}", peer, summary, response.status().code());

    let mut writer = BufWriter::new(write_half);
    if let Err(err) = response.write_to(&mut writer) {
        log::warn!("Error writing response to {:?}: {}", peer, err);
    }
    if let Ok(stream) = writer.into_inner() {
        let _ = stream.shutdown(Shutdown::Both);
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
