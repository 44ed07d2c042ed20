//! Dock daemon: owns the window and the controller, serves IPC
//!
//! Three producers feed one channel: an X11 reader thread, an IPC listener
//! (one thread per client), and the main loop's own timers. The main loop
//! blocks on the channel until the controller's next deadline, so the state
//! machine is only ever touched from one thread.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use crate::commands::CommandHandler;
use crate::config::Paths;
use crate::constants::{timing, window as geometry};
use crate::controller::{DockEvent, EdgeSnapController};
use crate::ipc::{DockConnection, DockRequest, DockResponse, DockServer};
use crate::persistence::{JsonFileStore, KeyValueStore};
use crate::types::WindowBounds;
use crate::window::DockWindow;
use crate::x11_utils::{EventFilter, WindowSignal, X11Window};

/// Everything the main loop reacts to
#[derive(Debug)]
pub enum DaemonEvent {
    Window(WindowSignal),
    /// IPC request plus the channel its reply goes back on
    Request(DockRequest, mpsc::Sender<DockResponse>),
    /// X11 connection died
    DisplayLost(String),
}

/// Options for `edge-dock run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Attach to this window instead of creating one
    pub window: Option<u32>,
    pub paths: Paths,
}

pub fn run_daemon(options: RunOptions) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(None)
        .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
    let conn = Arc::new(conn);
    let screen = &conn.setup().roots[screen_num];
    info!(
        screen = screen_num,
        width = screen.width_in_pixels,
        height = screen.height_in_pixels,
        "Connected to X11 server"
    );

    let window = match options.window {
        Some(xid) => X11Window::attach(Arc::clone(&conn), screen_num, xid)
            .context(format!("Failed to attach to window {}", xid))?,
        None => X11Window::create(
            Arc::clone(&conn),
            screen_num,
            WindowBounds::new(0, 0, geometry::DEFAULT_WIDTH, geometry::DEFAULT_HEIGHT),
        )?,
    };
    let filter = window.event_filter();

    let store = JsonFileStore::open(&options.paths.store);
    let mut controller = EdgeSnapController::new(window, store);
    controller.restore_session(Instant::now());

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context(format!("Failed to register handler for signal {}", signal))?;
    }

    let server = DockServer::bind_to(options.paths.socket.clone())?;
    let socket_path = server.path().to_path_buf();

    let (tx, rx) = mpsc::channel();
    let _x11_handle = spawn_x11_reader(Arc::clone(&conn), filter, tx.clone());
    let _ipc_handle = spawn_ipc_listener(server, tx);

    info!(socket = %socket_path.display(), "Dock daemon running");
    run_loop(&mut controller, &rx, &shutdown);

    controller.dispose();
    remove_socket(&socket_path);
    info!("Dock daemon stopped");
    Ok(())
}

/// Drive the controller until shutdown, window close, or all producers hang up
pub fn run_loop<W: DockWindow, S: KeyValueStore>(
    controller: &mut EdgeSnapController<W, S>,
    rx: &mpsc::Receiver<DaemonEvent>,
    shutdown: &AtomicBool,
) {
    let mut commands = CommandHandler::new();
    let max_wait = Duration::from_millis(timing::SHUTDOWN_POLL_MS);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown signal received");
            break;
        }

        let wait = controller
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map_or(max_wait, |d| d.min(max_wait));

        match rx.recv_timeout(wait) {
            Ok(event) => {
                if handle_event(controller, &mut commands, event) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("All event sources disconnected");
                break;
            }
        }

        controller.tick(Instant::now());

        if controller.window().is_none() {
            info!("Window gone, stopping");
            break;
        }
    }
}

/// Returns true when the loop should stop
fn handle_event<W: DockWindow, S: KeyValueStore>(
    controller: &mut EdgeSnapController<W, S>,
    commands: &mut CommandHandler,
    event: DaemonEvent,
) -> bool {
    let now = Instant::now();
    match event {
        DaemonEvent::Window(WindowSignal::Configured) => {
            if let Some(bounds) = controller.bounds() {
                controller.transition(DockEvent::GeometryChanged(bounds), now);
            }
            false
        }
        DaemonEvent::Window(WindowSignal::Activity) => {
            commands.handle(controller, DockRequest::ReportUserActivity, now);
            false
        }
        DaemonEvent::Window(WindowSignal::Closed) => {
            info!("Window closed by user or window manager");
            controller.transition(DockEvent::WindowClosed, now);
            true
        }
        DaemonEvent::Request(request, reply_tx) => {
            debug!(request = ?request, "IPC request");
            let reply = commands.handle(controller, request, now);
            if reply_tx.send(reply.response).is_err() {
                debug!("IPC client went away before the reply");
            }
            reply.stop
        }
        DaemonEvent::DisplayLost(reason) => {
            error!(reason = %reason, "Lost X11 connection");
            controller.dispose();
            true
        }
    }
}

fn spawn_x11_reader(
    conn: Arc<RustConnection>,
    filter: EventFilter,
    tx: mpsc::Sender<DaemonEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        match conn.wait_for_event() {
            Ok(event) => {
                let Some(signal) = filter.classify(&event) else { continue };
                if tx.send(DaemonEvent::Window(signal)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(DaemonEvent::DisplayLost(e.to_string()));
                break;
            }
        }
    })
}

fn spawn_ipc_listener(server: DockServer, tx: mpsc::Sender<DaemonEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        info!(socket = ?server.path(), "IPC listener started");
        loop {
            let connection = match server.accept() {
                Ok(connection) => connection,
                Err(e) => {
                    error!(error = ?e, "IPC listener stopped");
                    break;
                }
            };
            let tx = tx.clone();
            std::thread::spawn(move || {
                if let Err(e) = serve_client(connection, &tx) {
                    debug!(error = ?e, "IPC client disconnected");
                }
            });
        }
    })
}

/// Forward one client's requests to the main loop until it disconnects
fn serve_client(mut connection: DockConnection, tx: &mpsc::Sender<DaemonEvent>) -> Result<()> {
    debug!("IPC client connected");
    loop {
        let request = connection.recv_request()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(DaemonEvent::Request(request, reply_tx))
            .context("Daemon main loop is gone")?;
        let response = reply_rx.recv()
            .context("Daemon dropped the request without replying")?;
        connection.send_response(&response)?;
    }
}

fn remove_socket(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "Socket already removed");
    }
}
