//! Server network layer: TCP accept loop, per-connection framing and the tick loop.

use crate::admin::ServerControls;
use crate::error::Result;
use crate::simulation::Simulation;
use log::{debug, error, info, warn};
use shared::{
    read_frame, write_frame, ClientCommand, Credentials, FrameError, ProtocolError, Reply,
    UpdateRequest, IP_BLOCKED_MSG,
};
use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};

const LINGER: Duration = Duration::from_millis(100);

/// Runtime knobs of the network layer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub tick_duration: Duration,
    /// How long a connection may take to send its request and wait for the reply.
    pub request_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: format!("127.0.0.1:{}", shared::DEFAULT_PORT),
            tick_duration: Duration::from_millis(16),
            request_timeout: Duration::from_secs(5),
            queue_capacity: 1024,
        }
    }
}

/// A parsed request waiting for the tick loop, with the channel its reply goes back on.
#[derive(Debug)]
pub struct PendingRequest {
    pub command: ClientCommand,
    pub ip: IpAddr,
    pub reply: oneshot::Sender<Reply>,
}

/// Owns the simulation and serves it over TCP.
pub struct Server {
    listener: TcpListener,
    sim: Simulation,
    controls: ServerControls,
    config: ServerConfig,
    request_tx: mpsc::Sender<PendingRequest>,
    request_rx: mpsc::Receiver<PendingRequest>,
    /// Requests from users already served this tick, oldest first.
    held: VecDeque<PendingRequest>,
    blocked_tx: watch::Sender<HashSet<IpAddr>>,
}

impl Server {
    pub async fn bind(config: ServerConfig, sim: Simulation, controls: ServerControls) -> Result<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (request_tx, request_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (blocked_tx, _) = watch::channel(controls.blocked_ips.clone());

        Ok(Server {
            listener,
            sim,
            controls,
            config,
            request_tx,
            request_rx,
            held: VecDeque::new(),
            blocked_tx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Runs until an administrator QUIT or Ctrl-C, then saves the simulation.
    pub async fn run(mut self) -> Result<Simulation> {
        let listener = self.listener;
        spawn_acceptor(
            listener,
            self.request_tx.clone(),
            self.blocked_tx.subscribe(),
            self.config.request_timeout,
        );

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());

        info!("Simulation {:?} running", self.sim.name());

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let frame_dt = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;

                    let batch = drain_batch(
                        &mut self.request_rx,
                        &mut self.held,
                        self.sim.session_count().max(1),
                    );
                    process_batch(&mut self.sim, &mut self.controls, batch, frame_dt);

                    if *self.blocked_tx.borrow() != self.controls.blocked_ips {
                        self.blocked_tx.send_replace(self.controls.blocked_ips.clone());
                    }

                    if self.sim.tick_count() % 60 == 0 {
                        debug!(
                            "Tick {}: {} sessions, {:.1} fps, {} requests pending",
                            self.sim.tick_count(),
                            self.sim.session_count(),
                            self.sim.fps(),
                            self.request_tx.max_capacity() - self.request_tx.capacity() + self.held.len()
                        );
                    }

                    if self.controls.quit_requested {
                        info!("Quit requested by administrator");
                        break;
                    }
                }
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Received Ctrl-C, shutting down");
                    break;
                }
            }
        }

        save(&self.sim, &self.controls);
        Ok(self.sim)
    }
}

fn save(sim: &Simulation, controls: &ServerControls) {
    if !sim.settings().save_sims {
        return;
    }
    if let Some(resources) = &controls.resources {
        if resources.save_simulation(sim).is_err() {
            debug!("Simulation {:?} left unsaved", sim.name());
        }
    }
}

/// Takes up to `limit` requests for one tick, at most one per username.
///
/// Held requests go first. A request from a user already in the batch is held for a later
/// tick; no more than `limit` requests are held over.
fn drain_batch(
    rx: &mut mpsc::Receiver<PendingRequest>,
    held: &mut VecDeque<PendingRequest>,
    limit: usize,
) -> Vec<PendingRequest> {
    let mut batch = Vec::new();
    let mut users = HashSet::new();
    let mut deferred = VecDeque::new();
    while batch.len() < limit {
        let request = match held.pop_front() {
            Some(request) => request,
            None if deferred.len() < limit => match rx.try_recv() {
                Ok(request) => request,
                Err(_) => break,
            },
            None => break,
        };
        if users.insert(request.command.credentials().username().to_string()) {
            batch.push(request);
        } else {
            deferred.push_back(request);
        }
    }
    deferred.extend(held.drain(..));
    *held = deferred;
    batch
}

/// Answers JOINs directly and feeds every UPDATE of the batch into one simulation tick.
pub fn process_batch(
    sim: &mut Simulation,
    controls: &mut ServerControls,
    batch: Vec<PendingRequest>,
    frame_dt: f64,
) {
    let mut updates: Vec<UpdateRequest> = Vec::new();
    let mut reply_to = Vec::new();

    for request in batch {
        if controls.is_blocked(&request.ip) {
            warn!("Dropping request from blocked address {}", request.ip);
            let _ = request.reply.send(Reply::error(IP_BLOCKED_MSG));
            continue;
        }
        match request.command {
            ClientCommand::Join(join) => {
                let reply = join_reply(sim, &join.auth, request.ip);
                let _ = request.reply.send(reply);
            }
            ClientCommand::Update(update) => {
                updates.push(update);
                reply_to.push(request.reply);
            }
        }
    }

    let replies = sim.update(&updates, frame_dt, controls);
    for (reply, tx) in replies.into_iter().zip(reply_to) {
        // the connection may have timed out already
        let _ = tx.send(reply);
    }
}

fn join_reply(sim: &mut Simulation, auth: &Credentials, ip: IpAddr) -> Reply {
    match sim.join(auth, ip) {
        Ok(view) => Reply::ok(&view).unwrap_or_else(|e| Reply::error(e.to_string())),
        Err(e) => Reply::error(e.to_string()),
    }
}

/// Spawns the task accepting connections, one handler task per connection.
fn spawn_acceptor(
    listener: TcpListener,
    request_tx: mpsc::Sender<PendingRequest>,
    blocked_rx: watch::Receiver<HashSet<IpAddr>>,
    request_timeout: Duration,
) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let request_tx = request_tx.clone();
                    let blocked_rx = blocked_rx.clone();
                    tokio::spawn(async move {
                        let handled = tokio::time::timeout(
                            request_timeout,
                            handle_connection(stream, addr, request_tx, blocked_rx),
                        )
                        .await;
                        if handled.is_err() {
                            warn!("Connection from {} timed out", addr);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    });
}

/// Reads one request, waits for the tick loop to answer it and writes the reply.
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    request_tx: mpsc::Sender<PendingRequest>,
    blocked_rx: watch::Receiver<HashSet<IpAddr>>,
) {
    let frame = read_frame(&mut stream).await;
    let blocked = blocked_rx.borrow().contains(&addr.ip());
    let reply = match frame {
        Ok(_) if blocked => {
            warn!("Rejected request from blocked address {}", addr);
            Reply::error(IP_BLOCKED_MSG)
        }
        Ok(body) => match ClientCommand::parse(&body) {
            Ok(command) => match forward(command, addr.ip(), &request_tx).await {
                Some(reply) => reply,
                None => return,
            },
            Err(e) => {
                warn!("Protocol error from {}: {}", addr, e);
                Reply::error(e.to_string())
            }
        },
        Err(FrameError::BadLength(prefix)) if prefix.starts_with('G') => {
            warn!("HTTP request from {}", addr);
            Reply::error(ProtocolError::HttpRequest.to_string())
        }
        Err(FrameError::Io(e)) => {
            error!("I/O error reading from {}: {}", addr, e);
            return;
        }
        Err(e) => {
            warn!("Bad frame from {}: {}", addr, e);
            Reply::error(e.to_string())
        }
    };

    let body = match serde_json::to_string(&reply) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to encode reply for {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = write_frame(&mut stream, &body).await {
        error!("Failed to send reply to {}: {}", addr, e);
        return;
    }
    close_gracefully(stream).await;
}

/// Half-closes the stream and discards whatever the peer still sends before dropping it.
async fn close_gracefully(mut stream: TcpStream) {
    if stream.shutdown().await.is_err() {
        return;
    }
    let mut sink = [0u8; 1024];
    let deadline = Instant::now() + LINGER;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, stream.read(&mut sink)).await {
            Ok(Ok(n)) if n > 0 => continue,
            _ => break,
        }
    }
}

async fn forward(
    command: ClientCommand,
    ip: IpAddr,
    request_tx: &mpsc::Sender<PendingRequest>,
) -> Option<Reply> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let pending = PendingRequest {
        command,
        ip,
        reply: reply_tx,
    };
    if request_tx.send(pending).await.is_err() {
        error!("Tick loop is gone, dropping request from {}", ip);
        return None;
    }
    reply_rx.await.ok()
}
