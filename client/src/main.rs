use clap::Parser;
use client::input::{parse_point, parse_sheet, InputManager};
use client::network::ServerConnection;
use log::{info, warn};
use shared::{ClientView, Credentials, Vector2};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:30300")]
    server: String,

    #[arg(short = 'u', long)]
    username: String,

    #[arg(short = 'p', long)]
    password: String,

    /// Simulation password, if the simulation has one
    #[arg(long)]
    sim_password: Option<String>,

    /// Milliseconds between updates
    #[arg(short = 'i', long, default_value = "100")]
    interval_ms: u64,

    /// Seconds to wait for each reply
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    /// Rudder angle relative to straight, in [-90, 90]
    #[arg(long, allow_hyphen_values = true)]
    rudder: Option<f64>,

    /// Sheeting angle for one sail, as NAME=ANGLE (repeatable)
    #[arg(long, value_parser = parse_sheet)]
    sheet: Vec<(String, f64)>,

    /// Enable the autopilot toward X,Y
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    autopilot_target: Option<Vector2>,

    /// Distance within which other boats are reported in full
    #[arg(long, default_value = "500")]
    render_dist: f64,

    /// Stop after this many updates (runs until Ctrl-C when omitted)
    #[arg(short = 'n', long)]
    updates: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut credentials = Credentials::new(&args.username, &args.password);
    if let Some(sim_password) = &args.sim_password {
        credentials = credentials.with_sim_password(sim_password);
    }
    let connection = ServerConnection::new(
        &args.server,
        credentials,
        Duration::from_secs(args.timeout_secs),
    );

    info!("Connecting to: {}", args.server);
    let joined = connection.join().await?;
    info!(
        "Joined as {} ({} participants)",
        args.username,
        joined["clients"].as_object().map_or(0, |c| c.len())
    );

    let mut input = InputManager::new(args.rudder, args.sheet, args.autopilot_target);
    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match connection.update(input.next_input(), args.render_dist, vec![]).await {
                    Ok(world) => report(&args.username, &world),
                    Err(e) => warn!("Update failed: {}", e),
                }
                sent += 1;
                if args.updates.map_or(false, |limit| sent >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn report(username: &str, world: &shared::WorldUpdate) {
    match world.clients.get(username) {
        Some(ClientView::Full(own)) => {
            info!(
                "t={:.1}s pos=({:.1}, {:.1}) heading={:.0} speed={:.2} durability={:.0}",
                own.general.timer,
                own.boat.pos.x,
                own.boat.pos.y,
                own.boat.angle,
                own.boat.velocity.magnitude(),
                own.boat.hull_durability
            );
            for alert in own.general.alerts.iter().flatten() {
                info!("Alert: {}", alert.text());
            }
            for event in own.general.events.iter().flatten() {
                info!("Event: {}", event);
            }
        }
        _ => warn!("Own boat missing from update"),
    }
    info!(
        "wind=({:.1}, {:.1}) fps={:.0} boats={}",
        world.global_data.wind.x,
        world.global_data.wind.y,
        world.global_data.fps,
        world.clients.len()
    );
}
