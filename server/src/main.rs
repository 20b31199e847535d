use clap::Parser;
use log::{error, info};
use server::admin::ServerControls;
use server::network::{Server, ServerConfig};
use server::resources::Resources;
use std::time::Duration;

/// Authoritative server of the sailing simulator.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Resource directory holding settings, contacts, boats, maps and simulations
    #[clap(short, long, default_value = "resources")]
    resources: String,
    /// Simulation to load from `simulations/<name>.json`
    #[clap(short, long, default_value = "default")]
    simulation: String,
    /// Administrator code; random when omitted
    #[clap(long)]
    admin_code: Option<String>,
    /// Seconds a connection may take to complete its request
    #[clap(long, default_value = "5")]
    request_timeout: f64,
    /// Requests that may wait for the tick loop
    #[clap(long, default_value = "1024")]
    queue_capacity: usize,
    /// Map used when the simulation has to be created
    #[clap(long)]
    create_map: Option<String>,
    /// Boat type used when the simulation has to be created
    #[clap(long, default_value = "default")]
    create_boat: String,
    /// Simulation password used when the simulation has to be created
    #[clap(long)]
    sim_password: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.tick_rate == 0 {
        return Err("tick rate must be positive".into());
    }
    if !(args.request_timeout.is_finite() && args.request_timeout > 0.0) {
        return Err("request timeout must be a positive number of seconds".into());
    }

    let resources = Resources::new(&args.resources);
    if !resources.simulation_exists(&args.simulation) {
        let Some(map) = &args.create_map else {
            return Err(format!(
                "simulation {:?} does not exist; pass --create-map to create it",
                args.simulation
            )
            .into());
        };
        resources.create_simulation(
            &args.simulation,
            map,
            &args.create_boat,
            args.sim_password.clone(),
        )?;
    }

    let admin_code = args
        .admin_code
        .unwrap_or_else(|| format!("{:06}", rand::random::<u32>() % 1_000_000));
    info!("Administrator code: {}", admin_code);

    let sim = resources.load_simulation(&args.simulation, &admin_code)?;
    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        request_timeout: Duration::from_secs_f64(args.request_timeout),
        queue_capacity: args.queue_capacity,
    };

    let server = Server::bind(config, sim, ServerControls::new(resources)).await?;
    server.run().await?;
    info!("Server shut down");
    Ok(())
}
