use clap::Parser;
use server::network::NetworkServer;
use server::room::{Room, RoomEvent};
use std::time::Duration;
use tokio::sync::mpsc;

/// Main-method of the application.
/// Parses command-line arguments, then spawns the room task and the network
/// accept loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Tick rate (simulation updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
    }

    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();
    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(args.tick_rate));

    // The room owns all simulation state; sockets only talk to it through
    // this channel.
    let (room_tx, room_rx) = mpsc::unbounded_channel::<RoomEvent>();
    let room_handle = tokio::spawn(Room::new(tick_duration).run(room_rx));

    let address = format!("{}:{}", args.host, args.port);
    let network = NetworkServer::bind(&address).await?;
    let network_handle = tokio::spawn(network.run(room_tx));

    // Handle shutdown gracefully
    tokio::select! {
        result = network_handle => {
            if let Err(e) = result {
                eprintln!("Network task panicked: {}", e);
            }
        }
        result = room_handle => {
            if let Err(e) = result {
                eprintln!("Room task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
