use clap::Parser;
use log::info;

use rocket_station::codec::Schema;
use rocket_station::error::Result;
use rocket_station::session::{DEFAULT_BAUD_RATE, PortSettings, available_ports};
use rocket_station::station::Station;

#[derive(Parser)]
#[command(name = "rocket-station")]
#[command(about = "Ground-station telemetry console for a hobby rocket")]
struct Cli {
    /// Serial port device path, e.g. /dev/ttyUSB0
    port: Option<String>,

    /// Baud rate of the flight computer's USB bridge
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Decode the legacy 9-field triaxial schema instead of the current one
    #[arg(long)]
    legacy_schema: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list {
        for port in available_ports()? {
            println!("{port}");
        }
        return Ok(());
    }

    let Some(port) = cli.port else {
        eprintln!("no serial port given; try --list to see what is available");
        return Ok(());
    };

    let schema = if cli.legacy_schema {
        Schema::Triaxial9
    } else {
        Schema::Attitude10
    };
    let mut station = Station::new(schema);
    let mut events = station.connect(PortSettings::new(port, cli.baud)).await?;

    tokio::select! {
        () = station.pump(&mut events) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, closing session");
        }
    }
    station.disconnect();

    let records = station.history().records().len();
    if records > 0 {
        info!(
            "session summary: {records} records, {} dropped frames, max altitude {:.1} m, phase {}",
            station.dropped_frames(),
            station.history().max_altitude(),
            station.phase(),
        );
    }
    Ok(())
}
