use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::time::Duration;
use tfs_client::{BufferClient, ClientConfig, TransformLookup};
use tfs_clock::TfTime;
use tfs_protocol::DEFAULT_SERVICE_NAME;

/// Prints where the source frame is in the target frame, as seen by a transform server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    target_frame: String,
    source_frame: String,

    /// Service name of the server
    #[arg(short, long, default_value = DEFAULT_SERVICE_NAME)]
    server: String,

    #[arg(long)]
    socket_dir: Option<PathBuf>,

    /// Lookup time in seconds, 0 for the latest available
    #[arg(short, long, default_value_t = 0.0)]
    time: f64,

    /// Time of the source frame in seconds; needs --fixed-frame
    #[arg(long, requires = "fixed_frame")]
    source_time: Option<f64>,

    /// Frame that does not move between --time and --source-time
    #[arg(long)]
    fixed_frame: Option<String>,

    /// How long to wait for the server and then for the data, in seconds
    #[arg(long, default_value_t = 1.0)]
    timeout: f64,

    #[arg(long, default_value_t = LevelFilter::Warn)]
    log_level: LevelFilter,
}

fn seconds(value: f64, what: &str) -> Result<TfTime> {
    match TfTime::try_from_secs_f64(value) {
        Some(time) => Ok(time),
        None => bail!("{what} must be a non-negative number of seconds, got {value}"),
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    TermLogger::init(
        opts.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialize the logger")?;

    let time = seconds(opts.time, "--time")?;
    let timeout: Duration = seconds(opts.timeout, "--timeout")?.into();

    let mut config = ClientConfig::default();
    if let Some(dir) = opts.socket_dir {
        config.socket_dir = dir;
    }
    let client = BufferClient::with_config(&opts.server, config);
    if !client.wait_for_server(timeout) {
        bail!("Server {} is not reachable", opts.server);
    }

    let stamped = match &opts.fixed_frame {
        Some(fixed) => {
            let source_time = match opts.source_time {
                Some(value) => seconds(value, "--source-time")?,
                None => time,
            };
            client.lookup_transform_full(
                &opts.target_frame,
                time,
                &opts.source_frame,
                source_time,
                fixed,
                timeout,
            )?
        }
        None => client.lookup_transform(&opts.target_frame, &opts.source_frame, time, timeout)?,
    };

    let [x, y, z] = stamped.transform.translation_array();
    let [qx, qy, qz, qw] = stamped.transform.rotation_array();
    let (roll, pitch, yaw) = stamped.transform.to_rpy();
    println!(
        "{} in {} at time {:.9}",
        stamped.child_frame_id,
        stamped.frame_id,
        stamped.stamp.as_secs_f64()
    );
    println!("- Translation: [{x:.3}, {y:.3}, {z:.3}]");
    println!("- Rotation: in Quaternion [{qx:.3}, {qy:.3}, {qz:.3}, {qw:.3}]");
    println!("            in RPY (radian) [{roll:.3}, {pitch:.3}, {yaw:.3}]");
    println!(
        "            in RPY (degree) [{:.3}, {:.3}, {:.3}]",
        roll.to_degrees(),
        pitch.to_degrees(),
        yaw.to_degrees()
    );
    Ok(())
}
