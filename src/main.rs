// Kalman fusion - Main Entry Point

use kalman_fusion::config::{Command, Config, FuseArgs, SingleArgs};
use kalman_fusion::input::read_sensor_file;
use kalman_fusion::output::{write_rows, CsvOutput, OutputFormat};
use kalman_fusion::pipeline::{fusion_rows, log_summary, single_sensor_rows, NoiseSettings};
use kalman_fusion::tracker::SensorVariances;
use rand::rngs::StdRng;
use rand::SeedableRng;
use clap::Parser;
use tracing::{info, error};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    let result = match &config.command {
        Command::Single(args) => run_single(args),
        Command::Fuse(args) => run_fuse(args),
    };

    if let Err(err) = result {
        error!("Estimation run aborted: {}", err);
        return Err(err.into());
    }

    Ok(())
}

fn run_single(args: &SingleArgs) -> kalman_fusion::Result<()> {
    info!("Single-sensor run on {}", args.truth.display());

    let truth = read_sensor_file(&args.truth)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = NoiseSettings {
        mean: args.noise_mean,
        std_dev: args.noise_std,
    };

    let rows = single_sensor_rows(
        &truth,
        noise,
        args.measurement_variance,
        args.filter.settings(),
        &mut rng,
    )?;

    let mut output = CsvOutput::create(&args.output, OutputFormat::FiveColumn)?;
    write_rows(&mut output, &rows)?;
    info!("Wrote {} rows to {}", output.rows_written(), args.output.display());

    log_summary("single", &rows);
    Ok(())
}

fn run_fuse(args: &FuseArgs) -> kalman_fusion::Result<()> {
    info!(
        "Fusion run on {} and {}",
        args.sensor1.display(),
        args.sensor2.display()
    );

    let sensor1 = read_sensor_file(&args.sensor1)?;
    let sensor2 = read_sensor_file(&args.sensor2)?;
    let truth = read_sensor_file(&args.truth)?;
    let variances = SensorVariances {
        sensor1: args.sensor1_variance,
        sensor2: args.sensor2_variance,
    };

    let rows = fusion_rows(
        &sensor1,
        &sensor2,
        &truth,
        args.merge_policy(),
        variances,
        args.filter.settings(),
    )?;

    let mut output = CsvOutput::create(&args.output, OutputFormat::FourColumn)?;
    write_rows(&mut output, &rows)?;
    info!("Wrote {} rows to {}", output.rows_written(), args.output.display());

    log_summary("fuse", &rows);
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    if verbose {
        subscriber
            .with_max_level(tracing::Level::DEBUG)
            .init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber
            .with_max_level(tracing::Level::INFO)
            .init();
    }
}
