use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use mapmatcher::algorithm::Metric;
use mapmatcher::mm::model::Parameters;
use mapmatcher::mm::traj::TraceCollection;
use mapmatcher::mm::{run_trips, MapMatcher};
use mapmatcher::utils;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mapmatcher")]
#[command(version = "0.1")]
#[command(about = "map matching of gps traces by iterative waypoint insertion", long_about = None)]
struct Args {
    /// road network geojson file
    #[arg(short, long, value_name = "ROAD_NETWORK_FILE")]
    network_file: String,

    /// parameters toml file, defaults apply when missing
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// coordinates are longitude/latitude rather than metres
    #[arg(long)]
    geographic: bool,

    /// skip the data quality gate
    #[arg(long)]
    ignore_errors: bool,

    /// split traces at stops before matching
    #[arg(long)]
    find_stops: bool,

    /// worker threads, all cores when missing
    #[arg(short, long)]
    workers: Option<usize>,

    /// gps traces geojson file
    #[arg(value_name = "GPS_TRACE_FILE")]
    input_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    utils::log::log_init();
    let args = Args::parse();
    debug!("{:?}", args);

    let mut params = match &args.config {
        Some(path) => Parameters::from_toml_file(path)?,
        None => Parameters::default(),
    };
    if args.geographic {
        params.geoprocessing.metric = Metric::Geographic;
    }
    params.ignore_errors |= args.ignore_errors;

    info!("try construct map matcher from geojson file");
    let matcher = MapMatcher::from_file(&args.network_file, params.geoprocessing.metric)?;

    info!("read geojson file {} ", args.input_file.display());
    let file = File::open(&args.input_file)
        .with_context(|| format!("opening {}", args.input_file.display()))?;
    let geojson = geojson::GeoJson::from_reader(BufReader::new(file))?;
    let traces = TraceCollection::try_from(geojson)?.traces;

    let trips = run_trips(traces, &params, &matcher, args.find_stops, args.workers)?;
    for trip in &trips {
        let result = trip.match_result();
        info!(
            "trace {} success {} quality {:.3} waypoints {} links {:?}",
            trip.trip_id(),
            trip.success(),
            result.quality.match_quality,
            result.quality.middle_points_required,
            result.link_ids()
        );
        for error in trip.data_quality_errors() {
            warn!("trace {} {}: {}", trip.trip_id(), error.reason(), error);
        }
        for error in &result.errors {
            warn!("trace {} {}: {}", trip.trip_id(), error.reason(), error);
        }
    }
    Ok(())
}
