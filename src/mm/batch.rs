use super::matcher::MapMatcher;
use super::model::Parameters;
use super::traj::Trace;
use super::trip::{Trip, TripState};
use crate::error::MapMatchError;
use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

/// Matches every trace as an independent trip on a rayon pool of `workers` threads
/// (rayon's default when `None`). Trips come back in input order. A trip that fails
/// matching does not stop the batch; a network fault does.
pub fn run_trips<'a>(
    traces: Vec<Trace>,
    params: &'a Parameters,
    matcher: &'a MapMatcher,
    find_stops: bool,
    workers: Option<usize>,
) -> Result<Vec<Trip<'a>>, MapMatchError> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build()?;
    info!(
        "matching {} traces on {} workers",
        traces.len(),
        pool.current_num_threads()
    );

    let trips = pool.install(|| {
        traces
            .into_par_iter()
            .map(|trace| -> Result<Trip<'a>, MapMatchError> {
                let mut trip = Trip::new(trace, params, matcher);
                if find_stops {
                    let stops = trip.compute_stops()?.len();
                    debug!("trip {} has {} stops", trip.trip_id(), stops);
                }
                trip.map_match()?;
                Ok(trip)
            })
            .collect::<Result<Vec<Trip>, MapMatchError>>()
    })?;

    let matched = trips
        .iter()
        .filter(|t| t.state() == TripState::Matched)
        .count();
    info!(
        "map matching finished, {} succeeded, {} failed",
        matched,
        trips.len() - matched
    );
    Ok(trips)
}
