use super::matcher::MapMatcher;
use super::model::{MapMatching, MatchResult, MatchedLink, Parameters, QualityMetrics, Waypoint};
use super::score::{neighbourhoods, score, PingNeighbourhood};
use super::traj::Trace;
use crate::error::{MapMatchError, MatchingError};
use crate::graph::{CostOverrides, Link, PathStep};
use log::{debug, warn};
use std::collections::BTreeSet;

// anchor searches double the buffer at most this many times
const ANCHOR_SEARCH_EXPANSIONS: u32 = 10;

/// A routed path through every waypoint.
#[derive(Debug, Clone)]
struct Candidate {
    steps: Vec<PathStep>,
    waypoints: Vec<Waypoint>,
    /// legs that could not be routed
    disconnected: Vec<MatchingError>,
    quality: QualityMetrics,
}

/// Iterative waypoint insertion for one stop-free segment.
///
/// The segment is first routed between the links nearest its first and last ping, with
/// the candidate link of every ping discounted. While too few pings lie within the
/// buffer of the route, a link under the longest uncovered run of pings is forced into
/// the route, and the links around the current route are discounted instead. Discounts live in a
/// `CostOverrides` owned by this run, so the network itself is never touched.
pub struct Reconstructor<'a> {
    matcher: &'a MapMatcher,
    params: &'a MapMatching,
    pings: Vec<PingNeighbourhood>,
    costs: CostOverrides,
}

/// Reconstructs the path of `segment`. Matching failures are reported inside the result;
/// only faults of the network itself are returned as errors.
pub fn reconstruct(
    segment: &Trace,
    matcher: &MapMatcher,
    params: &Parameters,
) -> Result<MatchResult, MapMatchError> {
    Reconstructor::new(segment, matcher, &params.map_matching).run(segment.trace_id())
}

impl<'a> Reconstructor<'a> {
    pub fn new(segment: &Trace, matcher: &'a MapMatcher, params: &'a MapMatching) -> Self {
        Reconstructor {
            matcher,
            params,
            pings: neighbourhoods(segment, matcher, params.buffer_size),
            costs: CostOverrides::new(),
        }
    }

    pub fn run(mut self, trace_id: i64) -> Result<MatchResult, MapMatchError> {
        if self.pings.is_empty() {
            return Ok(MatchResult::failed(trace_id, MatchingError::EmptySegment));
        }
        let candidates = self.candidate_links();
        let candidate_links = self.link_ids(&candidates);
        self.costs.apply_cost_override(candidates, self.params.cost_discount);

        let first = &self.pings[0];
        let last = &self.pings[self.pings.len() - 1];
        let mut waypoints = match (self.anchor(first), self.anchor(last)) {
            (Some(start), Some(end)) => vec![start, end],
            _ => {
                let error = MatchingError::NoCandidateLinkFound {
                    first_ping: first.ping_index,
                    last_ping: last.ping_index,
                    buffer: self.params.buffer_size,
                };
                warn!("trace {}: {}", trace_id, error);
                let (quality, _) = score(&self.pings, &BTreeSet::new(), 2);
                return Ok(MatchResult {
                    quality,
                    candidate_links,
                    ..MatchResult::failed(trace_id, error)
                });
            }
        };

        let mut best: Option<Candidate> = None;
        let mut rounds = 0;
        let (chosen, success, failure) = loop {
            let mut candidate = self.route(&waypoints)?;
            rounds += 1;
            let path: BTreeSet<usize> = candidate.steps.iter().map(|s| s.link).collect();
            let (quality, covered) = score(&self.pings, &path, waypoints.len());
            candidate.quality = quality;
            debug!(
                "trace {} round {}: {} links, match quality {:.3}, raw {:.3}",
                trace_id,
                rounds,
                candidate.steps.len(),
                quality.match_quality,
                quality.match_quality_raw
            );
            if best
                .as_ref()
                .map_or(true, |b| quality.match_quality > b.quality.match_quality)
            {
                best = Some(candidate.clone());
            }

            if quality.match_quality >= self.params.minimum_match_quality {
                break (candidate, true, None);
            }
            let inserted = waypoints.len() - 2;
            if inserted >= self.params.maximum_waypoints {
                let error = MatchingError::QualityNotReached {
                    quality: quality.match_quality,
                    minimum: self.params.minimum_match_quality,
                    waypoints: inserted,
                };
                debug!("trace {}: {}", trace_id, error);
                break (candidate, true, Some(error));
            }

            let waypoint = match self.gap_waypoint(&covered, &waypoints, rounds) {
                Ok(waypoint) => waypoint,
                Err(error) => {
                    warn!("trace {}: {}", trace_id, error);
                    break (best.take().unwrap_or(candidate), false, Some(error));
                }
            };
            debug!(
                "trace {} waypoint on link {} for ping {}",
                trace_id, waypoint.link_id, waypoint.ping_index
            );
            let position = waypoints.partition_point(|w| w.ping_index <= waypoint.ping_index);
            waypoints.insert(position, waypoint);

            let path: Vec<usize> = path.into_iter().collect();
            let corridor = self.matcher.links_near_path(&path, self.params.buffer_size);
            self.costs.reset_costs();
            self.costs.apply_cost_override(corridor, self.params.cost_discount);
        };

        let mut errors = chosen.disconnected;
        errors.extend(failure);
        Ok(MatchResult {
            trace_id,
            links: self.matched_links(&chosen.steps),
            quality: chosen.quality,
            waypoints: chosen.waypoints,
            success,
            errors,
            candidate_links,
            iterations: rounds,
        })
    }

    fn link(&self, index: usize) -> Result<&'a Link, MapMatchError> {
        self.matcher
            .network()
            .find_link_by_index(index)
            .ok_or(MapMatchError::UnknownLink(index))
    }

    // nearest link of every ping fast enough for it and aligned with its heading
    fn candidate_links(&self) -> BTreeSet<usize> {
        self.pings
            .iter()
            .filter_map(|p| {
                let fast_enough = self.matcher.filter_by_speed(p.near.clone(), p.speed);
                self.matcher
                    .filter_by_heading(fast_enough, p.heading, self.params.heading_tolerance)
                    .first()
                    .map(|m| m.link)
            })
            .collect()
    }

    // ascending ids of the given links
    fn link_ids(&self, links: &BTreeSet<usize>) -> Vec<i64> {
        let network = self.matcher.network();
        let ids: BTreeSet<i64> = links
            .iter()
            .filter_map(|l| network.find_link_by_index(*l).map(|link| link.get_id()))
            .collect();
        ids.into_iter().collect()
    }

    /// Nearest link to a segment end. The search radius doubles while nothing is found.
    fn anchor(&self, ping: &PingNeighbourhood) -> Option<Waypoint> {
        let tolerance = self.params.heading_tolerance;
        let mut near = ping.near.clone();
        let mut radius = self.params.buffer_size;
        let mut expansions = 0;
        while near.is_empty() && expansions < ANCHOR_SEARCH_EXPANSIONS {
            radius *= 2.0;
            expansions += 1;
            near = self.matcher.nearest_links(ping.point, radius);
        }
        let found = self.matcher.filter_by_heading(near, ping.heading, tolerance);
        let found = found.first()?;
        if expansions > 0 {
            debug!(
                "ping {} anchored on link {} at {:.1} m",
                ping.ping_index, found.link_id, found.distance
            );
        }
        self.waypoint(found.link, ping, 0)
    }

    fn waypoint(&self, link: usize, ping: &PingNeighbourhood, iteration: usize) -> Option<Waypoint> {
        let found = self.matcher.network().find_link_by_index(link)?;
        Some(Waypoint {
            link,
            link_id: found.get_id(),
            travel: found.travel_for_heading(ping.heading),
            ping_index: ping.ping_index,
            iteration,
        })
    }

    /// Shortest path through every waypoint link in order. A waypoint repeating the one
    /// before it adds nothing; a leg without any path is recorded and skipped.
    fn route(&self, waypoints: &[Waypoint]) -> Result<Candidate, MapMatchError> {
        let mut steps = Vec::new();
        let mut disconnected = Vec::new();
        let mut previous: Option<&Waypoint> = None;
        for waypoint in waypoints {
            if let Some(prev) = previous {
                if prev.link == waypoint.link && prev.travel == waypoint.travel {
                    continue;
                }
                let from = self.link(prev.link)?.exit_node(prev.travel);
                let to = self.link(waypoint.link)?.entry_node(waypoint.travel);
                match self.matcher.shortest_path(from, to, &self.costs)? {
                    Some(leg) => steps.extend(leg),
                    None => {
                        debug!("no path from node {} to node {}", from, to);
                        disconnected.push(MatchingError::DisconnectedNetwork { from, to });
                    }
                }
            }
            steps.push(PathStep {
                link: waypoint.link,
                travel: waypoint.travel,
            });
            previous = Some(waypoint);
        }
        Ok(Candidate {
            steps,
            waypoints: waypoints.to_vec(),
            disconnected,
            quality: QualityMetrics::default(),
        })
    }

    /// Picks a waypoint for the dominant coverage gap: the uncovered run of coverable
    /// pings lasting longest (then holding more pings, then coming first). Pings without
    /// any link in reach neither join nor break a run.
    fn gap_waypoint(
        &self,
        covered: &[bool],
        waypoints: &[Waypoint],
        iteration: usize,
    ) -> Result<Waypoint, MatchingError> {
        let mut runs: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for (i, ping) in self.pings.iter().enumerate() {
            if covered[i] {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            } else if ping.coverable() {
                current.push(i);
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        let mut dominant: Option<(i64, &Vec<usize>)> = None;
        for run in &runs {
            let duration = self.pings[run[run.len() - 1]].timestamp - self.pings[run[0]].timestamp;
            let better = match dominant {
                None => true,
                Some((d, r)) => duration > d || (duration == d && run.len() > r.len()),
            };
            if better {
                dominant = Some((duration, run));
            }
        }

        let not_found = |first: usize, last: usize| MatchingError::NoCandidateLinkFound {
            first_ping: first,
            last_ping: last,
            buffer: self.params.buffer_size,
        };
        let run = match dominant {
            Some((_, run)) => run,
            None => {
                let last = self.pings[self.pings.len() - 1].ping_index;
                return Err(not_found(self.pings[0].ping_index, last));
            }
        };

        let used: BTreeSet<usize> = waypoints.iter().map(|w| w.link).collect();
        let middle = run.len() / 2;
        let mut order: Vec<usize> = (0..run.len()).collect();
        order.sort_by_key(|k| (k.abs_diff(middle), *k));
        for k in order {
            let ping = &self.pings[run[k]];
            let aligned =
                self.matcher
                    .filter_by_heading(ping.near.clone(), ping.heading, self.params.heading_tolerance);
            if let Some(found) = aligned.iter().find(|m| !used.contains(&m.link)) {
                if let Some(waypoint) = self.waypoint(found.link, ping, iteration) {
                    return Ok(waypoint);
                }
            }
        }
        let first = self.pings[run[0]].ping_index;
        let last = self.pings[run[run.len() - 1]].ping_index;
        Err(not_found(first, last))
    }

    fn matched_links(&self, steps: &[PathStep]) -> Vec<MatchedLink> {
        let network = self.matcher.network();
        let mut milepost = 0.0;
        steps
            .iter()
            .filter_map(|step| {
                let link = network.find_link_by_index(step.link)?;
                milepost += link.get_length();
                Some(MatchedLink {
                    link: step.link,
                    link_id: link.get_id(),
                    travel: step.travel,
                    milepost,
                })
            })
            .collect()
    }
}
