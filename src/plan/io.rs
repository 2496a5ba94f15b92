//! Plans XML ingest (spec.md §6 "Plans XML").
//!
//! `<act>`/`<leg>` elements map one-to-one onto `Io*` structs (the teacher's
//! pattern for its own `IOPlanElement`), parsed with `quick-xml` + `serde`.
//! Activity duration is derived from `end_time` if present, else `dur`,
//! else left `None` (only valid for a plan's final activity). Leg
//! origin/destination are not present in the wire format and are fixed up
//! from the bracketing activities after parsing, following
//! `fredshone/mobslim`'s `fixup_ods`.

use std::fs::File;
use std::io::BufReader;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::network::NodeId;
use crate::plan::{Activity, ActivityKind, AgentId, Plan, PlanElement, Population, Trip};

#[derive(Debug, Deserialize)]
#[serde(rename = "plans")]
struct IoPlans {
    #[serde(rename = "person", default)]
    persons: Vec<IoPerson>,
}

#[derive(Debug, Deserialize)]
struct IoPerson {
    #[serde(rename = "@id")]
    id: String,
    plan: IoPlan,
}

#[derive(Debug, Deserialize)]
struct IoPlan {
    #[serde(rename = "$value", default)]
    elements: Vec<IoPlanElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum IoPlanElement {
    Act(IoActivity),
    Leg(IoLeg),
}

#[derive(Debug, Deserialize)]
struct IoActivity {
    #[serde(rename = "@type")]
    r#type: String,
    #[serde(rename = "@node")]
    node: u64,
    #[serde(rename = "@end_time")]
    end_time: Option<String>,
    #[serde(rename = "@dur")]
    dur: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IoLeg {
    #[serde(rename = "@mode")]
    #[allow(dead_code)]
    mode: Option<String>,
    route: Option<IoRoute>,
}

#[derive(Debug, Deserialize)]
struct IoRoute {
    #[serde(rename = "$value", default)]
    link_ids: Option<String>,
}

/// Loads a plans XML file into a `Population`. `node`/link lookups are not
/// resolved here — routes in the XML name links by their external id,
/// which callers resolve against a loaded `Network` via
/// `Network::edge_by_external_id` when constructing `RouteEdge`s; this
/// loader only produces origin/destination-fixed-up, unrouted `Trip`s plus
/// the raw external link-id route if present in the `<route>` element so
/// callers can instantiate a pre-routed trip without the planner.
pub fn load(path: &str) -> ConfigResult<(Population, Vec<(AgentId, Vec<u64>)>)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let io_plans: IoPlans = if path.ends_with(".gz") {
        quick_xml::de::from_reader(BufReader::new(GzDecoder::new(reader)))
            .map_err(|e| ConfigError::Xml(e.to_string()))?
    } else {
        quick_xml::de::from_reader(reader).map_err(|e| ConfigError::Xml(e.to_string()))?
    };

    from_io(io_plans)
}

fn from_io(io_plans: IoPlans) -> ConfigResult<(Population, Vec<(AgentId, Vec<u64>)>)> {
    let mut population = Population::new();
    let mut raw_routes = Vec::new();

    for (index, io_person) in io_plans.persons.into_iter().enumerate() {
        let agent_id: AgentId = io_person.id.parse().unwrap_or(index as u64);
        let (plan, trip_routes) = plan_from_io(io_person.plan)?;
        for (trip_index, route) in trip_routes.into_iter().enumerate() {
            if !route.is_empty() {
                raw_routes.push((agent_id, route));
                let _ = trip_index;
            }
        }
        population.plans.insert(agent_id, plan);
    }

    Ok((population, raw_routes))
}

fn plan_from_io(io_plan: IoPlan) -> ConfigResult<(Plan, Vec<Vec<u64>>)> {
    let mut plan = Plan::new();
    let mut trip_routes = Vec::new();

    for element in io_plan.elements {
        match element {
            IoPlanElement::Act(act) => {
                let duration = if let Some(end_time) = act.end_time.as_deref() {
                    Some(parse_time(end_time)?)
                } else if let Some(dur) = act.dur.as_deref() {
                    Some(parse_time(dur)?)
                } else {
                    None
                };
                let kind = ActivityKind::from_matsim_code(&act.r#type);
                plan.push_activity(Activity::new(kind, NodeId(act.node), duration));
            }
            IoPlanElement::Leg(leg) => {
                let ids: Vec<u64> = leg
                    .route
                    .and_then(|r| r.link_ids)
                    .unwrap_or_default()
                    .split_whitespace()
                    .filter_map(|s| s.parse().ok())
                    .collect();
                trip_routes.push(ids);
                // origin/destination fixed up below once all activities are known.
                plan.push_trip(Trip::unrouted(NodeId(0), NodeId(0)));
            }
        }
    }

    fixup_ods(&mut plan);
    Ok((plan, trip_routes))
}

/// Sets each trip's origin/destination from the activities immediately
/// preceding and following it, mirroring `fredshone/mobslim`'s `fixup_ods`.
fn fixup_ods(plan: &mut Plan) {
    let locations: Vec<Option<NodeId>> = plan
        .elements
        .iter()
        .map(|e| match e {
            PlanElement::Activity(a) => Some(a.location),
            PlanElement::Trip(_) => None,
        })
        .collect();

    for i in 0..plan.elements.len() {
        if matches!(plan.elements[i], PlanElement::Trip(_)) {
            let origin = locations[i - 1].expect("trip must be bracketed by activities");
            let destination = locations[i + 1].expect("trip must be bracketed by activities");
            if let PlanElement::Trip(trip) = &mut plan.elements[i] {
                trip.origin = origin;
                trip.destination = destination;
            }
        }
    }
}

/// Parses `HH:MM` or `HH:MM:SS` into seconds, matching
/// `fredshone/mobslim`'s `string_to_seconds`.
fn parse_time(value: &str) -> ConfigResult<u32> {
    let parts: Vec<&str> = value.split(':').collect();
    let parsed: Option<u32> = match parts.as_slice() {
        [h, m] => h.parse().ok().zip(m.parse().ok()).map(|(h, m): (u32, u32)| h * 3600 + m * 60),
        [h, m, s] => h
            .parse()
            .ok()
            .zip(m.parse().ok())
            .zip(s.parse().ok())
            .map(|((h, m), s): ((u32, u32), u32)| h * 3600 + m * 60 + s),
        _ => None,
    };
    parsed.ok_or_else(|| ConfigError::InvalidTime(value.to_string()))
}
