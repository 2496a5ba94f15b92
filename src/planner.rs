//! Per-agent replanning: walks each trip under a notional clock and routes
//! it against the current expected durations (spec.md §4.I).

use rand::Rng;

use crate::error::{ConfigError, ConfigResult};
use crate::plan::{Plan, PlanElement, Population};
use crate::router::Router;

/// Default horizon (seconds in a day) used to fill in a final activity's
/// undefined duration (spec.md §4.I).
pub const DEFAULT_MAX_HORIZON: u32 = 86400;

pub struct Planner {
    p: f64,
    max_horizon: u32,
}

impl Planner {
    pub fn new(p: f64, max_horizon: u32) -> ConfigResult<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidP(p));
        }
        Ok(Planner { p, max_horizon })
    }

    /// Forces full replanning (`p = 1.0`), as spec.md §4.I requires for
    /// initial planning.
    pub fn plan(&self, population: &mut Population, router: &Router) -> ConfigResult<()> {
        for plan in population.plans.values_mut() {
            self.walk_plan(plan, router)?;
        }
        Ok(())
    }

    /// Re-routes each agent's plan independently with the configured
    /// probability `p`.
    pub fn replan<R: Rng>(&self, population: &mut Population, router: &Router, rng: &mut R) -> ConfigResult<()> {
        let mut agent_ids: Vec<_> = population.plans.keys().copied().collect();
        agent_ids.sort_unstable();
        for agent_id in agent_ids {
            if rng.gen::<f64>() < self.p {
                let plan = population.plans.get_mut(&agent_id).expect("agent_ids drawn from population.plans");
                self.walk_plan(plan, router)?;
            }
        }
        Ok(())
    }

    /// Walks a single agent's plan under a notional clock starting at 0,
    /// routing every trip at the clock time it would depart (spec.md
    /// §4.I).
    fn walk_plan(&self, plan: &mut Plan, router: &Router) -> ConfigResult<()> {
        let mut clock: u32 = 0;
        let last_index = plan.elements.len().saturating_sub(1);

        for (index, element) in plan.elements.iter_mut().enumerate() {
            match element {
                PlanElement::Activity(activity) => match activity.duration {
                    Some(duration) => clock += duration,
                    None => {
                        if index != last_index {
                            return Err(ConfigError::NegativeActivityDuration { clock, horizon: self.max_horizon });
                        }
                        if clock > self.max_horizon {
                            return Err(ConfigError::NegativeActivityDuration { clock, horizon: self.max_horizon });
                        }
                        activity.duration = Some(self.max_horizon - clock);
                        clock = self.max_horizon;
                    }
                },
                PlanElement::Trip(trip) => {
                    let (route, expected_duration) = router.route(trip.origin, trip.destination, clock)?;
                    trip.route = route;
                    trip.expected_duration = expected_duration;
                    clock += expected_duration.round() as u32;
                }
            }
        }
        Ok(())
    }
}
