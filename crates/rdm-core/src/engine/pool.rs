//! Route pool: idle/dead sets, worst-route detection, idle-route claims.
//!
//! A route in neither set is presumed actively downloading. All state is
//! per-invocation; the engine builds a fresh pool for every download.

use super::rate::RateTable;
use crate::route::Route;
use dashmap::{DashMap, DashSet};

pub(crate) struct RoutePool {
    pub rates: RateTable,
    /// Routes that finished (or were abandoned by) their segment and are
    /// eligible for reassignment.
    idle: DashSet<String>,
    /// Routes permanently excluded after a hard transport failure.
    dead: DashSet<String>,
    /// Route id -> route, for handing a claimed id back to a worker.
    routes: DashMap<String, Route>,
}

impl RoutePool {
    pub fn new() -> Self {
        Self {
            rates: RateTable::new(),
            idle: DashSet::new(),
            dead: DashSet::new(),
            routes: DashMap::new(),
        }
    }

    /// Register a route with the pool and seed its rate entry.
    pub fn track(&self, route: &Route) {
        let id = route.id();
        self.rates.track(&id);
        self.routes.insert(id, route.clone());
    }

    /// Return a route to circulation after its attempt ended. Dead routes
    /// stay out.
    pub fn release(&self, route: &Route) {
        let id = route.id();
        if !self.dead.contains(&id) {
            self.idle.insert(id);
        }
    }

    /// Permanently retire a route after a hard transport failure.
    pub fn retire(&self, route: &Route) {
        let id = route.id();
        self.idle.remove(&id);
        self.dead.insert(id);
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    /// True iff no other active route (not idle, not dead) has a strictly
    /// lower smoothed speed. A route with no competing active route is
    /// trivially not worst.
    pub fn is_worst(&self, route_id: &str) -> bool {
        let own = self.rates.speed(route_id);
        let mut competitors = 0usize;
        for (id, speed) in self.rates.entries() {
            if id == route_id || self.idle.contains(&id) || self.dead.contains(&id) {
                continue;
            }
            competitors += 1;
            if speed < own {
                return false;
            }
        }
        competitors > 0
    }

    /// Highest-smoothed-speed idle route other than `excluding`, or None if
    /// the idle set is empty. Ties break to the smallest route id so the
    /// choice is deterministic.
    fn best_idle(&self, excluding: &str) -> Option<(String, u64)> {
        let mut best: Option<(String, u64)> = None;
        for entry in self.idle.iter() {
            let id = entry.key();
            if id == excluding || self.dead.contains(id) {
                continue;
            }
            let speed = self.rates.speed(id);
            let better = match &best {
                None => true,
                Some((best_id, best_speed)) => {
                    speed > *best_speed || (speed == *best_speed && id < best_id)
                }
            };
            if better {
                best = Some((id.clone(), speed));
            }
        }
        best
    }

    /// Claim the best idle route, whatever its speed. Used for forced
    /// migration (transport error, stall), where the failed route's stale
    /// speed must not bar recovery. Removal from the idle set is the atomic
    /// check-and-remove; a lost race retries with the next candidate.
    pub fn claim_best_idle(&self, excluding: &str) -> Option<Route> {
        loop {
            let (id, _) = self.best_idle(excluding)?;
            if self.idle.remove(&id).is_some() {
                return self.routes.get(&id).map(|r| r.clone());
            }
        }
    }

    /// Claim the best idle route only if it is strictly faster than the
    /// current route. Used for preemptive migration off a worst-flagged
    /// route that is still making progress.
    pub fn claim_faster_idle(&self, current: &str) -> Option<Route> {
        let own = self.rates.speed(current);
        loop {
            let (id, speed) = self.best_idle(current)?;
            if speed <= own {
                return None;
            }
            if self.idle.remove(&id).is_some() {
                return self.routes.get(&id).map(|r| r.clone());
            }
        }
    }
}
