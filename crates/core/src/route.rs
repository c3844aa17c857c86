//! Route state: the ordered list of waypoints a user is planning

use crate::entities::{normalize_name, City};
use crate::error::{Error, Result};
use crate::geo::{haversine_km, GeoPoint};
use serde::{Deserialize, Serialize};

/// One stop on the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default = "default_nights")]
    pub nights: u32,
}

fn default_nights() -> u32 {
    1
}

impl Waypoint {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
            coordinates: None,
            nights: default_nights(),
        }
    }

    pub fn with_coordinates(mut self, point: GeoPoint) -> Self {
        self.coordinates = Some(point);
        self
    }

    pub fn with_nights(mut self, nights: u32) -> Self {
        self.nights = nights;
        self
    }

    pub fn from_city(city: &City) -> Self {
        Self {
            city: city.name.clone(),
            country: city.country.clone(),
            coordinates: city.coordinates,
            nights: default_nights(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        normalize_name(&self.city) == normalize_name(name)
    }
}

/// A drive between two consecutive waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub from: String,
    pub to: String,
    pub distance_km: f64,
}

/// A route change made by a tool, reported to the caller as a `route_action` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteAction {
    Added { city: String, position: usize },
    Removed { city: String },
    Reordered { order: Vec<String> },
}

impl RouteAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RouteAction::Added { .. } => "added",
            RouteAction::Removed { .. } => "removed",
            RouteAction::Reordered { .. } => "reordered",
        }
    }
}

/// Ordered waypoints of a session's trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl RouteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.waypoints.iter().any(|w| w.matches(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.waypoints.iter().map(|w| w.city.clone()).collect()
    }

    /// Insert a waypoint, appending when `position` is `None`
    ///
    /// Returns the index the waypoint landed at. A city already on the route
    /// is rejected; positions past the end are clamped to an append.
    pub fn add(&mut self, waypoint: Waypoint, position: Option<usize>) -> Result<usize> {
        if self.contains(&waypoint.city) {
            return Err(Error::route(format!(
                "{} is already on the route",
                waypoint.city
            )));
        }
        let index = position
            .unwrap_or(self.waypoints.len())
            .min(self.waypoints.len());
        self.waypoints.insert(index, waypoint);
        Ok(index)
    }

    /// Remove a waypoint by name, ignoring case
    pub fn remove(&mut self, name: &str) -> Result<Waypoint> {
        let index = self
            .waypoints
            .iter()
            .position(|w| w.matches(name))
            .ok_or_else(|| Error::route(format!("{name} is not on the route")))?;
        Ok(self.waypoints.remove(index))
    }

    /// Reorder the route to match `order`, which must name every stop exactly once
    pub fn reorder(&mut self, order: &[String]) -> Result<()> {
        if order.len() != self.waypoints.len() {
            return Err(Error::route(format!(
                "new order has {} stops but the route has {}",
                order.len(),
                self.waypoints.len()
            )));
        }

        let mut remaining = self.waypoints.clone();
        let mut reordered = Vec::with_capacity(order.len());
        for name in order {
            let index = remaining
                .iter()
                .position(|w| w.matches(name))
                .ok_or_else(|| Error::route(format!("{name} is not on the route")))?;
            reordered.push(remaining.remove(index));
        }

        self.waypoints = reordered;
        Ok(())
    }

    /// Consecutive legs between stops that have coordinates
    pub fn legs(&self) -> Vec<Leg> {
        self.waypoints
            .windows(2)
            .filter_map(|pair| {
                let from = pair[0].coordinates?;
                let to = pair[1].coordinates?;
                Some(Leg {
                    from: pair[0].city.clone(),
                    to: pair[1].city.clone(),
                    distance_km: haversine_km(from, to),
                })
            })
            .collect()
    }

    pub fn total_distance_km(&self) -> f64 {
        self.legs().iter().map(|l| l.distance_km).sum()
    }

    pub fn longest_leg(&self) -> Option<Leg> {
        self.legs()
            .into_iter()
            .max_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
    }

    pub fn total_nights(&self) -> u32 {
        self.waypoints.iter().map(|w| w.nights).sum()
    }
}
