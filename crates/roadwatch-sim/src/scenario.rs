//! Scripted upstream feed.
//!
//! Keeps a small world of closures and mutates it once per pass: new
//! closures appear, existing ones get content updates, flip between full and
//! partial closure, drop out of the feed, and sometimes come back.

use rand::Rng;
use roadwatch_core::FeedEvent;
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// Coordinates the generator scatters closures around: four inside the
/// bundled Alberta regions and one outside all of them.
pub const ANCHORS: [(f64, f64); 5] = [
    (53.5461, -113.4938),
    (51.0447, -114.0719),
    (56.7267, -111.3810),
    (52.2681, -113.8112),
    (49.28, -123.12),
];

const ROADS: [&str; 6] = [
    "Hwy 2",
    "Hwy 16",
    "Anthony Henday Dr",
    "Deerfoot Trail",
    "Hwy 63",
    "Whitemud Dr",
];

/// Per-pass mutation rates, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// Chance of spawning one new closure on each of `max_new_per_pass` tries.
    pub spawn_percent: u8,
    pub max_new_per_pass: u8,
    /// Chance a visible event gets a new `LastUpdated`.
    pub update_percent: u8,
    /// Chance a visible event flips `IsFullClosure`.
    pub flip_percent: u8,
    /// Chance a visible event drops out of the feed.
    pub vanish_percent: u8,
    /// Chance a vanished event returns.
    pub reappear_percent: u8,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            spawn_percent: 40,
            max_new_per_pass: 3,
            update_percent: 10,
            flip_percent: 5,
            vanish_percent: 8,
            reappear_percent: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WorldEvent {
    event: FeedEvent,
    visible: bool,
}

/// The evolving upstream world.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    churn: ChurnConfig,
    world: Vec<WorldEvent>,
    next_id: u64,
}

impl ScriptedFeed {
    #[must_use]
    pub fn new(churn: ChurnConfig) -> Self {
        Self {
            churn,
            ..Self::default()
        }
    }

    /// Number of events ever spawned.
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.next_id
    }

    /// Mutate the world for a pass at `now` and return the visible snapshot.
    pub fn step(&mut self, rng: &mut DeterministicRng, now: i64) -> Vec<FeedEvent> {
        let churn = self.churn;
        for item in &mut self.world {
            if item.visible {
                if rng.hit_rate_percent(churn.vanish_percent) {
                    item.visible = false;
                    continue;
                }
                if rng.hit_rate_percent(churn.flip_percent) {
                    item.event.is_full_closure = !item.event.is_full_closure;
                    item.event.last_updated = Some(now);
                }
                if rng.hit_rate_percent(churn.update_percent) {
                    item.event.description = format!("Revised at {now}");
                    item.event.last_updated = Some(now);
                }
            } else if rng.hit_rate_percent(churn.reappear_percent) {
                item.visible = true;
            }
        }

        for _ in 0..churn.max_new_per_pass {
            if rng.hit_rate_percent(churn.spawn_percent) {
                let event = self.spawn(rng, now);
                self.world.push(WorldEvent {
                    event,
                    visible: true,
                });
            }
        }

        self.snapshot()
    }

    /// The events currently visible upstream.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FeedEvent> {
        self.world
            .iter()
            .filter(|item| item.visible)
            .map(|item| item.event.clone())
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn spawn(&mut self, rng: &mut DeterministicRng, now: i64) -> FeedEvent {
        self.next_id += 1;
        let (lat, lon) = ANCHORS[rng.next_bounded(ANCHORS.len() as u64) as usize];
        let road = ROADS[rng.next_bounded(ROADS.len() as u64) as usize];
        FeedEvent {
            id: format!("SIM-{}", self.next_id),
            is_full_closure: rng.hit_rate_percent(80),
            latitude: lat + rng.gen_range(-0.02..0.02),
            longitude: lon + rng.gen_range(-0.02..0.02),
            roadway_name: road.to_string(),
            direction_of_travel: "Both Directions".to_string(),
            description: "Simulated closure".to_string(),
            event_type: "closures".to_string(),
            comment: None,
            start_date: now,
            planned_end_date: None,
            last_updated: Some(now),
        }
    }
}
