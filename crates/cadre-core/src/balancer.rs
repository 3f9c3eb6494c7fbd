//! Participation balancing: volume-based send-probability adjustment.
//!
//! Counts each worker's daily email and chat volume and derives a
//! multiplicative send probability from the team average: dominant
//! senders are throttled toward a low probability, quiet ones are
//! boosted. Given the same seed and counters the gate decisions are
//! deterministic, so runs reproduce exactly.

use std::collections::BTreeMap;

use cadre_types::{Channel, ParticipationStat, Worker, WorkerId};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::BalanceConfig;

/// Where a worker's daily send volume sits relative to the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStanding {
    /// Above the throttle ratio of the team average.
    Dominant,
    /// Within the configured band.
    Typical,
    /// Below the boost ratio of the team average.
    Quiet,
}

/// Daily participation counters and gating.
#[derive(Debug, Clone)]
pub struct ParticipationBalancer {
    config: BalanceConfig,
    stats: BTreeMap<(WorkerId, u64), ParticipationStat>,
}

impl ParticipationBalancer {
    /// Create a balancer with the given thresholds.
    pub const fn new(config: BalanceConfig) -> Self {
        Self {
            config,
            stats: BTreeMap::new(),
        }
    }

    /// Increment a worker's counter for one accepted send.
    pub fn record_send(&mut self, worker_id: WorkerId, channel: Channel, day_index: u64) {
        let stat = self
            .stats
            .entry((worker_id, day_index))
            .or_insert_with(|| ParticipationStat {
                worker_id,
                day_index,
                email_count: 0,
                chat_count: 0,
                probability_modifier: 1.0,
            });
        match channel {
            Channel::Email => stat.email_count = stat.email_count.saturating_add(1),
            Channel::Chat => stat.chat_count = stat.chat_count.saturating_add(1),
        }
    }

    /// A worker's total volume for a day.
    pub fn volume(&self, worker_id: WorkerId, day_index: u64) -> u32 {
        self.stats
            .get(&(worker_id, day_index))
            .map_or(0, |s| s.email_count.saturating_add(s.chat_count))
    }

    /// Mean volume across the roster for a day.
    pub fn team_average(&self, day_index: u64, roster: &[Worker]) -> f64 {
        if roster.is_empty() {
            return 0.0;
        }
        let total: u64 = roster
            .iter()
            .map(|w| u64::from(self.volume(w.id, day_index)))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let (total, count) = (total as f64, roster.len() as f64);
        total / count
    }

    /// Where a worker's daily volume sits relative to the team average.
    pub fn standing_for(
        &self,
        worker_id: WorkerId,
        day_index: u64,
        team_average: f64,
    ) -> VolumeStanding {
        if team_average <= f64::EPSILON {
            return VolumeStanding::Typical;
        }
        let ratio = f64::from(self.volume(worker_id, day_index)) / team_average;
        if ratio > self.config.high_ratio {
            VolumeStanding::Dominant
        } else if ratio < self.config.low_ratio {
            VolumeStanding::Quiet
        } else {
            VolumeStanding::Typical
        }
    }

    /// The multiplicative send probability for a worker.
    ///
    /// Above `high_ratio` of the team average throttles; below
    /// `low_ratio` boosts; in between sends pass at full probability.
    pub fn modifier_for(&self, worker_id: WorkerId, day_index: u64, team_average: f64) -> f64 {
        match self.standing_for(worker_id, day_index, team_average) {
            VolumeStanding::Dominant => self.config.throttle_probability.clamp(0.0, 1.0),
            VolumeStanding::Quiet => self.config.boost_probability.clamp(0.0, 1.0),
            VolumeStanding::Typical => 1.0,
        }
    }

    /// Roll the gate for one prospective send. A `false` means the send
    /// is suppressed for balance.
    pub fn gate(
        &self,
        worker_id: WorkerId,
        day_index: u64,
        roster: &[Worker],
        rng: &mut StdRng,
    ) -> bool {
        let average = self.team_average(day_index, roster);
        let modifier = self.modifier_for(worker_id, day_index, average);
        let pass = rng.random_bool(modifier.clamp(0.0, 1.0));
        if !pass {
            debug!(worker_id = %worker_id, modifier, "send gated for participation balance");
        }
        pass
    }

    /// Recompute and store the modifier on every stat row for a day, then
    /// return those rows for persistence.
    pub fn rows_for_day(&mut self, day_index: u64, roster: &[Worker]) -> Vec<ParticipationStat> {
        let average = self.team_average(day_index, roster);
        let modifiers: Vec<(WorkerId, f64)> = self
            .stats
            .keys()
            .filter(|(_, day)| *day == day_index)
            .map(|&(id, _)| (id, self.modifier_for(id, day_index, average)))
            .collect();
        let mut rows = Vec::new();
        for (id, modifier) in modifiers {
            if let Some(stat) = self.stats.get_mut(&(id, day_index)) {
                stat.probability_modifier = modifier;
                rows.push(stat.clone());
            }
        }
        rows
    }

    /// Restore counters from persistence.
    pub fn restore(&mut self, stats: Vec<ParticipationStat>) {
        for stat in stats {
            self.stats.insert((stat.worker_id, stat.day_index), stat);
        }
    }

    /// Drop all counters.
    pub fn clear(&mut self) {
        self.stats.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use cadre_types::WorkerStatus;
    use rand::SeedableRng;

    fn worker(name: &str) -> Worker {
        Worker {
            id: WorkerId::new(),
            name: name.to_owned(),
            role: "Engineer".to_owned(),
            timezone: "UTC".to_owned(),
            email: format!("{name}@cadre.test"),
            chat_handle: format!("@{name}"),
            is_department_head: false,
            status: WorkerStatus::Working,
            status_until_tick: None,
        }
    }

    fn balancer() -> ParticipationBalancer {
        ParticipationBalancer::new(BalanceConfig::default())
    }

    #[test]
    fn counters_accumulate_per_day() {
        let dana = worker("dana");
        let mut b = balancer();
        b.record_send(dana.id, Channel::Email, 0);
        b.record_send(dana.id, Channel::Chat, 0);
        b.record_send(dana.id, Channel::Chat, 1);
        assert_eq!(b.volume(dana.id, 0), 2);
        assert_eq!(b.volume(dana.id, 1), 1);
    }

    #[test]
    fn dominant_sender_is_throttled() {
        let dana = worker("dana");
        let priya = worker("priya");
        let roster = vec![dana.clone(), priya.clone()];
        let mut b = balancer();
        for _ in 0..10 {
            b.record_send(dana.id, Channel::Chat, 0);
        }
        b.record_send(priya.id, Channel::Chat, 0);

        let average = b.team_average(0, &roster);
        let throttled = b.modifier_for(dana.id, 0, average);
        let boosted = b.modifier_for(priya.id, 0, average);
        assert_eq!(throttled, BalanceConfig::default().throttle_probability);
        assert_eq!(boosted, BalanceConfig::default().boost_probability);
    }

    #[test]
    fn quiet_team_is_unmodified() {
        let dana = worker("dana");
        let roster = vec![dana.clone()];
        let b = balancer();
        let average = b.team_average(0, &roster);
        assert_eq!(b.modifier_for(dana.id, 0, average), 1.0);
    }

    #[test]
    fn gate_is_deterministic_for_a_seed() {
        let dana = worker("dana");
        let priya = worker("priya");
        let roster = vec![dana.clone(), priya.clone()];
        let mut b = balancer();
        for _ in 0..10 {
            b.record_send(dana.id, Channel::Chat, 0);
        }

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let a: Vec<bool> = (0..20).map(|_| b.gate(dana.id, 0, &roster, &mut rng_a)).collect();
        let bb: Vec<bool> = (0..20).map(|_| b.gate(dana.id, 0, &roster, &mut rng_b)).collect();
        assert_eq!(a, bb);
        // A 0.2 modifier must refuse at least once in twenty rolls.
        assert!(a.iter().any(|&pass| !pass));
    }

    #[test]
    fn rows_carry_the_computed_modifier() {
        let dana = worker("dana");
        let priya = worker("priya");
        let roster = vec![dana.clone(), priya.clone()];
        let mut b = balancer();
        for _ in 0..10 {
            b.record_send(dana.id, Channel::Chat, 0);
        }
        b.record_send(priya.id, Channel::Chat, 0);

        let rows = b.rows_for_day(0, &roster);
        assert_eq!(rows.len(), 2);
        let dana_row = rows.iter().find(|r| r.worker_id == dana.id).unwrap();
        assert_eq!(
            dana_row.probability_modifier,
            BalanceConfig::default().throttle_probability
        );
    }
}
