use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaMode {
    #[serde(rename = "SMA", alias = "sma")]
    Sma,
    #[serde(rename = "EMA", alias = "ema")]
    Ema,
}

impl MaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaMode::Sma => "SMA",
            MaMode::Ema => "EMA",
        }
    }
}

impl fmt::Display for MaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SMA" => Ok(MaMode::Sma),
            "EMA" => Ok(MaMode::Ema),
            other => Err(format!("unknown moving-average mode: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParameterCombination {
    pub channel_length: i64,
    pub fast_period: i64,
    pub slow_period: i64,
    pub mode: MaMode,
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channel={} fast={} slow={}",
            self.mode, self.channel_length, self.fast_period, self.slow_period
        )
    }
}

/// The full three-dimensional grid. Channel length is the outer loop because
/// it is the most expensive control to change on the host.
#[derive(Clone, Debug)]
pub struct ParameterSpace<'a> {
    channel_lengths: &'a [i64],
    fast_periods: &'a [i64],
    slow_periods: &'a [i64],
}

impl<'a> ParameterSpace<'a> {
    pub fn new(channel_lengths: &'a [i64], fast_periods: &'a [i64], slow_periods: &'a [i64]) -> Self {
        Self {
            channel_lengths,
            fast_periods,
            slow_periods,
        }
    }

    pub fn iter(&self, mode: MaMode) -> impl Iterator<Item = ParameterCombination> + 'a {
        let channel_lengths = self.channel_lengths;
        let fast_periods = self.fast_periods;
        let slow_periods = self.slow_periods;
        channel_lengths.iter().flat_map(move |&channel_length| {
            fast_periods.iter().flat_map(move |&fast_period| {
                slow_periods
                    .iter()
                    .filter(move |&&slow_period| slow_period > fast_period)
                    .map(move |&slow_period| ParameterCombination {
                        channel_length,
                        fast_period,
                        slow_period,
                        mode,
                    })
            })
        })
    }

    pub fn valid_period_pairs(&self) -> usize {
        self.fast_periods
            .iter()
            .map(|f| self.slow_periods.iter().filter(|s| *s > f).count())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.channel_lengths.len() * self.valid_period_pairs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_fast_period(&self) -> Option<i64> {
        self.fast_periods.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_combination_keeps_slow_above_fast() {
        let channels: Vec<i64> = (4..=14).collect();
        let fast = [5, 10, 15, 20, 25, 30];
        let slow: Vec<i64> = (2..=10).map(|x| x * 10).collect();
        let space = ParameterSpace::new(&channels, &fast, &slow);

        let combos: Vec<_> = space.iter(MaMode::Sma).collect();
        assert!(!combos.is_empty());
        assert!(combos.iter().all(|c| c.slow_period > c.fast_period));
        assert_eq!(combos.len(), space.len());
    }

    #[test]
    fn overlapping_ranges_drop_invalid_pairs() {
        let channels = [4, 5, 6];
        let fast = [10, 20, 30];
        let slow = [10, 20, 30, 40];
        let space = ParameterSpace::new(&channels, &fast, &slow);

        // fast=10 -> {20,30,40}, fast=20 -> {30,40}, fast=30 -> {40}
        assert_eq!(space.valid_period_pairs(), 6);
        assert_eq!(space.len(), 18);
        assert_eq!(space.iter(MaMode::Ema).count(), 18);
    }

    #[test]
    fn enumeration_is_channel_then_fast_then_slow() {
        let channels = [4, 5];
        let fast = [5, 10];
        let slow = [20, 30];
        let space = ParameterSpace::new(&channels, &fast, &slow);

        let order: Vec<(i64, i64, i64)> = space
            .iter(MaMode::Sma)
            .map(|c| (c.channel_length, c.fast_period, c.slow_period))
            .collect();
        assert_eq!(
            order,
            vec![
                (4, 5, 20),
                (4, 5, 30),
                (4, 10, 20),
                (4, 10, 30),
                (5, 5, 20),
                (5, 5, 30),
                (5, 10, 20),
                (5, 10, 30),
            ]
        );
    }

    #[test]
    fn empty_range_yields_nothing() {
        let fast = [5, 10];
        let slow = [20, 30];
        let space = ParameterSpace::new(&[], &fast, &slow);
        assert!(space.is_empty());
        assert_eq!(space.iter(MaMode::Sma).count(), 0);

        let space = ParameterSpace::new(&[4], &fast, &[]);
        assert_eq!(space.iter(MaMode::Sma).count(), 0);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("sma".parse::<MaMode>().unwrap(), MaMode::Sma);
        assert_eq!(" Ema ".parse::<MaMode>().unwrap(), MaMode::Ema);
        assert!("WMA".parse::<MaMode>().is_err());
        assert_eq!(MaMode::Ema.to_string(), "EMA");
    }
}
