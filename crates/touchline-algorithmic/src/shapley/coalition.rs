//! Coalitions of channels and the conversion-rate game over them.

use std::collections::{BTreeMap, HashMap};
use touchline_data::ChannelGrouping;
use touchline_models::ConversionPath;

/// A set of players encoded as a bitmask over player indices.
///
/// Only meaningful for games with at most 64 players; exact enumeration is
/// capped well below that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Coalition(u64);

impl Coalition {
    /// The empty coalition.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every player of an `n`-player game.
    pub const fn full(n: usize) -> Self {
        if n >= 64 { Self(u64::MAX) } else { Self((1 << n) - 1) }
    }

    /// Coalition from a raw bitmask.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bitmask.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Position of this coalition in a table indexed by bitmask.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether player `i` is a member.
    pub const fn contains(self, i: usize) -> bool {
        i < 64 && self.0 & (1 << i) != 0
    }

    /// This coalition with player `i` added.
    pub const fn with(self, i: usize) -> Self {
        Self(self.0 | (1 << i))
    }

    /// Number of members.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the coalition has no members.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Lazy iterator over every coalition of an `n`-player game, in bitmask order.
#[derive(Debug, Clone)]
pub struct Subsets {
    next: u64,
    end: u64,
}

impl Subsets {
    /// All `2^n` subsets of `n` players. `n` must be below 64.
    pub fn new(n: usize) -> Self {
        let end = if n >= 64 { u64::MAX } else { 1 << n };
        Self { next: 0, end }
    }
}

impl Iterator for Subsets {
    type Item = Coalition;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let current = Coalition(self.next);
        self.next += 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Paths sharing the same set of players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Sorted player indices present in the paths
    pub members: Vec<usize>,
    /// How many of the paths converted
    pub conversions: usize,
    /// How many paths have this signature
    pub paths: usize,
}

/// Conversion-rate game: `v(S)` is the share of paths touching at least one
/// player of `S` that converted.
///
/// The game is not monotone. Adding a channel whose journeys rarely convert
/// lowers the rate, so marginal contributions can be negative.
#[derive(Debug, Clone)]
pub struct CoalitionGame {
    channels: Vec<String>,
    signatures: Vec<Signature>,
    by_channel: Vec<Vec<usize>>,
    total_paths: usize,
}

impl CoalitionGame {
    /// Build the game for `channels` over both path populations.
    ///
    /// Touchpoints on channels outside `channels` are ignored. A path with no
    /// player is never covered by any coalition.
    pub fn from_paths(
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
        channels: Vec<String>,
        grouping: ChannelGrouping,
    ) -> Self {
        let index: HashMap<&str, usize> = channels
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut grouped: BTreeMap<Vec<usize>, (usize, usize)> = BTreeMap::new();
        let mut total_paths = 0;
        for path in conversions.iter().chain(non_conversions) {
            total_paths += 1;
            let mut members: Vec<usize> = path
                .distinct_labels(grouping)
                .iter()
                .filter_map(|label| index.get(label.as_str()).copied())
                .collect();
            members.sort_unstable();

            let entry = grouped.entry(members).or_default();
            entry.1 += 1;
            if path.is_converting() {
                entry.0 += 1;
            }
        }

        let signatures: Vec<Signature> = grouped
            .into_iter()
            .map(|(members, (conversions, paths))| Signature {
                members,
                conversions,
                paths,
            })
            .collect();

        let mut by_channel = vec![Vec::new(); channels.len()];
        for (s, signature) in signatures.iter().enumerate() {
            for &member in &signature.members {
                by_channel[member].push(s);
            }
        }

        Self {
            channels,
            signatures,
            by_channel,
            total_paths,
        }
    }

    /// Player labels, indexed by player.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the game has no players.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Distinct player sets with their path counts.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Indices into [`signatures`](Self::signatures) that contain player `i`.
    pub fn signatures_with(&self, i: usize) -> &[usize] {
        match self.by_channel.get(i) {
            Some(signatures) => signatures,
            None => &[],
        }
    }

    /// Paths in both populations.
    pub const fn total_paths(&self) -> usize {
        self.total_paths
    }

    /// `conversions` out of `paths`, or 0 when no path is covered.
    pub fn rate(conversions: usize, paths: usize) -> f64 {
        if paths == 0 {
            0.0
        } else {
            conversions as f64 / paths as f64
        }
    }

    /// `v(S)`; the empty coalition is worth 0.
    pub fn value(&self, coalition: &Coalition) -> f64 {
        let (conversions, paths) = self
            .signatures
            .iter()
            .filter(|s| s.members.iter().any(|&m| coalition.contains(m)))
            .fold((0, 0), |(c, p), s| (c + s.conversions, p + s.paths));
        Self::rate(conversions, paths)
    }

    /// Value of the coalition of all players.
    pub fn grand_value(&self) -> f64 {
        let (conversions, paths) = self
            .signatures
            .iter()
            .filter(|s| !s.members.is_empty())
            .fold((0, 0), |(c, p), s| (c + s.conversions, p + s.paths));
        Self::rate(conversions, paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{path, repeat};
    use approx::assert_abs_diff_eq;

    fn game() -> CoalitionGame {
        let mut conversions = repeat("ab", 2, &["a", "b"], true);
        conversions.push(path("c", &["c"], true));
        let non_conversions = vec![path("na", &["a"], false), path("nd", &["d"], false)];
        CoalitionGame::from_paths(
            &conversions,
            &non_conversions,
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ChannelGrouping::Source,
        )
    }

    #[test]
    fn test_coalition_bits() {
        let s = Coalition::empty().with(0).with(2);
        assert!(s.contains(0));
        assert!(!s.contains(1));
        assert_eq!(s.len(), 2);
        assert_eq!(s.index(), 5);
        assert_eq!(Coalition::full(3).bits(), 0b111);
        assert!(Coalition::empty().is_empty());
    }

    #[test]
    fn test_subsets_are_lazy_and_restartable() {
        let subsets = Subsets::new(3);
        assert_eq!(subsets.size_hint(), (8, Some(8)));
        let all: Vec<u64> = subsets.clone().map(Coalition::bits).collect();
        assert_eq!(all, (0..8).collect::<Vec<_>>());
        assert_eq!(subsets.count(), 8);
        assert_eq!(Subsets::new(0).count(), 1);
    }

    #[test]
    fn test_signatures_group_paths() {
        let game = game();
        assert_eq!(game.total_paths(), 5);
        // [] from "d", [a], [a, b], [c]
        assert_eq!(game.signatures().len(), 4);
        assert_eq!(game.signatures_with(0).len(), 2);
    }

    #[test]
    fn test_values() {
        let game = game();
        assert_eq!(game.value(&Coalition::empty()), 0.0);
        // a: two "ab" conversions out of three paths
        assert_abs_diff_eq!(game.value(&Coalition::empty().with(0)), 2.0 / 3.0);
        assert_abs_diff_eq!(game.value(&Coalition::empty().with(1)), 1.0);
        assert_abs_diff_eq!(game.value(&Coalition::empty().with(2)), 1.0);
        // "d" is not a player, so its path is never covered
        assert_abs_diff_eq!(game.value(&Coalition::full(3)), 3.0 / 4.0);
        assert_abs_diff_eq!(game.grand_value(), 3.0 / 4.0);
    }

    #[test]
    fn test_rate_without_paths_is_zero() {
        assert_eq!(CoalitionGame::rate(0, 0), 0.0);
        assert_abs_diff_eq!(CoalitionGame::rate(1, 4), 0.25);
    }
}
