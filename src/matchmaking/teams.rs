//! Team assignment algorithms
//!
//! Both splits give team1 the larger half on odd counts. The fair split
//! anchors the first player to team1 during the search, which halves the
//! enumeration by skipping mirrored assignments; a coin flip afterwards
//! decides which side becomes the literal team1 so the anchor bias cannot
//! leak into which slot wins.

use crate::types::{PlayerId, SkillRating};
use crate::utils::{combinations, shuffle};
use rand::Rng;
use std::collections::HashMap;

/// Players per team1 for a total of `n` players (larger half)
pub fn team1_size(n: usize) -> usize {
    (n + 1) / 2
}

/// Uniform random split: shuffle, then cut at the larger half
pub fn split_random<R: Rng>(
    mut selected: Vec<PlayerId>,
    rng: &mut R,
) -> (Vec<PlayerId>, Vec<PlayerId>) {
    shuffle(&mut selected, rng);
    let team2 = selected.split_off(team1_size(selected.len()));
    (selected, team2)
}

/// Search every anchor-completing combination for the most even win
/// probabilities, scored by `|P(team1) - P(team2)|`; ties go to the first
/// combination found. Degrades to a random split for n <= 2.
pub fn split_fair<R, P>(
    selected: Vec<PlayerId>,
    ratings: &HashMap<PlayerId, SkillRating>,
    predict: P,
    rng: &mut R,
) -> (Vec<PlayerId>, Vec<PlayerId>)
where
    R: Rng,
    P: Fn(&[SkillRating], &[SkillRating]) -> (f64, f64),
{
    let n = selected.len();
    if n <= 2 {
        return split_random(selected, rng);
    }

    let anchor = selected[0].clone();
    let rest: Vec<PlayerId> = selected[1..].to_vec();
    let completions = team1_size(n) - 1;

    let rating_of = |player: &PlayerId| -> SkillRating {
        ratings.get(player).copied().unwrap_or_default()
    };

    let mut best: Option<(f64, Vec<PlayerId>, Vec<PlayerId>)> = None;
    for combo in combinations(&rest, completions) {
        let mut team1 = vec![anchor.clone()];
        team1.extend(combo.iter().cloned());
        let team2: Vec<PlayerId> = rest
            .iter()
            .filter(|p| !combo.contains(p))
            .cloned()
            .collect();

        let ratings1: Vec<SkillRating> = team1.iter().map(&rating_of).collect();
        let ratings2: Vec<SkillRating> = team2.iter().map(&rating_of).collect();
        let (p1, p2) = predict(&ratings1, &ratings2);
        let score = (p1 - p2).abs();

        let better = match &best {
            Some((best_score, _, _)) => score < *best_score,
            None => true,
        };
        if better {
            best = Some((score, team1, team2));
        }
    }

    let (team1, team2) = match best {
        Some((_, team1, team2)) => (team1, team2),
        // Unreachable for n > 2, but a random split is always a valid answer
        None => return split_random(selected, rng),
    };

    // Fair coin decides which side is the literal team1
    if rng.gen_bool(0.5) {
        (team2, team1)
    } else {
        (team1, team2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn players(raw: &[&str]) -> Vec<PlayerId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn ratings_of(means: &[(&str, f64)]) -> HashMap<PlayerId, SkillRating> {
        means
            .iter()
            .map(|(id, mean)| {
                (
                    id.to_string(),
                    SkillRating {
                        mean: *mean,
                        spread: 100.0,
                    },
                )
            })
            .collect()
    }

    /// Stub predictor: probability follows total mean difference
    fn mean_predict(a: &[SkillRating], b: &[SkillRating]) -> (f64, f64) {
        let sum_a: f64 = a.iter().map(|r| r.mean).sum();
        let sum_b: f64 = b.iter().map(|r| r.mean).sum();
        let pa = 1.0 / (1.0 + 10f64.powf((sum_b - sum_a) / 400.0));
        (pa, 1.0 - pa)
    }

    #[test]
    fn test_team1_size_rounds_up() {
        assert_eq!(team1_size(1), 1);
        assert_eq!(team1_size(4), 2);
        assert_eq!(team1_size(5), 3);
        assert_eq!(team1_size(8), 4);
    }

    #[test]
    fn test_random_split_covers_everyone() {
        let mut rng = StdRng::seed_from_u64(3);
        let (team1, team2) = split_random(players(&["a", "b", "c", "d", "e"]), &mut rng);

        assert_eq!(team1.len(), 3);
        assert_eq!(team2.len(), 2);

        let mut all: Vec<_> = team1.iter().chain(team2.iter()).cloned().collect();
        all.sort();
        assert_eq!(all, players(&["a", "b", "c", "d", "e"]));
        assert!(team1.iter().all(|p| !team2.contains(p)));
    }

    #[test]
    fn test_fair_split_balances_means() {
        let mut rng = StdRng::seed_from_u64(1);
        let selected = players(&["strong1", "strong2", "weak1", "weak2"]);
        let ratings = ratings_of(&[
            ("strong1", 1900.0),
            ("strong2", 1900.0),
            ("weak1", 1100.0),
            ("weak2", 1100.0),
        ]);

        let (team1, team2) = split_fair(selected, &ratings, mean_predict, &mut rng);

        // One strong and one weak player on each side
        for team in [&team1, &team2] {
            assert_eq!(team.len(), 2);
            assert_eq!(
                team.iter().filter(|p| p.starts_with("strong")).count(),
                1,
                "teams {:?} / {:?} are lopsided",
                team1,
                team2
            );
        }
    }

    #[test]
    fn test_fair_split_deterministic_up_to_coin_flip() {
        let selected = players(&["a", "b", "c", "d", "e", "f"]);
        let ratings = ratings_of(&[
            ("a", 1700.0),
            ("b", 1600.0),
            ("c", 1500.0),
            ("d", 1400.0),
            ("e", 1300.0),
            ("f", 1200.0),
        ]);

        let split = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            split_fair(selected.clone(), &ratings, mean_predict, &mut rng)
        };

        let (t1a, t2a) = split(42);
        let (t1b, t2b) = split(42);
        assert_eq!(t1a, t1b);
        assert_eq!(t2a, t2b);

        // A different seed can only swap the sides, never change the partition
        let (t1c, t2c) = split(43);
        assert!(
            (t1c == t1a && t2c == t2a) || (t1c == t2a && t2c == t1a),
            "partition changed across seeds: {:?}/{:?} vs {:?}/{:?}",
            t1a,
            t2a,
            t1c,
            t2c
        );
    }

    #[test]
    fn test_fair_split_odd_count_rounds_up() {
        let mut rng = StdRng::seed_from_u64(9);
        let selected = players(&["a", "b", "c", "d", "e"]);
        let ratings = ratings_of(&[
            ("a", 1500.0),
            ("b", 1500.0),
            ("c", 1500.0),
            ("d", 1500.0),
            ("e", 1500.0),
        ]);

        let (team1, team2) = split_fair(selected, &ratings, mean_predict, &mut rng);
        let sizes = (team1.len(), team2.len());
        // Sides may be swapped by the coin flip, but the split is 3/2
        assert!(sizes == (3, 2) || sizes == (2, 3));
    }

    #[test]
    fn test_fair_split_two_players_degrades_to_random() {
        let mut rng = StdRng::seed_from_u64(5);
        let (team1, team2) = split_fair(
            players(&["a", "b"]),
            &HashMap::new(),
            mean_predict,
            &mut rng,
        );
        assert_eq!(team1.len(), 1);
        assert_eq!(team2.len(), 1);
    }

    #[test]
    fn test_fair_split_missing_ratings_use_prior() {
        let mut rng = StdRng::seed_from_u64(5);
        // No ratings provided at all: every combination scores identically,
        // the first one wins, team sizes still hold
        let (team1, team2) = split_fair(
            players(&["a", "b", "c", "d"]),
            &HashMap::new(),
            mean_predict,
            &mut rng,
        );
        assert_eq!(team1.len(), 2);
        assert_eq!(team2.len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn prop_random_split_partitions(count in 1usize..12, seed in 0u64..500) {
            let selected: Vec<PlayerId> = (0..count).map(|i| format!("p{}", i)).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let (team1, team2) = split_random(selected.clone(), &mut rng);

            proptest::prop_assert_eq!(team1.len(), team1_size(count));
            proptest::prop_assert_eq!(team1.len() + team2.len(), count);

            let mut all: Vec<_> = team1.iter().chain(team2.iter()).cloned().collect();
            all.sort();
            let mut expected = selected;
            expected.sort();
            proptest::prop_assert_eq!(all, expected);
        }
    }
}
