use super::calculator::Points;

pub const MAX_POINTS_PER_PLAYER: Points = 3;

/// Share of the points a team could have earned on one match, in [0, 1].
/// Returns `None` for a team without players.
pub fn match_accuracy(member_points: &[Points]) -> Option<f64> {
    if member_points.is_empty() {
        return None;
    }

    let sum: Points = member_points.iter().sum();
    let max = MAX_POINTS_PER_PLAYER * member_points.len() as Points;
    Some(sum as f64 / max as f64)
}

/// Unweighted mean of the latest value of each tournament series.
/// Tournaments without any recorded value are left out of both the sum and
/// the count; `None` when no tournament qualifies.
pub fn overall_accuracy<I>(latest_values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = latest_values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_accuracy_ratio() {
        assert_eq!(match_accuracy(&[3, 0]), Some(0.5));
        assert_eq!(match_accuracy(&[3, 3, 3]), Some(1.0));
        assert_eq!(match_accuracy(&[0]), Some(0.0));
        assert_eq!(match_accuracy(&[1, 1, 0]), Some(2.0 / 9.0));
    }

    #[test]
    fn test_match_accuracy_without_players() {
        assert_eq!(match_accuracy(&[]), None);
    }

    #[test]
    fn test_overall_accuracy_skips_empty_tournaments() {
        let overall = overall_accuracy(vec![Some(0.5), None, Some(1.0)]);
        assert_eq!(overall, Some(0.75));
    }

    #[test]
    fn test_overall_accuracy_without_data() {
        assert_eq!(overall_accuracy(vec![None, None]), None);
        assert_eq!(overall_accuracy(Vec::new()), None);
    }
}
