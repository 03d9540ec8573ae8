use ordered_float::OrderedFloat;

use super::tmdb::MovieCandidate;

/// Weight of `vote_average` relative to `popularity` in the ranking score.
const VOTE_WEIGHT: f64 = 10.0;

/// Lowercase alphanumerics separated by single spaces.
pub fn normalize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when either normalized title contains the other.
pub fn titles_overlap(a: &str, b: &str) -> bool {
    let a = normalize_title(a);
    let b = normalize_title(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

pub fn same_name(a: &str, b: &str) -> bool {
    let a = normalize_title(a);
    !a.is_empty() && a == normalize_title(b)
}

/// `popularity + 10 × vote_average`; NaN inputs score zero.
pub fn weighted_score(candidate: &MovieCandidate) -> OrderedFloat<f64> {
    let score = candidate.popularity + VOTE_WEIGHT * candidate.vote_average;
    OrderedFloat(if score.is_nan() { 0.0 } else { score })
}

/// Highest score; ties go to the earliest candidate.
fn highest_score<'a, I>(candidates: I) -> Option<&'a MovieCandidate>
where
    I: IntoIterator<Item = &'a MovieCandidate>,
{
    let mut best: Option<(&MovieCandidate, OrderedFloat<f64>)> = None;
    for candidate in candidates {
        let score = weighted_score(candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Ranking step alone: with a positive target year only exact-year candidates
/// compete, otherwise everything does.
pub fn best_for_year(candidates: &[MovieCandidate], year: Option<i32>) -> Option<&MovieCandidate> {
    match year.filter(|y| *y > 0) {
        Some(year) => highest_score(
            candidates
                .iter()
                .filter(|c| c.release_year() == Some(year)),
        ),
        None => highest_score(candidates),
    }
}

/// Full selection used by enrichment. When a year was given and nothing
/// matches it, the top search hit is accepted only if its title overlaps the
/// one parsed from the file.
pub fn select_movie<'a>(
    candidates: &'a [MovieCandidate],
    title: &str,
    year: Option<i32>,
) -> Option<&'a MovieCandidate> {
    if let Some(best) = best_for_year(candidates, year) {
        return Some(best);
    }
    if year.filter(|y| *y > 0).is_none() {
        return None;
    }
    candidates.first().filter(|top| {
        titles_overlap(title, &top.title)
            || top
                .original_title
                .as_deref()
                .is_some_and(|original| titles_overlap(title, original))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, title: &str, date: &str, popularity: f64, vote: f64) -> MovieCandidate {
        MovieCandidate {
            id,
            title: title.to_string(),
            release_date: Some(date.to_string()),
            popularity,
            vote_average: vote,
            ..Default::default()
        }
    }

    #[test]
    fn exact_year_dominates_popularity() {
        let candidates = vec![
            candidate(1, "Dune", "2020-01-01", 900.0, 9.0),
            candidate(2, "Dune", "2023-03-01", 10.0, 6.0),
            candidate(3, "Dune", "2023-10-01", 20.0, 7.0),
        ];
        let picked = best_for_year(&candidates, Some(2023)).unwrap();
        assert_eq!(picked.id, 3);
    }

    #[test]
    fn no_year_ranks_everything() {
        let candidates = vec![
            candidate(1, "Dune", "2020-01-01", 900.0, 9.0),
            candidate(2, "Dune", "2023-03-01", 10.0, 6.0),
        ];
        assert_eq!(best_for_year(&candidates, None).unwrap().id, 1);
        assert_eq!(best_for_year(&candidates, Some(0)).unwrap().id, 1);
    }

    #[test]
    fn ties_keep_first_encountered() {
        let candidates = vec![
            candidate(7, "Twin", "2001-01-01", 50.0, 5.0),
            candidate(8, "Twin", "2001-01-01", 50.0, 5.0),
        ];
        assert_eq!(best_for_year(&candidates, Some(2001)).unwrap().id, 7);
    }

    #[test]
    fn year_miss_falls_back_only_on_title_overlap() {
        let candidates = vec![
            candidate(1, "The Thing", "1982-06-25", 40.0, 8.0),
            candidate(2, "The Thing", "2011-10-14", 20.0, 6.0),
        ];
        let picked = select_movie(&candidates, "The Thing", Some(1983)).unwrap();
        assert_eq!(picked.id, 1);

        let unrelated = vec![candidate(9, "Something Else", "1990-01-01", 99.0, 9.0)];
        assert!(select_movie(&unrelated, "The Thing", Some(1983)).is_none());
    }

    #[test]
    fn empty_candidates_yield_nothing() {
        assert!(select_movie(&[], "Anything", None).is_none());
        assert!(select_movie(&[], "Anything", Some(2020)).is_none());
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(normalize_title("Spider-Man: No Way Home"), "spider man no way home");
        assert!(titles_overlap("Spider Man", "Spider-Man: No Way Home"));
        assert!(same_name("AC/DC", "ac dc"));
        assert!(!same_name("", ""));
    }
}
