use shared::dto::Label;

/// Reduces chunk verdicts to the document label: the most severe label
/// present wins, however many chunks disagree. No chunks means
/// `Unclassified`.
pub fn aggregate(results: &[(Label, f64)]) -> Label {
    results
        .iter()
        .map(|(label, _)| *label)
        .max()
        .unwrap_or(Label::Unclassified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn empty_is_unclassified() {
        assert_eq!(aggregate(&[]), Label::Unclassified);
    }

    #[test]
    fn single_severe_chunk_vetoes() {
        let results = [
            (Label::Internal, 0.8),
            (Label::Public, 0.7),
            (Label::Confidential, 0.6),
        ];
        assert_eq!(aggregate(&results), Label::Confidential);
    }

    #[test]
    fn unclassified_chunks_never_win_over_a_verdict() {
        let results = [
            (Label::Unclassified, 0.0),
            (Label::Public, 0.9),
            (Label::Unclassified, 0.4),
        ];
        assert_eq!(aggregate(&results), Label::Public);
    }

    #[test]
    fn result_is_the_maximum_for_every_pair_and_order() {
        for a in Label::iter() {
            for b in Label::iter() {
                for c in Label::iter() {
                    let expected = a.max(b).max(c);
                    let perms = [[a, b, c], [a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]];
                    for perm in perms {
                        let results: Vec<_> = perm.iter().map(|l| (*l, 0.9)).collect();
                        assert_eq!(aggregate(&results), expected);
                    }
                }
            }
        }
    }
}
