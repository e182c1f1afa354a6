use crate::inference::model::InferenceError;

pub const TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedClass {
    pub class_id: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub best: RankedClass,
    pub top: Vec<RankedClass>,
}

/// Ranks a class distribution into the top-1 class and the top `TOP_K` classes.
///
/// Confidences are clamped into `[0, 1]` with NaN read as zero. Ties keep the
/// lower class id first, so the top-1 class is always the first maximum.
pub fn rank(probabilities: &[f32], known_classes: usize) -> Result<Ranking, InferenceError> {
    if probabilities.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }

    let mut ranked: Vec<RankedClass> = probabilities
        .iter()
        .enumerate()
        .map(|(class_id, p)| RankedClass {
            class_id,
            confidence: clamp_confidence(*p),
        })
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let best = ranked[0];
    if best.class_id >= known_classes {
        return Err(InferenceError::UnknownClass {
            index: best.class_id,
            known: known_classes,
        });
    }

    let top = ranked
        .into_iter()
        .filter(|entry| entry.class_id < known_classes)
        .take(TOP_K)
        .collect();

    Ok(Ranking { best, top })
}

fn clamp_confidence(p: f32) -> f32 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_argmax_and_top_three_descending() {
        let ranking = rank(&[0.05, 0.6, 0.1, 0.2, 0.05], 5).unwrap();

        assert_eq!(ranking.best.class_id, 1);
        assert!((ranking.best.confidence - 0.6).abs() < f32::EPSILON);

        let ids: Vec<usize> = ranking.top.iter().map(|r| r.class_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(
            ranking
                .top
                .windows(2)
                .all(|pair| pair[0].confidence >= pair[1].confidence)
        );
    }

    #[test]
    fn best_confidence_bounds_the_top_list() {
        let mut distribution = vec![0.0f32; 43];
        for (i, p) in distribution.iter_mut().enumerate() {
            *p = ((i * 37) % 43) as f32 / 1000.0;
        }
        let ranking = rank(&distribution, 43).unwrap();

        assert_eq!(ranking.top.len(), TOP_K);
        assert_eq!(ranking.top[0], ranking.best);
        for entry in &ranking.top {
            assert!((0.0..=1.0).contains(&entry.confidence));
            assert!(ranking.best.confidence >= entry.confidence);
        }
    }

    #[test]
    fn ties_resolve_to_lowest_class_id() {
        let ranking = rank(&[0.25, 0.25, 0.25, 0.25], 4).unwrap();
        assert_eq!(ranking.best.class_id, 0);
        let ids: Vec<usize> = ranking.top.iter().map(|r| r.class_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let ranking = rank(&[f32::NAN, 1.7, -0.3], 3).unwrap();
        assert_eq!(ranking.best.class_id, 1);
        assert_eq!(ranking.best.confidence, 1.0);
        assert!(ranking.top.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[test]
    fn fewer_than_three_classes_gives_shorter_list() {
        let ranking = rank(&[0.3, 0.7], 2).unwrap();
        assert_eq!(ranking.top.len(), 2);
    }

    #[test]
    fn empty_or_unknown_output_is_an_error() {
        assert!(matches!(rank(&[], 43), Err(InferenceError::EmptyOutput)));
        assert!(matches!(
            rank(&[0.1, 0.2, 0.7], 2),
            Err(InferenceError::UnknownClass { index: 2, known: 2 })
        ));
    }
}
