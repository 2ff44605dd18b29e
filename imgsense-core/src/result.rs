use serde::Serialize;

use crate::{
    error::ClassifyError,
    labels::LabelSet,
    topk::{best_match, top_k},
};

/// One reported class: its index, name and probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

impl LabelScore {
    /// Probability expressed as a percentage.
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}

/// A label set paired with the probability vector produced for one image.
///
/// Both halves always have the same length; they can only be replaced together.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    labels: LabelSet,
    probabilities: Vec<f32>,
}

impl ClassificationResult {
    pub fn new(labels: LabelSet, probabilities: Vec<f32>) -> Result<Self, ClassifyError> {
        ensure_aligned(&labels, &probabilities)?;
        Ok(Self {
            labels,
            probabilities,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    /// Swap in a new pairing. On error the current pairing is left untouched.
    pub fn replace(
        &mut self,
        labels: LabelSet,
        probabilities: Vec<f32>,
    ) -> Result<(), ClassifyError> {
        ensure_aligned(&labels, &probabilities)?;
        self.labels = labels;
        self.probabilities = probabilities;
        Ok(())
    }

    pub fn into_parts(self) -> (LabelSet, Vec<f32>) {
        (self.labels, self.probabilities)
    }

    pub fn score(&self, index: usize) -> Option<LabelScore> {
        Some(LabelScore {
            index,
            label: self.labels.get(index)?.to_string(),
            probability: *self.probabilities.get(index)?,
        })
    }

    /// The most likely class; ties go to the lowest index.
    pub fn best(&self) -> Result<LabelScore, ClassifyError> {
        let index = best_match(&self.probabilities)?;
        Ok(self.score_at(index))
    }

    /// The `k` most likely classes, best first.
    pub fn top(&self, k: usize) -> Result<Vec<LabelScore>, ClassifyError> {
        let indices = top_k(&self.probabilities, k)?;
        Ok(indices.into_iter().map(|i| self.score_at(i)).collect())
    }

    fn score_at(&self, index: usize) -> LabelScore {
        LabelScore {
            index,
            label: self.labels[index].to_string(),
            probability: self.probabilities[index],
        }
    }
}

fn ensure_aligned(labels: &LabelSet, probabilities: &[f32]) -> Result<(), ClassifyError> {
    if labels.len() != probabilities.len() {
        return Err(ClassifyError::Misaligned {
            labels: labels.len(),
            probabilities: probabilities.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SelectionError;

    fn labels(names: &[&str]) -> LabelSet {
        names.iter().copied().collect()
    }

    #[test]
    fn rejects_misaligned_pairing() {
        let err = ClassificationResult::new(labels(&["a", "b"]), vec![0.5]).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Misaligned {
                labels: 2,
                probabilities: 1
            }
        ));
    }

    #[test]
    fn replace_swaps_both_fields_or_neither() {
        let mut result = ClassificationResult::new(labels(&["a"]), vec![1.0]).unwrap();
        assert!(result.replace(labels(&["x", "y"]), vec![0.1]).is_err());
        assert_eq!(result.probabilities(), &[1.0]);
        assert_eq!(result.labels().get(0), Some("a"));

        result
            .replace(labels(&["x", "y"]), vec![0.1, 0.9])
            .expect("aligned replacement");
        assert_eq!(result.best().unwrap().label, "y");
    }

    #[test]
    fn reports_top_scores_with_labels() {
        let result = ClassificationResult::new(
            labels(&["tench", "goldfish", "shark", "hen", "cock"]),
            vec![0.05, 0.02, 0.80, 0.10, 0.03],
        )
        .unwrap();

        let best = result.best().unwrap();
        assert_eq!(best.index, 2);
        assert_eq!(best.label, "shark");
        assert!((best.percent() - 80.0).abs() < 1e-4);

        let names: Vec<_> = result
            .top(3)
            .unwrap()
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(names, vec!["shark", "hen", "tench"]);
    }

    #[test]
    fn selection_errors_propagate() {
        let result = ClassificationResult::new(labels(&["a", "b"]), vec![0.4, 0.6]).unwrap();
        assert!(matches!(
            result.top(3),
            Err(ClassifyError::Selection(SelectionError::InvalidK { k: 3, len: 2 }))
        ));

        let empty = ClassificationResult::new(LabelSet::default(), Vec::new()).unwrap();
        assert!(matches!(
            empty.best(),
            Err(ClassifyError::Selection(SelectionError::EmptyInput))
        ));
    }

    #[test]
    fn score_looks_up_single_entries() {
        let result = ClassificationResult::new(labels(&["a", "b"]), vec![0.4, 0.6]).unwrap();
        assert_eq!(result.score(1).unwrap().probability, 0.6);
        assert!(result.score(2).is_none());
    }
}
