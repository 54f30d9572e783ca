//! CTC (Connectionist Temporal Classification) greedy decoding.
//!
//! Converts a per-timestep character probability matrix into a text string:
//! argmax per step, collapse repeats, drop blanks, average the contributing
//! probabilities into a confidence score.

use crate::utils::math::argmax;
use ndarray::ArrayView2;

/// Greedy CTC decoder over a fixed character list.
///
/// Class `0` is the blank token; class `i` for `i >= 1` maps to
/// `character_list[i - 1]`. The final list entry is reserved padding and is
/// never emitted: a step only contributes when its argmax index is strictly
/// below `character_list.len()`.
#[derive(Debug, Clone)]
pub struct CtcLabelDecode {
    character_list: Vec<String>,
}

impl CtcLabelDecode {
    /// Creates a decoder over the given character list (blank excluded).
    pub fn new(character_list: Vec<String>) -> Self {
        Self { character_list }
    }

    /// Number of entries in the character list.
    pub fn character_count(&self) -> usize {
        self.character_list.len()
    }

    /// Decodes a `(timesteps, classes)` probability matrix.
    ///
    /// Ties in a timestep resolve to the earliest class. A step contributes
    /// a character only when it is not blank, maps inside the character
    /// list's emittable range, and differs from the previous step's argmax
    /// (which is tracked across blanks, so a blank separates repeats).
    ///
    /// Returns the decoded text and the mean probability of the contributing
    /// steps, `0.0` when nothing contributed.
    pub fn decode(&self, probs: &ArrayView2<f32>) -> (String, f32) {
        let mut text = String::new();
        let mut conf_sum = 0.0f32;
        let mut conf_count = 0usize;
        let mut last_index = 0usize;

        for row in probs.outer_iter() {
            let (idx, prob) = argmax(row.iter().copied());
            if idx > 0 && idx < self.character_list.len() && idx != last_index {
                text.push_str(&self.character_list[idx - 1]);
                conf_sum += prob;
                conf_count += 1;
            }
            last_index = idx;
        }

        let confidence = if conf_count > 0 {
            conf_sum / conf_count as f32
        } else {
            0.0
        };
        (text, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn decoder() -> CtcLabelDecode {
        // Dictionary "a", "b" plus the synthetic trailing space entry
        CtcLabelDecode::new(vec!["a".into(), "b".into(), " ".into()])
    }

    /// Rows are (blank, a, b, space) class probabilities.
    fn probs(rows: &[[f32; 4]]) -> Array2<f32> {
        let mut out = Array2::zeros((rows.len(), 4));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        out
    }

    #[test]
    fn adjacent_repeats_collapse() {
        let a = [0.1, 0.8, 0.05, 0.05];
        let b = [0.1, 0.05, 0.8, 0.05];
        let (text, conf) = decoder().decode(&probs(&[a, a, b]).view());
        assert_eq!(text, "ab");
        assert!((conf - 0.8).abs() < 1e-6);
    }

    #[test]
    fn blank_separates_repeats() {
        let a = [0.1, 0.8, 0.05, 0.05];
        let blank = [0.9, 0.05, 0.025, 0.025];
        let (text, _) = decoder().decode(&probs(&[a, blank, a]).view());
        assert_eq!(text, "aa");
    }

    #[test]
    fn non_adjacent_repeats_survive() {
        let a = [0.1, 0.8, 0.05, 0.05];
        let b = [0.1, 0.05, 0.8, 0.05];
        // Both "a" steps contribute because "b" resets the last index
        let (text, _) = decoder().decode(&probs(&[a, b, a]).view());
        assert_eq!(text, "aba");
    }

    #[test]
    fn all_blank_decodes_to_empty_with_zero_confidence() {
        let blank = [0.9, 0.05, 0.025, 0.025];
        let (text, conf) = decoder().decode(&probs(&[blank, blank, blank]).view());
        assert_eq!(text, "");
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn final_class_slot_is_never_emitted() {
        // Argmax lands on the synthetic trailing entry's class
        let space = [0.05, 0.1, 0.05, 0.8];
        let (text, conf) = decoder().decode(&probs(&[space, space]).view());
        assert_eq!(text, "");
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn ties_resolve_to_the_earliest_class() {
        // Blank and "a" tie; the earlier class (blank) must win
        let tie = [0.4, 0.4, 0.1, 0.1];
        let (text, _) = decoder().decode(&probs(&[tie]).view());
        assert_eq!(text, "");
    }

    #[test]
    fn confidence_averages_contributing_steps() {
        let a = [0.1, 0.6, 0.2, 0.1];
        let b = [0.0, 0.05, 0.9, 0.05];
        let (text, conf) = decoder().decode(&probs(&[a, b]).view());
        assert_eq!(text, "ab");
        assert!((conf - 0.75).abs() < 1e-6);
    }
}
