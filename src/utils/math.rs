//! Small numeric helpers shared across the pipeline.

/// Returns the index and value of the first maximal element.
///
/// Ties resolve to the earliest index. An empty iterator yields `(0, 0.0)`.
pub fn argmax(values: impl IntoIterator<Item = f32>) -> (usize, f32) {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, best_val)) if v > best_val => best = Some((i, v)),
            _ => {}
        }
    }
    best.unwrap_or((0, 0.0))
}

/// Clamps a value into `[min, max]`.
pub fn clampf(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_finds_the_maximum() {
        assert_eq!(argmax([0.1, 0.7, 0.2]), (1, 0.7));
        assert_eq!(argmax([3.0]), (0, 3.0));
    }

    #[test]
    fn argmax_ties_resolve_to_the_earliest_index() {
        assert_eq!(argmax([0.5, 0.5, 0.1]), (0, 0.5));
        assert_eq!(argmax([0.1, 0.5, 0.5]), (1, 0.5));
    }

    #[test]
    fn argmax_of_empty_input_is_zero() {
        assert_eq!(argmax(std::iter::empty()), (0, 0.0));
    }

    #[test]
    fn clampf_saturates_at_both_bounds() {
        assert_eq!(clampf(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clampf(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clampf(11.5, 0.0, 10.0), 10.0);
    }
}
