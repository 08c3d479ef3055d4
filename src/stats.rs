/// Arithmetic mean of a sample set, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean after discarding the single lowest and single highest value.
///
/// Requires at least three samples so that something remains after
/// trimming; smaller sets yield `None`.
pub fn trimmed_mean(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    mean(&sorted[1..sorted.len() - 1])
}
