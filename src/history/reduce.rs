use super::config::Reduction;

/// Collapse one bucket's quantities into a single value. `values` must be non-empty.
pub fn reduce(values: &[u32], method: Reduction) -> u64 {
    match method {
        Reduction::Sum => values.iter().map(|&v| u64::from(v)).sum(),
        Reduction::Max => values.iter().copied().max().map(u64::from).unwrap_or(0),
        Reduction::Average => {
            if values.is_empty() {
                return 0;
            }
            let total: u64 = values.iter().map(|&v| u64::from(v)).sum();
            (total as f64 / values.len() as f64).round() as u64
        }
        Reduction::Median => median(values),
    }
}

fn median(values: &[u32]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        u64::from(sorted[mid])
    } else {
        let pair = u64::from(sorted[mid - 1]) + u64::from(sorted[mid]);
        (pair as f64 / 2.0).round() as u64
    }
}
