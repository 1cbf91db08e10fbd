use std::collections::BTreeMap;

use serde::Serialize;

/// Chart-ready bucket labels with their frequencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Histogram {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn bucket_width(max: u64) -> u64 {
    match max {
        0..=10 => 1,
        11..=100 => 10,
        101..=1000 => 100,
        _ => 1000,
    }
}

/// Bucket `counts` with a width chosen from the largest value (1, 10, 100
/// or 1000). Width-1 buckets are labelled with their value, wider ones with
/// the inclusive range `"{key}-{key+width-1}"`.
pub fn bucket(counts: &[u64]) -> Histogram {
    let Some(&max) = counts.iter().max() else {
        return Histogram::default();
    };
    let width = bucket_width(max);

    let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();
    for count in counts {
        *buckets.entry(count / width * width).or_insert(0) += 1;
    }

    let mut histogram = Histogram::default();
    for (key, freq) in buckets {
        let label = if width == 1 {
            key.to_string()
        } else {
            format!("{}-{}", key, key + width - 1)
        };
        histogram.labels.push(label);
        histogram.data.push(freq);
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(bucket(&[]), Histogram::default());
    }

    #[test]
    fn single_small_value_uses_literal_label() {
        let h = bucket(&[5]);
        assert_eq!(h.labels, ["5"]);
        assert_eq!(h.data, [1]);
    }

    #[test]
    fn hundreds_are_grouped_in_ascending_ranges() {
        let h = bucket(&[905, 150, 170]);
        assert_eq!(h.labels, ["100-199", "900-999"]);
        assert_eq!(h.data, [2, 1]);
    }

    #[test]
    fn width_boundaries() {
        assert_eq!(bucket(&[0, 10]).labels, ["0", "10"]);
        assert_eq!(bucket(&[11]).labels, ["10-19"]);
        assert_eq!(bucket(&[3, 100]).labels, ["0-9", "100-109"]);
        assert_eq!(bucket(&[1000]).labels, ["1000-1099"]);
        assert_eq!(bucket(&[1001, 42]).labels, ["0-999", "1000-1999"]);
    }

    #[test]
    fn all_zero_counts() {
        let h = bucket(&[0, 0, 0]);
        assert_eq!(h.labels, ["0"]);
        assert_eq!(h.data, [3]);
    }
}
