//! Receiver time series reduction: window compression, peak timing and summary statistics.

/// Default compression window for feature extraction
pub const DEFAULT_WINDOW: usize = 10;

/// Downsample a count series by summing fixed-size contiguous windows.
///
/// A trailing partial window is summed as-is, so the output has ceil(len / window) values
/// and the same total as the input. A window of 0 is treated as 1.
pub fn compress(series: &[u64], window: usize) -> Vec<u64> {
    series
        .chunks(window.max(1))
        .map(|chunk| chunk.iter().sum())
        .collect()
}

/// Index of the first maximum, if the series has any nonzero value
fn first_peak(series: &[u64]) -> Option<(usize, u64)> {
    let mut peak: Option<(usize, u64)> = None;
    for (index, value) in series.iter().enumerate() {
        match peak {
            Some((_, max)) if *value <= max => (),
            _ if *value == 0 => (),
            _ => peak = Some((index, *value)),
        }
    }
    peak
}

/// argmax / len, or 0 for an empty or all-zero series. Always in [0, 1).
pub fn peak_time_normalized(series: &[u64]) -> f64 {
    match first_peak(series) {
        Some((index, _)) => index as f64 / series.len() as f64,
        None => 0.0,
    }
}

/// Summary of a raw receiver series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalStatistics {
    pub first_nonzero_index: Option<usize>,
    pub max_value: u64,
    pub max_index: usize,
    pub total: u64,
    pub mean: f64,
    pub std: f64,
    pub skewness: f64,
}

impl SignalStatistics {
    /// Population moments; skewness is the biased Fisher-Pearson coefficient, 0 when
    /// there are fewer than 3 samples or no spread.
    pub fn from_series(series: &[u64]) -> Self {
        if series.is_empty() {
            return Self::default();
        }
        let n = series.len() as f64;
        let total: u64 = series.iter().sum();
        let mean = total as f64 / n;
        let (m2, m3) = series.iter().fold((0.0, 0.0), |(m2, m3), value| {
            let d = *value as f64 - mean;
            (m2 + d * d, m3 + d * d * d)
        });
        let (m2, m3) = (m2 / n, m3 / n);
        let skewness = if series.len() > 2 && m2 > 0.0 {
            m3 / m2.powf(1.5)
        } else {
            0.0
        };
        let (max_index, max_value) = first_peak(series).unwrap_or((0, 0));
        Self {
            first_nonzero_index: series.iter().position(|v| *v != 0),
            max_value,
            max_index,
            total,
            mean,
            std: m2.sqrt(),
            skewness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_example() {
        let series: Vec<u64> = (1..=10).collect();
        let compressed = compress(&series, 5);
        assert_eq!(compressed, vec![15, 40]);
        assert_eq!(compressed.iter().sum::<u64>(), 55);
    }

    #[test]
    fn test_compress_length_and_conservation() {
        for len in 0..40usize {
            let series: Vec<u64> = (0..len as u64).map(|v| (v * 7) % 5).collect();
            for window in 1..12 {
                let compressed = compress(&series, window);
                assert_eq!(compressed.len(), len.div_ceil(window));
                assert_eq!(
                    compressed.iter().sum::<u64>(),
                    series.iter().sum::<u64>()
                );
            }
        }
    }

    #[test]
    fn test_trailing_window_kept_even_if_zero() {
        assert_eq!(compress(&[3, 0, 0, 0, 0], 2), vec![3, 0, 0]);
    }

    #[test]
    fn test_peak_time() {
        assert_eq!(peak_time_normalized(&[0, 0, 5, 1]), 0.5);
        assert_eq!(peak_time_normalized(&[9, 0, 9, 1]), 0.0);
        assert_eq!(peak_time_normalized(&[0, 0, 0]), 0.0);
        assert_eq!(peak_time_normalized(&[]), 0.0);
        let peak = peak_time_normalized(&[0, 0, 0, 0, 1]);
        assert!((0.0..1.0).contains(&peak));
    }

    #[test]
    fn test_statistics() {
        let stats = SignalStatistics::from_series(&[0, 0, 2, 4, 2, 0]);
        assert_eq!(stats.first_nonzero_index, Some(2));
        assert_eq!(stats.max_value, 4);
        assert_eq!(stats.max_index, 3);
        assert_eq!(stats.total, 8);
        assert!((stats.mean - 8.0 / 6.0).abs() < 1e-12);
        let variance: f64 = [0.0, 0.0, 2.0, 4.0, 2.0, 0.0]
            .iter()
            .map(|v: &f64| (v - 8.0 / 6.0).powi(2))
            .sum::<f64>()
            / 6.0;
        assert!((stats.std - variance.sqrt()).abs() < 1e-12);
        assert!(stats.skewness > 0.0);
    }

    #[test]
    fn test_statistics_degenerate() {
        assert_eq!(
            SignalStatistics::from_series(&[]),
            SignalStatistics::default()
        );
        let flat = SignalStatistics::from_series(&[3, 3, 3, 3]);
        assert_eq!(flat.skewness, 0.0);
        assert_eq!(flat.std, 0.0);
        let zeros = SignalStatistics::from_series(&[0, 0]);
        assert_eq!(zeros.first_nonzero_index, None);
    }
}
