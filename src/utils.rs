/// Summary statistics over a slice: min / max / mean / population std.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Statistics for a slice of values. An empty slice yields zeros.
pub fn vec_stats(xs: &[f64]) -> Stats {
    if xs.is_empty() {
        return Stats { min: 0.0, max: 0.0, mean: 0.0, std: 0.0 };
    }
    let mut mn = xs[0];
    let mut mx = xs[0];
    let mut sum = 0.0;
    for &v in xs {
        if v < mn {
            mn = v;
        }
        if v > mx {
            mx = v;
        }
        sum += v;
    }
    let mean = sum / xs.len() as f64;
    let var = xs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    Stats { min: mn, max: mx, mean, std: var.sqrt() }
}

pub fn has_non_finite(xs: &[f64]) -> bool {
    xs.iter().any(|&v| !v.is_finite())
}

/// Index of the first maximum. Returns 0 for an empty slice.
pub fn argmax(xs: &[f64]) -> usize {
    let mut best = 0;
    for i in 1..xs.len() {
        if xs[i] > xs[best] {
            best = i;
        }
    }
    best
}

/// Softmax shifted by the max so large inputs do not overflow.
pub fn softmax(xs: &[f64]) -> Vec<f64> {
    if xs.is_empty() {
        return Vec::new();
    }
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = xs.iter().map(|x| (x - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

pub fn one_hot(index: usize, num_class: usize) -> Vec<f64> {
    let mut v = vec![0.0; num_class];
    if index < num_class {
        v[index] = 1.0;
    }
    v
}

/// Round to a fixed number of decimal digits.
pub fn round_digits(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}
