//! Small numeric helpers shared by the calculator and the cohort aggregator.

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    pub fn new(values: &[f64], multiplier: f64) -> Option<Self> {
        let q1 = quantile(values, 0.25)?;
        let q3 = quantile(values, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

pub fn count_outliers(values: &[f64], multiplier: f64) -> usize {
    match IqrFence::new(values, multiplier) {
        Some(fence) => values.iter().filter(|v| fence.is_outlier(**v)).count(),
        None => 0,
    }
}

/// Pearson correlation; zero when either axis has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return 0.0;
    }
    let (Some(mx), Some(my)) = (mean(xs), mean(ys)) else {
        return 0.0;
    };
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        var_x += (x - mx).powi(2);
        var_y += (y - my).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares of `ys` on `xs`.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.is_empty() {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let numerator: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let denominator: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if denominator == 0.0 {
        return Some(LinearFit {
            slope: 0.0,
            intercept: my,
            r_squared: 0.0,
        });
    }

    let slope = numerator / denominator;
    let intercept = my - slope * mx;
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).max(0.0)
    };
    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}
