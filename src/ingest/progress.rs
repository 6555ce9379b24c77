use serde::Serialize;

/// Loaded/total counters for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub loaded: usize,
    pub total: u64,
    pub finished: bool,
}

impl Progress {
    pub fn percent(&self) -> Option<f64> {
        percent_loaded(self.loaded, self.total)
    }
}

/// Percentage of `total` that has been loaded, clamped to `[0, 100]`.
///
/// Returns `None` when the total is unknown (zero): progress is indeterminate.
pub fn percent_loaded(loaded: usize, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_loaded() {
        assert_eq!(percent_loaded(0, 0), None);
        assert_eq!(percent_loaded(10, 0), None);
        assert_eq!(percent_loaded(0, 1000), Some(0.0));
        assert_eq!(percent_loaded(250, 1000), Some(25.0));
        assert_eq!(percent_loaded(1000, 1000), Some(100.0));
    }

    #[test]
    fn test_percent_clamps_overshoot() {
        assert_eq!(percent_loaded(1200, 1000), Some(100.0));
        let progress = Progress {
            loaded: 5,
            total: 4,
            finished: true,
        };
        assert_eq!(progress.percent(), Some(100.0));
    }
}
