//! # Utility Functions Module
//!
//! Small helpers shared by the chain runner, the remote client and the CLI:
//! argument vectors for external tools, size formatting and the
//! percent-reduction arithmetic every engine reports with.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// use asset_smusher::utils::to_string_vec;
///
/// let quality = 85;
/// let args = to_string_vec(["--preserve", &format!("-m{}", quality)]);
/// assert_eq!(args, vec!["--preserve".to_string(), "-m85".to_string()]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds a tool option list without importing `to_string_vec`.
///
/// ```rust
/// use asset_smusher::args;
///
/// let opts = args!["-z", 3, "-q"];
/// assert_eq!(opts, vec!["-z", "3", "-q"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Percent size reduction: `100 - round(final / initial * 100)`, never negative.
///
/// An empty original reports 0.
pub fn percent_reduction(initial_size: u64, final_size: u64) -> u8 {
    if initial_size == 0 {
        return 0;
    }
    let kept = (final_size as f64 / initial_size as f64 * 100.0).round();
    (100.0 - kept).clamp(0.0, 100.0) as u8
}

/// Human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_vec_mixed_types() {
        let num = 42;
        let result = to_string_vec(["-m", &num.to_string(), "--strip-none"]);
        assert_eq!(result, vec!["-m".to_string(), "42".to_string(), "--strip-none".to_string()]);
    }

    #[test]
    fn test_args_macro() {
        let level = 3;
        let result = args!["-z", level, "-q"];
        assert_eq!(result, vec!["-z".to_string(), "3".to_string(), "-q".to_string()]);
    }

    #[test]
    fn test_percent_reduction() {
        assert_eq!(percent_reduction(2_000_000, 1_500_000), 25);
        assert_eq!(percent_reduction(1000, 1000), 0);
        assert_eq!(percent_reduction(1000, 1200), 0);
        assert_eq!(percent_reduction(0, 10), 0);
        // 33.3% kept rounds to 33
        assert_eq!(percent_reduction(3, 1), 67);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
