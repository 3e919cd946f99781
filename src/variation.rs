//! Variation matching between an original image and files found next to it.

/// Returns true if `candidate` looks like a variation of `original`.
///
/// Both names are cut at their first `.` and the stems compared. Any sibling
/// sharing the stem matches, whatever its suffix: `photo.0x260.jpg` and
/// `photo.-portrait.jpg` both match `photo.jpg`, and so does `photo.png`.
pub fn is_variation(original: &str, candidate: &str) -> bool {
    if original == candidate {
        return false;
    }
    stem(original) == stem(candidate)
}

fn stem(name: &str) -> &str {
    name.split_once('.').map(|(stem, _)| stem).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names_are_not_variations() {
        assert!(!is_variation("123.jpg", "123.jpg"));
    }

    #[test]
    fn test_same_stem_is_variation() {
        assert!(is_variation("123.jpg", "123.0x260.jpg"));
        assert!(is_variation("123.jpg", "123.-portrait.jpg"));
        assert!(is_variation("123.jpg", "123.png"));
    }

    #[test]
    fn test_different_stem_is_not_variation() {
        assert!(!is_variation("123.jpg", "456.jpg"));
        assert!(!is_variation("123.jpg", "1234.0x260.jpg"));
        assert!(!is_variation("photo.jpg", "photo-2.jpg"));
    }

    #[test]
    fn test_names_without_dot_compare_empty_stems() {
        // no `.` means an empty stem, so two dot-less names match each other
        assert!(is_variation("README", "LICENSE"));
        assert!(!is_variation("README", "a.jpg"));
    }
}
