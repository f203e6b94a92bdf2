//! Small display and filesystem helpers, public for embedders as well.
//!
//! The pipeline renders scores with [`to_fixed`] in its logs and the rule
//! loader checks its directory with [`is_file_exist`].

use std::path::Path;

/// Format `n` with `prec` decimals, then drop trailing fractional zeros.
///
/// `to_fixed(1.2300, 4) == "1.23"`, `to_fixed(2.0, 3) == "2"`. Integer
/// digits are never trimmed.
pub fn to_fixed(n: f64, prec: usize) -> String {
    let s = format!("{:.*}", prec, n);
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Whether `path` exists. Errors other than "not found" count as existing.
pub fn is_file_exist(path: impl AsRef<Path>) -> bool {
    match std::fs::metadata(path) {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fixed_trims_trailing_zeros() {
        assert_eq!(to_fixed(1.23, 4), "1.23");
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(2.0, 3), "2");
        assert_eq!(to_fixed(-0.5, 2), "-0.5");
    }

    #[test]
    fn to_fixed_zero_precision_keeps_integer_digits() {
        assert_eq!(to_fixed(120.0, 0), "120");
        assert_eq!(to_fixed(120.0, 2), "120");
        assert_eq!(to_fixed(7.6, 0), "8");
    }

    #[test]
    fn is_file_exist_checks_the_filesystem() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("present.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(is_file_exist(&file));
        assert!(is_file_exist(dir.path()));
        assert!(!is_file_exist(dir.path().join("missing.txt")));
    }
}
