use std::env;

pub(crate) const KERNEL_CACHE_SIZE_VAR: &str = "ONNXRS_KERNEL_CACHE_SIZE";
pub(crate) const PLATFORM_VAR: &str = "ONNXRS_PLATFORM";
pub(crate) const DEFAULT_PLATFORMS_VAR: &str = "ONNXRS_DEFAULT_PLATFORMS";

/// Reads a variable, treating unset and blank values alike.
pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Splits a comma separated platform list, lowercasing and dropping blanks.
pub(crate) fn parse_platform_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_list_is_normalized() {
        assert_eq!(
            parse_platform_list(" CPU, cuda ,,tpu"),
            vec!["cpu".to_string(), "cuda".to_string(), "tpu".to_string()]
        );
        assert!(parse_platform_list(" , ").is_empty());
    }
}
