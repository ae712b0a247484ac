//! `lscpu` output parsing

/// Field marker preceding the CPU model in `lscpu` output
pub const MODEL_NAME_MARKER: &str = "Model name:";

/// Extract the CPU model from `lscpu` output.
///
/// Takes the first line that starts with [`MODEL_NAME_MARKER`] (ignoring
/// indentation) and returns the rest of it, trimmed. Lines such as
/// `BIOS Model name:` do not match.
pub fn extract_model_name(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(MODEL_NAME_MARKER))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSCPU_XEON: &str = "\
Architecture:                       x86_64
CPU op-mode(s):                     32-bit, 64-bit
Byte Order:                         Little Endian
CPU(s):                             32
Vendor ID:                          GenuineIntel
BIOS Vendor ID:                     Intel(R) Corporation
Model name:                         Intel(R) Xeon(R) Gold 6142 CPU @ 2.60GHz
BIOS Model name:                    Intel(R) Xeon(R) Gold 6142 CPU @ 2.60GHz
CPU family:                         6
";

    #[test]
    fn test_extract_from_full_output() {
        assert_eq!(
            extract_model_name(LSCPU_XEON),
            Some("Intel(R) Xeon(R) Gold 6142 CPU @ 2.60GHz")
        );
    }

    #[test]
    fn test_bios_line_is_not_the_model() {
        let output = "BIOS Model name: Pentium\nModel name: Intel Core i5\n";
        assert_eq!(extract_model_name(output), Some("Intel Core i5"));

        assert_eq!(extract_model_name("BIOS Model name: Intel Xeon\n"), None);
    }

    #[test]
    fn test_indented_and_colon_heavy_values() {
        let output = "  Model name:   AMD EPYC 7R13: rev B1  \r\n";
        assert_eq!(extract_model_name(output), Some("AMD EPYC 7R13: rev B1"));
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(extract_model_name(""), None);
        assert_eq!(extract_model_name("Architecture: aarch64\n"), None);
        assert_eq!(extract_model_name("model name: lowercase\n"), None);
    }

    #[test]
    fn test_empty_model() {
        assert_eq!(extract_model_name("Model name:\n"), Some(""));
    }
}
