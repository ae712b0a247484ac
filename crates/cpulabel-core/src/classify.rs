//! CPU model classification

use crate::CpuSpeed;

/// Map a CPU model string to its `cpu-speed` label.
///
/// Case-sensitive substring checks, first match wins:
/// no "Intel" is `unknown`, then "Xeon" is `fast`, "Core" is `medium`,
/// anything else is `slow`.
pub fn classify(signal: &str) -> CpuSpeed {
    if !signal.contains("Intel") {
        return CpuSpeed::Unknown;
    }

    if signal.contains("Xeon") {
        CpuSpeed::Fast
    } else if signal.contains("Core") {
        CpuSpeed::Medium
    } else {
        CpuSpeed::Slow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reference_models() {
        assert_eq!(classify(""), CpuSpeed::Unknown);
        assert_eq!(classify("Intel Xeon Gold 6142"), CpuSpeed::Fast);
        assert_eq!(classify("Intel Core i7-9700K"), CpuSpeed::Medium);
        assert_eq!(classify("Intel Pentium"), CpuSpeed::Slow);
        assert_eq!(classify("AMD Ryzen 9"), CpuSpeed::Unknown);
    }

    #[test]
    fn test_classify_lscpu_style_models() {
        assert_eq!(
            classify("Intel(R) Xeon(R) Platinum 8375C CPU @ 2.90GHz"),
            CpuSpeed::Fast
        );
        assert_eq!(
            classify("11th Gen Intel(R) Core(TM) i7-1185G7 @ 3.00GHz"),
            CpuSpeed::Medium
        );
        assert_eq!(classify("Intel(R) Celeron(R) N5105 @ 2.00GHz"), CpuSpeed::Slow);
        assert_eq!(classify("AMD EPYC 7R13 Processor"), CpuSpeed::Unknown);
        assert_eq!(classify("Neoverse-N1"), CpuSpeed::Unknown);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("intel xeon"), CpuSpeed::Unknown);
        assert_eq!(classify("Intel xeon"), CpuSpeed::Slow);
        assert_eq!(classify("Intel core"), CpuSpeed::Slow);
    }

    #[test]
    fn test_classify_xeon_wins_over_core() {
        assert_eq!(classify("Intel Core Xeon hybrid"), CpuSpeed::Fast);
        // Xeon without Intel is still unknown
        assert_eq!(classify("Xeon"), CpuSpeed::Unknown);
    }
}
