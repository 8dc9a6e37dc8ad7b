//! Human-readable explanation of an estimate.

use crate::analysis::aggregator::SIMILARITY_THRESHOLD;
use crate::models::Estimate;

/// Format a value as whole US dollars, e.g. `$1,234,567` or `-$50`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    format!("{}${}", sign, group_thousands(&digits))
}

/// Insert `,` between groups of three digits.
pub fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Format a plain number with thousands separators and up to
/// `decimals` fractional digits, trailing zeros trimmed.
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };

    if frac_part.is_empty() {
        format!("{}{}", sign, group_thousands(int_part))
    } else {
        format!("{}{}.{}", sign, group_thousands(int_part), frac_part)
    }
}

/// Build the explanation shown next to an estimate.
///
/// Lines end in two spaces so Markdown renders them as hard breaks.
pub fn build_narrative(estimate: &Estimate) -> String {
    let variation = estimate.cv * 100.0;
    let threshold = SIMILARITY_THRESHOLD * 100.0;

    let mut text = String::new();
    text.push_str(&format!(
        "Analysis based on the largest cluster of similar properties ({} of {} properties) in {}:  \n\n",
        estimate.cluster_size,
        estimate.total_valid,
        estimate.locality.to_uppercase()
    ));
    text.push_str(&format!(
        "• Average price per acre: {}  \n",
        format_currency(estimate.mean_unit_price)
    ));
    text.push_str(&format!(
        "• Range within cluster: {} to {} per acre  \n",
        format_currency(estimate.min),
        format_currency(estimate.max)
    ));
    text.push_str(&format!("• Price variation: {:.1}%  \n", variation));
    text.push_str(&format!(
        "• Your property: {:.2} acres  \n",
        estimate.target_area
    ));
    text.push_str(&format!(
        "• Outliers excluded: {} properties  \n\n",
        estimate.outliers
    ));
    text.push_str(&format!(
        "This estimate uses similarity clustering to group properties with similar prices per acre \
         (within {:.0}% of each other) and selects the largest cluster for analysis. This ensures your \
         estimate is based on the most common price pattern in the market, ignoring outliers. The \
         coefficient of variation ({:.1}%) indicates the spread of prices within the cluster - a lower \
         percentage suggests more consistent pricing.",
        threshold, variation
    ));

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_estimate() -> Estimate {
        Estimate {
            mean_unit_price: 10250.0,
            std_dev: 250.0,
            cv: 250.0 / 10250.0,
            min: 10000.0,
            max: 10500.0,
            cluster_size: 2,
            total_valid: 3,
            outliers: 1,
            cluster_count: 2,
            cluster_sizes: vec![2, 1],
            target_area: 10.0,
            projected_price: 102500.0,
            confidence: 95.12195121951218,
            locality: "Austin".to_string(),
            narrative: String::new(),
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.4), "$999");
        assert_eq!(format_currency(1000.0), "$1,000");
        assert_eq!(format_currency(10250.5), "$10,251");
        assert_eq!(format_currency(1234567.0), "$1,234,567");
        assert_eq!(format_currency(-50.0), "-$50");
        assert_eq!(format_currency(-1234.0), "-$1,234");
        assert_eq!(format_currency(f64::NAN), "-");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0, 2), "10");
        assert_eq!(format_number(2.5, 2), "2.5");
        assert_eq!(format_number(12345.678, 2), "12,345.68");
        assert_eq!(format_number(-0.001, 2), "0");
    }

    #[test]
    fn test_build_narrative_reports_figures() {
        let text = build_narrative(&sample_estimate());

        assert!(text.contains("(2 of 3 properties) in AUSTIN"));
        assert!(text.contains("Average price per acre: $10,250"));
        assert!(text.contains("$10,000 to $10,500 per acre"));
        assert!(text.contains("Price variation: 2.4%"));
        assert!(text.contains("Your property: 10.00 acres"));
        assert!(text.contains("Outliers excluded: 1 properties"));
        assert!(text.contains("within 25% of each other"));
    }
}
