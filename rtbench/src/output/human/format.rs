use std::time::Duration;

pub(crate) fn format_duration_single(d: Duration) -> String {
    // One rounded component in us, ms or s.
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }

    format!("{}us", round_div(total_ns, NS_PER_US))
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}%", v * 100.0)
    } else {
        "0.00%".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_use_a_single_unit() {
        assert_eq!(format_duration_single(Duration::from_micros(250)), "250us");
        assert_eq!(format_duration_single(Duration::from_micros(1_500)), "2ms");
        assert_eq!(format_duration_single(Duration::from_millis(2_499)), "2s");
    }

    #[test]
    fn non_finite_rates_render_as_zero() {
        assert_eq!(format_rate(f64::NAN), "0");
        assert_eq!(format_percent(f64::INFINITY), "0.00%");
        assert_eq!(format_percent(1.0), "100.00%");
    }
}
