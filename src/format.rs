// Human-readable sizes and rates for logs and dumps.

const UNIT_PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Binary units (1024): `512 B`, `1.50 KB`, `2.00 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let (div, exp) = scale(bytes, UNIT);
    format!("{:.2} {}B", bytes as f64 / div as f64, UNIT_PREFIXES[exp])
}

/// Decimal units (1000), as link speeds are quoted: `999 B/s`, `1.5 KB/s`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    const UNIT: u64 = 1000;
    let rate = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec as u64
    } else {
        0
    };
    if rate < UNIT {
        return format!("{rate} B/s");
    }
    let (div, exp) = scale(rate, UNIT);
    format!("{:.1} {}B/s", rate as f64 / div as f64, UNIT_PREFIXES[exp])
}

fn scale(value: u64, unit: u64) -> (u64, usize) {
    let mut div = unit;
    let mut exp = 0;
    let mut n = value / unit;
    while n >= unit && exp + 1 < UNIT_PREFIXES.len() {
        div *= unit;
        exp += 1;
        n /= unit;
    }
    (div, exp)
}
