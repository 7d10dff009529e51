//! Formatting helpers shared by drivers and command-line tools.

/// Format a frequency in hertz as a human-readable MHz string.
///
/// # Example
///
/// ```
/// use wmodlib_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(868_100_000), "868.100000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u32) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Format bytes as space-separated uppercase hex pairs.
///
/// # Example
///
/// ```
/// use wmodlib_core::format_hex;
///
/// assert_eq!(format_hex(&[0x01, 0xAB, 0xFF]), "01 AB FF");
/// assert_eq!(format_hex(&[]), "");
/// ```
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
