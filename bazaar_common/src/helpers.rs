/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a duration such as `48h`, `30m`, `90s` or a bare number of seconds.
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    let (digits, multiplier) = match value.chars().last()? {
        'h' => (&value[..value.len() - 1], 3600),
        'm' => (&value[..value.len() - 1], 60),
        's' => (&value[..value.len() - 1], 1),
        'd' => (&value[..value.len() - 1], 86_400),
        _ => (value.as_str(), 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}
