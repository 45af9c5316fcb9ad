pub fn format_number(num: u64) -> String {
    let num_str = num.to_string();
    let chars: Vec<char> = num_str.chars().collect();
    let mut result = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Renders a duration as `H:MM:SS` from one hour upwards, `MM:SS` below.
pub fn format_duration(total_secs: u64) -> String {
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Keeps alphanumerics and spaces only. Never returns an empty name.
pub fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect();
    let cleaned = cleaned.trim_end();

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(100), "100");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3725), "1:02:05");
        assert_eq!(format_duration(125), "02:05");
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(3599), "59:59");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(36125), "10:02:05");
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(
            sanitize_file_stem("Rick Astley - Never Gonna Give You Up (Official Video)"),
            "Rick Astley  Never Gonna Give You Up Official Video"
        );
        assert_eq!(sanitize_file_stem("a/b\\c:d*e?"), "abcde");
        assert_eq!(sanitize_file_stem("Привет мир"), "Привет мир");
        assert_eq!(sanitize_file_stem("trailing   "), "trailing");
        assert_eq!(sanitize_file_stem("!!!"), "video");
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(512 * 1024), 0.5);
    }
}
