use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::system::mounts::Reading;

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `/proc` reports memory in kibibytes.
pub fn format_kb(kb: u64) -> String {
    format_bytes(kb.saturating_mul(1024))
}

pub fn format_reading_bytes(reading: &Reading<u64>) -> String {
    match reading {
        Reading::Value(bytes) => format_bytes(*bytes),
        Reading::Unavailable => reading.to_string(),
    }
}

pub fn format_reading_percent(reading: &Reading<f64>) -> String {
    match reading {
        Reading::Value(pct) => format!("{pct:.1}%"),
        Reading::Unavailable => reading.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_a_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_kb(1000), "1000 KB");
        assert_eq!(format_kb(2 * 1024 * 1024), "2.0 GB");
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_unicode("short", 10), "short");
        assert_eq!(truncate_unicode("abcdefghij", 5), "abcd\u{2026}");
        assert_eq!(truncate_unicode("日本語テキスト", 5), "日本\u{2026}");
    }

    #[test]
    fn readings_render_marker() {
        assert_eq!(format_reading_bytes(&Reading::Unavailable), "unavailable");
        assert_eq!(format_reading_percent(&Reading::Value(12.345)), "12.3%");
    }
}
