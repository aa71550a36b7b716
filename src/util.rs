use std::{path::Path, str::FromStr};

use directories::BaseDirs;
use unicode_width::UnicodeWidthStr;

pub fn pad<S: AsRef<str>>(s: S, pad: usize) -> String {
    let s = s.as_ref();
    let mut out = String::with_capacity(s.len() + pad * 2);
    for _ in 0..pad {
        out.push(' ');
    }
    out.push_str(s);
    for _ in 0..pad {
        out.push(' ');
    }
    out
}

/// Left-align `s` in a cell of `width` terminal columns, truncating with `…`.
pub fn fit(s: &str, width: usize) -> String {
    let current = s.width();
    if current <= width {
        let mut out = String::with_capacity(s.len() + width - current);
        out.push_str(s);
        out.extend(std::iter::repeat_n(' ', width - current));
        return out;
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    used += 1;
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    out
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim(),
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON"
    )
}

/// Parse an override value, warning about and ignoring garbage.
pub fn parse_override<T: FromStr>(name: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(env = name, value = %raw, "Ignoring invalid override");
            None
        }
    }
}

pub fn abbreviate_home(path: &Path) -> String {
    let Some(base_dirs) = BaseDirs::new() else {
        return path.display().to_string();
    };
    let home = base_dirs.home_dir();
    if let Ok(rest) = path.strip_prefix(home) {
        if rest.as_os_str().is_empty() {
            "~".to_string()
        } else {
            format!("~/{}", rest.display())
        }
    } else {
        path.display().to_string()
    }
}

/// Reduce `raw` to `[a-z0-9_-]` so it can be used as part of a file name.
pub fn sanitize_component(raw: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
