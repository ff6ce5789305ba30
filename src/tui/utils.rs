//! Layout helpers shared by the board widgets.

use ratatui::layout::Rect;

/// A rectangle `percent` of `area` in each direction, centered.
pub fn popup_area(area: Rect, percent: u16) -> Rect {
    let scale = |len: u16| (u32::from(len) * u32::from(percent.min(100)) / 100) as u16;
    let width = scale(area.width);
    let height = scale(area.height);
    Rect::new(area.x + (area.width - width) / 2, area.y + (area.height - height) / 2, width, height)
}

/// Greedy word wrap of `text` into at most `max_lines` lines of `width`.
pub fn wrap_words(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            if lines.len() >= max_lines {
                return lines;
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() && lines.len() < max_lines {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_is_centered() {
        let r = popup_area(Rect::new(0, 0, 100, 50), 80);
        assert_eq!(r, Rect::new(10, 5, 80, 40));
    }

    #[test]
    fn test_popup_on_very_wide_terminal() {
        let r = popup_area(Rect::new(0, 0, 2000, 1000), 80);
        assert_eq!(r, Rect::new(200, 100, 1600, 800));
    }

    #[test]
    fn test_wrap_words_caps_lines() {
        assert_eq!(wrap_words("design the login page", 10, 2), vec!["design the", "login page"]);
        assert_eq!(wrap_words("a b c d e f", 3, 2), vec!["a b", "c d"]);
        assert!(wrap_words("", 10, 2).is_empty());
    }
}
