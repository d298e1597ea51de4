use mongodb::bson::{doc, Document};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Escapes regex metacharacters so user input matches literally.
pub fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#' | '-'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive "contains" filter on a field.
pub fn contains_ci(field: &str, needle: &str) -> Document {
    doc! { field: { "$regex": escape_regex(needle.trim()), "$options": "i" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn has_more(&self, total: u64) -> bool {
        self.skip() + u64::from(self.limit) < total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("c++ (intro)"), r"c\+\+ \(intro\)");
        assert_eq!(escape_regex("plain words"), "plain words");
        assert_eq!(escape_regex(".*"), r"\.\*");
    }

    #[test]
    fn test_page_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 20 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, limit: 50 });
        assert_eq!(Page::new(Some(3), Some(0)), Page { page: 3, limit: 1 });
    }

    #[test]
    fn test_page_skip_and_has_more() {
        let page = Page::new(Some(2), Some(10));
        assert_eq!(page.skip(), 10);
        assert!(page.has_more(21));
        assert!(!page.has_more(20));
    }
}
