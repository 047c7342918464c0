//! Public link construction.

/// Builds the public URLs handed out for a stored file.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    /// `base` is the externally visible origin, e.g.
    /// `https://dl.example.org`. Trailing slashes are trimmed.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// In-browser player page.
    #[must_use]
    pub fn player_url(&self, message_id: i64, token: &str) -> String {
        format!("{}/player/{message_id}?hash={token}", self.base)
    }

    /// Direct byte-serving URL, rendered inline by browsers.
    #[must_use]
    pub fn stream_url(&self, message_id: i64, token: &str) -> String {
        format!("{}/dl/{message_id}?hash={token}", self.base)
    }

    /// Byte-serving URL that forces a download prompt.
    #[must_use]
    pub fn download_url(&self, message_id: i64, token: &str) -> String {
        format!("{}/dl/{message_id}?hash={token}&d=true", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_all_three_link_forms() {
        let links = LinkBuilder::new("https://dl.example.org");
        assert_eq!(
            links.player_url(42, "a3af3c"),
            "https://dl.example.org/player/42?hash=a3af3c"
        );
        assert_eq!(
            links.stream_url(42, "a3af3c"),
            "https://dl.example.org/dl/42?hash=a3af3c"
        );
        assert_eq!(
            links.download_url(42, "a3af3c"),
            "https://dl.example.org/dl/42?hash=a3af3c&d=true"
        );
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let links = LinkBuilder::new("http://127.0.0.1:8080///");
        assert_eq!(
            links.stream_url(1, "ff00aa"),
            "http://127.0.0.1:8080/dl/1?hash=ff00aa"
        );
    }
}
