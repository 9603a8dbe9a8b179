use url::Url;

/// A full-page navigation the host has to perform.
///
/// Returned instead of navigating from within this crate. Whatever the host still had to do
/// before leaving the page was already done when this value was produced; the only thing left
/// to do is to follow it.
#[must_use = "the flow only continues once the host navigates to this url"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    url: Url,
}

impl Redirect {
    pub(crate) fn to(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
