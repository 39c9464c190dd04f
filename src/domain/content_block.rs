/// A section of a newsletter issue body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub sub_heading: String,
    /// Rich text, rendered as HTML.
    pub text_content: String,
    #[serde(default)]
    pub thumbnail: Option<url::Url>,
}

impl ContentBlock {
    const MAX_HEADING_LENGTH: usize = 150;

    /// Check the length limits of the headings.
    pub fn validate(&self) -> Result<(), String> {
        use unicode_segmentation::UnicodeSegmentation;

        for (field, value) in [("heading", &self.heading), ("sub_heading", &self.sub_heading)] {
            if value.trim().is_empty() {
                return Err(format!("A content block {field} cannot be empty."));
            }
            if value.graphemes(true).count() > Self::MAX_HEADING_LENGTH {
                return Err(format!(
                    "A content block {field} cannot be longer than {} characters.",
                    Self::MAX_HEADING_LENGTH
                ));
            }
        }
        Ok(())
    }
}
