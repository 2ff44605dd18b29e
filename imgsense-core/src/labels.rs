use std::{fs, ops::Index, path::Path};

use log::debug;

use crate::error::ClassifyError;

/// Ordered class names, index-aligned with a classifier's probability vector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse a newline-delimited label list, one label per line, in order.
    ///
    /// Blank lines are kept so that later labels stay aligned with their class index. A trailing
    /// newline does not add an entry, and `\r\n` endings are accepted.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::new(text.lines().map(str::to_owned).collect())
    }

    /// Read a label file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifyError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ClassifyError::resource(path, err))?;
        let labels = Self::parse(&text);
        debug!("Loaded {} labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Extend the set with `placeholder` entries until it holds `len` labels.
    pub fn padded_to(&self, len: usize, placeholder: &str) -> Self {
        let mut labels = self.labels.clone();
        if labels.len() < len {
            labels.resize(len, placeholder.to_string());
        }
        Self::new(labels)
    }
}

impl Index<usize> for LabelSet {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.labels[index]
    }
}

impl From<Vec<String>> for LabelSet {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl<'a> FromIterator<&'a str> for LabelSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(str::to_owned).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsense_utils::{fixture_path, load_fixture_text};

    #[test]
    fn parse_keeps_order_and_blank_lines() {
        let labels = LabelSet::parse("cat\ndog\n\nbird\n");
        assert_eq!(labels.len(), 4);
        assert_eq!(&labels[0], "cat");
        assert_eq!(labels.get(2), Some(""));
        assert_eq!(labels.get(3), Some("bird"));
        assert_eq!(labels.get(4), None);
    }

    #[test]
    fn parse_handles_crlf_and_bom() {
        let labels = LabelSet::parse("\u{feff}alpha\r\nbeta\r\n");
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["alpha", "beta"]);
    }

    #[test]
    fn load_reads_fixture_file() {
        let text = load_fixture_text("labels/tiny_labels.txt").expect("fixture");
        let loaded =
            LabelSet::load(fixture_path("labels/tiny_labels.txt").unwrap()).expect("load labels");
        assert_eq!(loaded, LabelSet::parse(&text));
        assert_eq!(loaded.len(), 7);
        assert_eq!(&loaded[5], "water ouzel");
    }

    #[test]
    fn load_missing_file_is_resource_error() {
        let err = LabelSet::load("does/not/exist.txt").expect_err("missing file");
        match err {
            ClassifyError::ResourceUnavailable { path, .. } => {
                assert_eq!(path, Path::new("does/not/exist.txt"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn padded_to_fills_missing_entries() {
        let labels: LabelSet = ["a", "b"].into_iter().collect();
        let padded = labels.padded_to(4, "unknown");
        assert_eq!(padded.iter().collect::<Vec<_>>(), vec!["a", "b", "unknown", "unknown"]);
        assert_eq!(labels.padded_to(1, "unknown"), labels);
    }
}
