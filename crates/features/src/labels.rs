use serde::{Deserialize, Serialize};

use tastebud_domain::{Result, TasteError};

/// Bijection between the configured group names and `0..K-1`.
///
/// Fit once over the configured group list in encounter order, never
/// over observed training labels, so the mapping is stable even if a
/// group is absent from one split.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(groups: &[String]) -> Result<Self> {
        if groups.is_empty() {
            return Err(TasteError::configuration("no groups to encode"));
        }
        let mut classes = Vec::with_capacity(groups.len());
        for group in groups {
            if classes.contains(group) {
                return Err(TasteError::Configuration(format!(
                    "duplicate group '{}' in label encoder fit",
                    group
                )));
            }
            classes.push(group.clone());
        }
        Ok(Self { classes })
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .iter()
                    .position(|class| class == label)
                    .ok_or_else(|| TasteError::UnknownLabel(label.clone()))
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn inverse(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_preserves_encounter_order() {
        let encoder = LabelEncoder::fit(&["bob".into(), "alice".into()]).unwrap();
        assert_eq!(encoder.classes(), &["bob".to_string(), "alice".to_string()]);
        assert_eq!(
            encoder
                .transform(&["alice".into(), "bob".into()])
                .unwrap(),
            vec![1, 0]
        );
    }

    #[test]
    fn transform_of_classes_is_bijective() {
        let groups = vec!["alice".to_string(), "bob".to_string()];
        let encoder = LabelEncoder::fit(&groups).unwrap();
        let encoded = encoder.transform(encoder.classes()).unwrap();
        assert_eq!(encoded, vec![0, 1]);
        let recovered: Vec<&str> = encoded
            .iter()
            .map(|&index| encoder.inverse(index).unwrap())
            .collect();
        assert_eq!(recovered, vec!["alice", "bob"]);
    }

    #[test]
    fn unknown_label_is_an_error() {
        let encoder = LabelEncoder::fit(&["alice".into(), "bob".into()]).unwrap();
        assert!(matches!(
            encoder.transform(&["carol".into()]),
            Err(TasteError::UnknownLabel(_))
        ));
    }

    #[test]
    fn fit_rejects_duplicates_and_empty() {
        assert!(LabelEncoder::fit(&[]).is_err());
        assert!(LabelEncoder::fit(&["alice".into(), "alice".into()]).is_err());
    }
}
