//! The ordered class names a classifier's output positions map onto

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

/// The PlantVillage class ordering the bundled model was trained with
pub const PLANT_VILLAGE_CLASSES: [&str; 38] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    "Blueberry___healthy",
    "Cherry_(including_sour)___Powdery_mildew",
    "Cherry_(including_sour)___healthy",
    "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn_(maize)___Common_rust_",
    "Corn_(maize)___Northern_Leaf_Blight",
    "Corn_(maize)___healthy",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Grape___healthy",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___Leaf_scorch",
    "Strawberry___healthy",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
];

/// The built-in table, in training order
pub static PLANT_VILLAGE: Lazy<LabelTable> =
    Lazy::new(|| LabelTable::new(PLANT_VILLAGE_CLASSES.iter().map(|s| s.to_string())));

/// An immutable, ordered list of class names. Index `i` names output
/// position `i` of the model
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: impl IntoIterator<Item = String>) -> Self {
        LabelTable {
            labels: labels.into_iter().collect(),
        }
    }

    /// Read a table from a file holding one label per line. Blank lines are
    /// skipped, surrounding whitespace is trimmed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        let table = Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );

        if table.is_empty() {
            return Err(anyhow!("labels file {} has no labels", path.display()));
        }
        Ok(table)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        PLANT_VILLAGE.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_plant_village_order() {
        let table = LabelTable::default();
        assert_eq!(table.len(), 38);
        assert_eq!(table.get(0), Some("Apple___Apple_scab"));
        assert_eq!(table.get(3), Some("Apple___healthy"));
        assert_eq!(table.get(37), Some("Tomato___healthy"));
        assert_eq!(table.get(38), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "healthy\n\n  rust  \nblight").unwrap();

        let table = LabelTable::from_file(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1), Some("rust"));
    }

    #[test]
    fn test_from_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(LabelTable::from_file(file.path()).is_err());
    }

    #[test]
    fn test_from_missing_file() {
        assert!(LabelTable::from_file("does/not/exist.txt").is_err());
    }
}
