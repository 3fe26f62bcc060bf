//! Curated lookup tables: object categories and detection-score multipliers.
//!
//! The category membership lists grow over time, so they live in data rather
//! than branching logic. A TOML file of the form
//!
//! ```toml
//! [categories]
//! people      = ["person"]
//! food_drink  = ["bottle", "cup"]
//! ```
//!
//! replaces the built-in table wholesale. Classes absent from every list map
//! to [`ObjectCategory::Other`].

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::{Error, Result, ladder::ObjectCategory};

// ─── Built-in table ──────────────────────────────────────────────────────────

const DEFAULT_CATEGORIES: &[(ObjectCategory, &[&str])] = &[
  (ObjectCategory::People, &["person"]),
  (ObjectCategory::FoodDrink, &[
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl",
    "banana", "apple", "sandwich", "orange", "broccoli", "carrot",
    "hot dog", "pizza", "donut", "cake",
  ]),
  (ObjectCategory::Electronics, &[
    "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "refrigerator",
  ]),
  (ObjectCategory::Furniture, &[
    "chair", "couch", "potted plant", "bed", "dining table", "toilet",
    "bench",
  ]),
  (ObjectCategory::HouseholdItems, &[
    "sink", "book", "clock", "vase", "scissors", "teddy bear",
    "hair drier", "toothbrush", "umbrella", "handbag", "tie", "suitcase",
    "backpack",
  ]),
  (ObjectCategory::Vehicles, &[
    "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat",
  ]),
  (ObjectCategory::Sports, &[
    "frisbee", "skis", "snowboard", "sports ball", "kite", "baseball bat",
    "baseball glove", "skateboard", "surfboard", "tennis racket",
  ]),
  (ObjectCategory::Animals, &[
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear",
    "zebra", "giraffe",
  ]),
];

/// Per-class multipliers applied to detector confidence; 1.0 otherwise.
pub const DETECTION_SCORE_MULTIPLIERS: &[(&str, f64)] = &[
  ("person", 1.2),
  ("face", 1.2),
  ("bottle", 1.1),
  ("cup", 1.1),
  ("cell phone", 1.1),
];

pub fn detection_multiplier(object_class: &str) -> f64 {
  let class = object_class.to_lowercase();
  DETECTION_SCORE_MULTIPLIERS
    .iter()
    .find(|(c, _)| *c == class)
    .map_or(1.0, |(_, m)| *m)
}

// ─── ObjectCategories ────────────────────────────────────────────────────────

/// Reverse index from object class to its curated category.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCategories {
  by_class: HashMap<String, ObjectCategory>,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
  #[serde(default)]
  categories: BTreeMap<String, Vec<String>>,
}

impl ObjectCategories {
  /// Build from `(category, classes)` lists. A class may appear under at most
  /// one category.
  pub fn from_lists<'a, I, C>(lists: I) -> Result<Self>
  where
    I: IntoIterator<Item = (ObjectCategory, C)>,
    C: IntoIterator<Item = &'a str>,
  {
    let mut by_class = HashMap::new();
    for (category, classes) in lists {
      for class in classes {
        let class = class.trim().to_lowercase();
        if let Some(first) = by_class.insert(class.clone(), category)
          && first != category
        {
          return Err(Error::DuplicateObjectClass {
            class,
            first:  first.to_string(),
            second: category.to_string(),
          });
        }
      }
    }
    Ok(Self { by_class })
  }

  /// Parse a `[categories]` TOML table.
  pub fn from_toml_str(input: &str) -> Result<Self> {
    let file: CategoryFile = toml::from_str(input)?;
    let lists = file
      .categories
      .iter()
      .map(|(name, classes)| Ok((ObjectCategory::parse(name)?, classes)))
      .collect::<Result<Vec<_>>>()?;
    Self::from_lists(
      lists
        .into_iter()
        .map(|(category, classes)| (category, classes.iter().map(String::as_str))),
    )
  }

  pub fn category(&self, object_class: &str) -> ObjectCategory {
    self
      .by_class
      .get(&object_class.trim().to_lowercase())
      .copied()
      .unwrap_or(ObjectCategory::Other)
  }

  pub fn len(&self) -> usize { self.by_class.len() }

  pub fn is_empty(&self) -> bool { self.by_class.is_empty() }
}

impl Default for ObjectCategories {
  fn default() -> Self {
    let by_class = DEFAULT_CATEGORIES
      .iter()
      .flat_map(|(category, classes)| {
        classes.iter().map(move |c| ((*c).to_owned(), *category))
      })
      .collect();
    Self { by_class }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn built_in_table_has_no_duplicate_classes() {
    let rebuilt = ObjectCategories::from_lists(
      DEFAULT_CATEGORIES.iter().map(|(c, classes)| (*c, classes.iter().copied())),
    )
    .unwrap();
    assert_eq!(rebuilt.len(), ObjectCategories::default().len());
  }

  #[test]
  fn known_and_unknown_classes() {
    let cats = ObjectCategories::default();
    assert_eq!(cats.category("person"), ObjectCategory::People);
    assert_eq!(cats.category("Cell Phone"), ObjectCategory::Electronics);
    assert_eq!(cats.category("bottle"), ObjectCategory::FoodDrink);
    assert_eq!(cats.category("stethoscope"), ObjectCategory::Other);
  }

  #[test]
  fn toml_table_replaces_the_defaults() {
    let cats = ObjectCategories::from_toml_str(
      r#"
      [categories]
      people      = ["person", "face"]
      electronics = ["thermometer"]
      "#,
    )
    .unwrap();
    assert_eq!(cats.category("face"), ObjectCategory::People);
    assert_eq!(cats.category("thermometer"), ObjectCategory::Electronics);
    assert_eq!(cats.category("bottle"), ObjectCategory::Other);
  }

  #[test]
  fn duplicate_membership_is_rejected() {
    let err = ObjectCategories::from_toml_str(
      r#"
      [categories]
      people  = ["person"]
      animals = ["person"]
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::DuplicateObjectClass { .. }));
  }

  #[test]
  fn unknown_category_name_is_rejected() {
    assert!(ObjectCategories::from_toml_str("[categories]\nrobots = [\"r2d2\"]").is_err());
  }

  #[test]
  fn multipliers() {
    assert_eq!(detection_multiplier("person"), 1.2);
    assert_eq!(detection_multiplier("Face"), 1.2);
    assert_eq!(detection_multiplier("cell phone"), 1.1);
    assert_eq!(detection_multiplier("dog"), 1.0);
  }
}
