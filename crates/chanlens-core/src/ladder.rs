//! Threshold ladders and the categorical labels they produce.
//!
//! A ladder is an ordered table of `(lower_bound, label)` rungs evaluated
//! highest-first; the first rung whose bound the value meets wins, so every
//! boundary is inclusive on the higher bucket. Values below every rung (and
//! NaN) fall through to the floor label.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Ladder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Ladder<L: 'static> {
  rungs: &'static [(f64, L)],
  floor: L,
}

impl<L: Copy> Ladder<L> {
  /// `rungs` must be sorted by descending bound.
  pub const fn new(rungs: &'static [(f64, L)], floor: L) -> Self {
    Self { rungs, floor }
  }

  pub fn classify(&self, value: f64) -> L {
    self
      .rungs
      .iter()
      .find(|(bound, _)| value >= *bound)
      .map_or(self.floor, |(_, label)| *label)
  }

  pub fn rungs(&self) -> &'static [(f64, L)] { self.rungs }

  pub fn floor(&self) -> L { self.floor }
}

// ─── Labels ──────────────────────────────────────────────────────────────────

/// Declares a label enum whose snake_case string form is shared by serde (API
/// bodies) and strum (storage columns).
macro_rules! label {
  ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
      Serialize, Deserialize,
      strum::Display, strum::EnumString, strum::IntoStaticStr, strum::EnumIter,
    )]
    #[serde(rename_all = "snake_case")]
    #[strum(serialize_all = "snake_case")]
    pub enum $name {
      $($variant),+
    }

    impl $name {
      pub fn as_str(&self) -> &'static str { (*self).into() }

      /// Parse the stored string form.
      pub fn parse(s: &str) -> Result<Self> {
        s.parse().map_err(|_| Error::UnknownLabel {
          kind:  stringify!($name),
          label: s.to_owned(),
        })
      }
    }
  };
}

label! {
  /// Classification of a message's content; first matching rule wins.
  MessageType { Link, Mention, Hashtag, Media, LongText, Regular }
}

label! {
  ConfidenceLevel { High, Medium, Low }
}

label! {
  ReachCategory { HighReach, MediumReach, LowReach, MinimalReach }
}

label! {
  ViralityCategory { Viral, HighVirality, ModerateVirality, LowVirality }
}

label! {
  InteractionCategory {
    HighInteraction,
    MediumInteraction,
    LowInteraction,
    NoInteraction,
  }
}

label! {
  ContentLengthCategory { Long, Medium, Short, Empty }
}

label! {
  TimeOfDay { Evening, Afternoon, Morning, Night }
}

label! {
  ActivityLevel { VeryActive, Active, Moderate, LowActivity }
}

label! {
  FrequencyCategory { VeryCommon, Common, Uncommon, Rare }
}

label! {
  /// Curated grouping of detected object classes.
  ObjectCategory {
    People,
    FoodDrink,
    Electronics,
    Furniture,
    HouseholdItems,
    Vehicles,
    Sports,
    Animals,
    Other,
  }
}

// ─── Ladders ─────────────────────────────────────────────────────────────────

/// Views per message. Used for both message facts and channel averages.
pub const REACH: Ladder<ReachCategory> = Ladder::new(
  &[
    (1000.0, ReachCategory::HighReach),
    (500.0, ReachCategory::MediumReach),
    (100.0, ReachCategory::LowReach),
  ],
  ReachCategory::MinimalReach,
);

/// Forward rate, in percent of views.
pub const VIRALITY: Ladder<ViralityCategory> = Ladder::new(
  &[
    (10.0, ViralityCategory::Viral),
    (5.0, ViralityCategory::HighVirality),
    (1.0, ViralityCategory::ModerateVirality),
  ],
  ViralityCategory::LowVirality,
);

/// Reply count.
pub const INTERACTION: Ladder<InteractionCategory> = Ladder::new(
  &[
    (50.0, InteractionCategory::HighInteraction),
    (10.0, InteractionCategory::MediumInteraction),
    (1.0, InteractionCategory::LowInteraction),
  ],
  InteractionCategory::NoInteraction,
);

/// Message length in characters.
pub const CONTENT_LENGTH: Ladder<ContentLengthCategory> = Ladder::new(
  &[
    (500.0, ContentLengthCategory::Long),
    (100.0, ContentLengthCategory::Medium),
    (1.0, ContentLengthCategory::Short),
  ],
  ContentLengthCategory::Empty,
);

/// Hour of day, 0–23.
pub const TIME_OF_DAY: Ladder<TimeOfDay> = Ladder::new(
  &[
    (18.0, TimeOfDay::Evening),
    (12.0, TimeOfDay::Afternoon),
    (6.0, TimeOfDay::Morning),
  ],
  TimeOfDay::Night,
);

/// Total messages per channel.
pub const ACTIVITY: Ladder<ActivityLevel> = Ladder::new(
  &[
    (1000.0, ActivityLevel::VeryActive),
    (500.0, ActivityLevel::Active),
    (100.0, ActivityLevel::Moderate),
  ],
  ActivityLevel::LowActivity,
);

/// Detections per object class.
pub const FREQUENCY: Ladder<FrequencyCategory> = Ladder::new(
  &[
    (100.0, FrequencyCategory::VeryCommon),
    (50.0, FrequencyCategory::Common),
    (10.0, FrequencyCategory::Uncommon),
  ],
  FrequencyCategory::Rare,
);

/// Detector confidence, 0–1.
pub const CONFIDENCE: Ladder<ConfidenceLevel> = Ladder::new(
  &[(0.8, ConfidenceLevel::High), (0.5, ConfidenceLevel::Medium)],
  ConfidenceLevel::Low,
);
