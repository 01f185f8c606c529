use serde::{Deserialize, Serialize};

/// op.gg region slug used in profile URLs.
#[derive(
    Default,
    Debug,
    Clone,
    Copy,
    Hash,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Region {
    #[default]
    Na,
    Euw,
    Eune,
    Kr,
    Jp,
    Br,
    Lan,
    Las,
    Oce,
    Tr,
    Ru,
}
