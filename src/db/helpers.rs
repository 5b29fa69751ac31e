use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{Category, Difficulty};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_difficulty(value: Option<String>) -> Result<Option<Difficulty>> {
    value
        .map(|raw| match raw.as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(anyhow!("unknown difficulty {other}")),
        })
        .transpose()
}

pub fn parse_category(value: Option<String>) -> Result<Option<Category>> {
    value
        .map(|raw| match raw.as_str() {
            "strength" => Ok(Category::Strength),
            "cardio" => Ok(Category::Cardio),
            "flexibility" => Ok(Category::Flexibility),
            "hiit" => Ok(Category::Hiit),
            other => Err(anyhow!("unknown category {other}")),
        })
        .transpose()
}
