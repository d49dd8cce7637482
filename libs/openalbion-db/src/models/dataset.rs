use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Headcount {
    pub year: i32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub year: i32,
    pub dimension: String,
    pub primary_category: String,
    pub secondary_category: Option<String>,
    pub value: f64,
}

impl EnrollmentRecord {
    /// Year, then primary category, then secondary category; a missing
    /// secondary category sorts first.
    pub fn sort_key(&self) -> (i32, &str, Option<&str>) {
        (self.year, self.primary_category.as_str(), self.secondary_category.as_deref())
    }
}
