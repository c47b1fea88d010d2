use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::IntoParams;
use utoipa::ToSchema;

const DEFAULT_PAGE_LIMIT: u64 = 20;
const MAX_PAGE_LIMIT: u64 = 200;

/// `limit`/`offset` query parameters. Both accept numbers or numeric
/// strings, since some clients quote every query value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page size (default 20, capped at 200)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    /// Number of items to skip (default 0)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<U64Input>::deserialize(deserializer)? {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

impl PaginationParams {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT) as usize
    }

    pub fn offset(&self) -> usize {
        usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_caps() {
        let p = PaginationParams::default();
        assert_eq!((p.limit(), p.offset()), (20, 0));

        let p: PaginationParams = serde_json::from_str(r#"{"limit": 5000, "offset": "40"}"#).unwrap();
        assert_eq!((p.limit(), p.offset()), (200, 40));

        let p: PaginationParams = serde_json::from_str(r#"{"limit": 0}"#).unwrap();
        assert_eq!(p.limit(), 1);
    }

    #[test]
    fn blank_or_garbage_strings() {
        let p: PaginationParams = serde_json::from_str(r#"{"limit": " "}"#).unwrap();
        assert_eq!(p.limit(), 20);
        assert!(serde_json::from_str::<PaginationParams>(r#"{"limit": "ten"}"#).is_err());
    }
}
