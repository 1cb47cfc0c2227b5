use axum::{
    Json,
    extract::{
        Query,
        State,
    },
};
use gps_tracker_types::{
    DecodedRecord,
    Imei,
};
use serde::Deserialize;

use crate::api::{
    Api,
    ApiError,
    ErrorResponse,
};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct GetQuery {
    /// Only return records of this device.
    pub imei: Option<Imei>,

    #[serde(default)]
    pub limit: Option<i64>,
}

impl GetQuery {
    fn limit(&self) -> Result<i64, ApiError> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => {
                Err(ApiError::InvalidLimit {
                    limit,
                    max: MAX_LIMIT,
                })
            }
        }
    }
}

/// Lists stored records, newest first.
pub async fn get_records(
    State(api): State<Api>,
    Query(query): Query<GetQuery>,
) -> Result<Json<Vec<DecodedRecord>>, ErrorResponse> {
    let limit = query.limit()?;
    let records = api
        .database
        .list_records(query.imei.as_ref(), limit)
        .await?;
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use crate::api::{
        ApiError,
        records::{
            DEFAULT_LIMIT,
            GetQuery,
        },
    };

    #[test]
    fn it_validates_the_limit() {
        assert_eq!(GetQuery::default().limit().unwrap(), DEFAULT_LIMIT);

        let query = GetQuery {
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(query.limit().unwrap(), 10);

        for limit in [0, -1, 1001] {
            let query = GetQuery {
                limit: Some(limit),
                ..Default::default()
            };
            assert!(matches!(query.limit(), Err(ApiError::InvalidLimit { .. })));
        }
    }
}
