//! Wildlife observations and the clustered map view.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    clustering::{cluster_points, GridSize, MapFeature, MapPoint},
    error::{get_db_conn, log_db_error, ApiError, ApiResult},
    helpers::{current_user_id, validate_payload},
    journey::{award_points, ledger::OBSERVATION_POINTS, LedgerError, PointsAward, PointsSource},
    models::{NewObservation, Observation},
    schema::observations,
    AppState,
};

/// Upper bound on markers loaded for one map request.
const MAP_POINT_LIMIT: i64 = 5000;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateObservationRequest {
    #[validate(length(min = 1, max = 200, message = "species_name is required"))]
    #[schema(example = "Eurasian otter")]
    pub species_name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    #[schema(example = 51.5)]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    #[schema(example = -0.12)]
    pub longitude: f64,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Defaults to now.
    pub observed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObservationResponse {
    pub observation: Observation,
    pub points_awarded: i32,
    pub total_points: i32,
}

#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

#[utoipa::path(
    post,
    path = "/api/observations",
    tag = "Observations",
    request_body = CreateObservationRequest,
    responses(
        (status = 201, description = "Observation recorded", body = ObservationResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_observation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateObservationRequest>,
) -> ApiResult<(StatusCode, Json<ObservationResponse>)> {
    let user_id = current_user_id(&claims)?;
    validate_payload(&payload)?;

    let species_name = payload.species_name.trim().to_string();
    if species_name.is_empty() {
        return Err(ApiError::bad_request(
            "species_name is required",
            "VALIDATION_ERROR",
        ));
    }

    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    let result = conn.transaction::<_, RecordError, _>(|conn| {
        let observation: Observation = diesel::insert_into(observations::table)
            .values(&NewObservation {
                user_id,
                species_name,
                latitude: payload.latitude,
                longitude: payload.longitude,
                notes: payload.notes,
                observed_at: payload.observed_at.unwrap_or(now),
            })
            .get_result(conn)?;

        let outcome = award_points(
            conn,
            PointsAward {
                user_id,
                delta: OBSERVATION_POINTS,
                reason: "Observation recorded",
                source: PointsSource::Observation,
                reference_id: Some(observation.id),
            },
        )?;

        Ok((observation, outcome.total_points))
    });

    let (observation, total_points) = match result {
        Ok(done) => done,
        Err(RecordError::Ledger(LedgerError::Database(e)) | RecordError::Database(e)) => {
            return Err(log_db_error("record observation")(e))
        }
        Err(RecordError::Ledger(e)) => {
            return Err(ApiError::internal(e.to_string(), "LEDGER_ERROR"))
        }
    };

    info!(
        user_id = %user_id,
        observation_id = %observation.id,
        species = %observation.species_name,
        total_points,
        "Observation recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(ObservationResponse {
            observation,
            points_awarded: OBSERVATION_POINTS,
            total_points,
        }),
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MapQuery {
    /// Cell size in degrees; must be positive.
    pub grid_size: Option<f64>,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MapResponse {
    /// False when the markers are returned unclustered.
    pub clustered: bool,
    pub features: Vec<MapFeature>,
}

#[utoipa::path(
    get,
    path = "/api/observations/map",
    tag = "Observations",
    params(MapQuery),
    responses(
        (status = 200, description = "Map markers", body = MapResponse),
        (status = 400, description = "Invalid grid size", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn observation_map(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> ApiResult<Json<MapResponse>> {
    let grid = GridSize::new(query.grid_size.unwrap_or(state.habitat.map_default_grid_size))
        .map_err(|e| {
            warn!(error = %e, "Rejected map request");
            ApiError::bad_request(e.to_string(), "INVALID_GRID_SIZE")
        })?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let mut select = observations::table
        .select((
            observations::id,
            observations::species_name,
            observations::latitude,
            observations::longitude,
        ))
        .order(observations::observed_at.desc())
        .limit(MAP_POINT_LIMIT)
        .into_boxed();

    if let Some(min_lat) = query.min_lat {
        select = select.filter(observations::latitude.ge(min_lat));
    }
    if let Some(max_lat) = query.max_lat {
        select = select.filter(observations::latitude.le(max_lat));
    }
    if let Some(min_lng) = query.min_lng {
        select = select.filter(observations::longitude.ge(min_lng));
    }
    if let Some(max_lng) = query.max_lng {
        select = select.filter(observations::longitude.le(max_lng));
    }

    let points: Vec<MapPoint> = select
        .load::<(uuid::Uuid, String, f64, f64)>(&mut conn)
        .map_err(log_db_error("load map observations"))?
        .into_iter()
        .map(|(id, species_name, latitude, longitude)| MapPoint {
            id,
            species_name,
            latitude,
            longitude,
        })
        .collect();

    let (clustered, features) = cluster_points(points, grid);

    Ok(Json(MapResponse {
        clustered,
        features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(lat: f64, lng: f64, species: &str) -> CreateObservationRequest {
        CreateObservationRequest {
            species_name: species.to_string(),
            latitude: lat,
            longitude: lng,
            notes: None,
            observed_at: None,
        }
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(request(51.5, -0.12, "Otter").validate().is_ok());
        assert!(request(90.0, 180.0, "Otter").validate().is_ok());
        assert!(request(90.5, 0.0, "Otter").validate().is_err());
        assert!(request(0.0, -180.5, "Otter").validate().is_err());
    }

    #[test]
    fn test_species_name_required() {
        assert!(request(0.0, 0.0, "").validate().is_err());
    }
}
