use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, ArtistFilter};
use crate::errors::{AppError, AppResult};
use crate::handlers::auth::clean_skills;
use crate::handlers::bookings::non_empty;
use crate::middleware::auth::AuthUser;
use crate::models::{ApprovalStatus, Review, Role, User, UserId, WeeklySchedule};
use crate::services::availability::{check_availability, parse_booking_date, TimeOfDay, TimeRange};
use crate::services::payment::validate_hourly_rate;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ArtistResponse {
    pub id: UserId,
    pub name: String,
    pub category_id: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub hourly_rate: i64,
    pub approval: ApprovalStatus,
    pub schedule: Option<WeeklySchedule>,
    pub rating: f64,
    pub review_count: i64,
}

impl ArtistResponse {
    pub fn from_user(user: User) -> Option<Self> {
        let profile = user.artist?;
        Some(Self {
            id: user.id,
            name: user.name,
            category_id: profile.category_id,
            bio: profile.bio,
            skills: profile.skills,
            hourly_rate: profile.hourly_rate,
            approval: profile.approval,
            schedule: profile.schedule,
            rating: profile.rating,
            review_count: profile.review_count,
        })
    }
}

pub(crate) fn to_artist_responses(users: Vec<User>) -> Vec<ArtistResponse> {
    users.into_iter().filter_map(ArtistResponse::from_user).collect()
}

// GET /api/artists
#[derive(Deserialize)]
pub struct ArtistsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_rating: Option<f64>,
}

pub async fn list_artists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArtistsQuery>,
) -> AppResult<Json<Vec<ArtistResponse>>> {
    let filter = ArtistFilter {
        approval: Some(ApprovalStatus::Approved),
        category_id: non_empty(query.category),
        search: query.search,
        min_rating: query.min_rating,
    };

    let artists = {
        let db = state.db()?;
        queries::list_artists(&db, &filter)?
    };
    Ok(Json(to_artist_responses(artists)))
}

// GET /api/artists/:id
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ArtistResponse>> {
    let id = UserId::new(&id);
    let user = load_artist(&state, &id)?;

    let privileged = viewer.is_some_and(|v| v.is_admin() || v.id == id);
    if !privileged && !user.is_approved_artist() {
        return Err(AppError::NotFound("artist".to_string()));
    }

    ArtistResponse::from_user(user)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("artist".to_string()))
}

fn load_artist(state: &AppState, id: &UserId) -> AppResult<User> {
    let user = {
        let db = state.db()?;
        queries::get_user_by_id(&db, id)?
    };
    user.filter(|u| u.role == Role::Artist)
        .ok_or_else(|| AppError::NotFound("artist".to_string()))
}

// PUT /api/artists/me
#[derive(Deserialize)]
pub struct UpdateArtistRequest {
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub hourly_rate: Option<i64>,
    pub category_id: Option<String>,
    pub schedule: Option<WeeklySchedule>,
}

pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<UpdateArtistRequest>,
) -> AppResult<Json<ArtistResponse>> {
    user.require(Role::Artist)?;

    let current = load_artist(&state, &user.id)?;
    let mut profile = current
        .artist
        .clone()
        .ok_or_else(|| AppError::NotFound("artist".to_string()))?;

    if let Some(bio) = body.bio {
        profile.bio = bio.trim().to_string();
    }
    if let Some(skills) = body.skills {
        profile.skills = clean_skills(skills);
    }
    if let Some(rate) = body.hourly_rate {
        profile.hourly_rate = validate_hourly_rate(rate)?;
    }
    if let Some(schedule) = body.schedule {
        schedule
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        profile.schedule = (!schedule.is_empty()).then_some(schedule);
    }
    let category_id = non_empty(body.category_id);

    {
        let db = state.db()?;
        if let Some(category_id) = category_id {
            if queries::get_category(&db, &category_id)?.is_none() {
                return Err(AppError::Validation(format!("unknown category: {category_id}")));
            }
            profile.category_id = Some(category_id);
        }
        queries::update_artist_profile(&db, &user.id, &profile)?;
    }

    tracing::info!(artist_id = %user.id, "artist profile updated");

    let updated = load_artist(&state, &user.id)?;
    ArtistResponse::from_user(updated)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("artist".to_string()))
}

// GET /api/artists/:id/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Serialize)]
pub struct BusySlot {
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub date: chrono::NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<BusySlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_working_hours: Option<bool>,
    pub busy: Vec<BusySlot>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let artist_id = UserId::new(&id);
    let date = parse_booking_date(&query.date)?;
    let slot = match (query.start_time.as_deref(), query.end_time.as_deref()) {
        (Some(start), Some(end)) => Some(TimeRange::parse(start, end)?),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "start_time and end_time must be given together".to_string(),
            ))
        }
    };

    let artist = load_artist(&state, &artist_id)?;
    if !artist.is_approved_artist() {
        return Err(AppError::NotFound("artist".to_string()));
    }
    let existing = {
        let db = state.db()?;
        queries::get_artist_bookings_on(&db, &artist_id, date)?
    };

    let busy = existing
        .iter()
        .filter(|b| b.status.is_active())
        .map(|b| BusySlot {
            start_time: b.start_time,
            end_time: b.end_time,
        })
        .collect();

    let mut response = AvailabilityResponse {
        date,
        available: None,
        conflict: None,
        within_working_hours: None,
        busy,
    };

    if let Some(slot) = slot {
        let check = check_availability(&artist_id, date, &slot, &existing);
        response.available = Some(check.is_available());
        response.conflict = check.conflict().map(|b| BusySlot {
            start_time: b.start_time,
            end_time: b.end_time,
        });
        response.within_working_hours = artist
            .artist
            .as_ref()
            .and_then(|p| p.schedule.as_ref())
            .filter(|s| !s.is_empty())
            .map(|s| s.fits(date, &slot));
    }

    Ok(Json(response))
}

// GET /api/artists/:id/reviews
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = {
        let db = state.db()?;
        queries::list_reviews_for_artist(&db, &UserId::new(&id))?
    };
    Ok(Json(reviews))
}
