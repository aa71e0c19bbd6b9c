//! Dashboard cards; figures are drawn around the user's age bucket

use axum::{response::IntoResponse, Extension, Json};
use tracing::instrument;

use voice_companion_data::models::User;
use voice_companion_domain::services::dashboard::{
    self, effective_age, BodyMetricsCard, RecipeCard, SleepCard, StepsCard, WeatherCard,
};

#[utoipa::path(
    get,
    path = "/dashboard/steps",
    responses((status = 200, description = "Steps card", body = StepsCard)),
    security(("bearer" = [])),
    tag = "dashboard"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_steps(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(dashboard::steps_card(effective_age(&user), &mut rand::thread_rng()))
}

#[utoipa::path(
    get,
    path = "/dashboard/weather",
    responses((status = 200, description = "Weather card", body = WeatherCard)),
    security(("bearer" = [])),
    tag = "dashboard"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_weather(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(dashboard::weather_card(user.region.as_deref()))
}

#[utoipa::path(
    get,
    path = "/dashboard/sleep",
    responses((status = 200, description = "Sleep card", body = SleepCard)),
    security(("bearer" = [])),
    tag = "dashboard"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_sleep(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(dashboard::sleep_card(effective_age(&user), &mut rand::thread_rng()))
}

#[utoipa::path(
    get,
    path = "/dashboard/body-metrics",
    responses((status = 200, description = "Body metrics card", body = BodyMetricsCard)),
    security(("bearer" = [])),
    tag = "dashboard"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_body_metrics(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(dashboard::body_metrics_card(effective_age(&user), &mut rand::thread_rng()))
}

#[utoipa::path(
    get,
    path = "/dashboard/recipe",
    responses((status = 200, description = "Recipe card", body = RecipeCard)),
    security(("bearer" = [])),
    tag = "dashboard"
)]
#[instrument(skip(user), fields(user_id = user.id))]
pub async fn get_recipe(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(dashboard::recipe_card(effective_age(&user), &mut rand::thread_rng()))
}
