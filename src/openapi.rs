//! OpenAPI documentation served through Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::handlers::auth::{
    AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, UserResponse,
};
use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Habitat API",
        version = "1.0.0",
        description = "Backend for the Habitat naturalist app.\n\n\
        ## Features\n\
        - QR guest access campaigns with temporary premium\n\
        - Weighted random and NGO challenges with progress tracking\n\
        - Species journeys backed by a points ledger\n\
        - Naturalist leaderboard and clustered observation map\n\n\
        ## Authentication\n\
        1. Register, log in, or activate a guest code to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`\n\
        3. Use the refresh token to get new access tokens when expired\n\n\
        Admin routes require the `Admin` role. The cron route takes the \
        configured `CRON_SECRET` as its bearer token.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "User authentication and token management"),
        (name = "Guest Access", description = "QR code activation and guest conversion"),
        (name = "Guest Campaigns", description = "Guest access campaign administration"),
        (name = "Challenges", description = "Random and NGO challenges"),
        (name = "Journey", description = "Species journeys and points history"),
        (name = "Leaderboard", description = "Naturalist rankings"),
        (name = "Observations", description = "Wildlife observations and the map"),
        (name = "Cron", description = "Scheduled maintenance")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_current_user,

        crate::handlers::guest_access::activate,
        crate::handlers::guest_access::claim,

        crate::handlers::campaigns::generate_campaign,
        crate::handlers::campaigns::list_campaigns,
        crate::handlers::campaigns::get_campaign,
        crate::handlers::campaigns::update_campaign,

        crate::handlers::challenges::assign_random,
        crate::handlers::challenges::list_ngo_challenges,
        crate::handlers::challenges::create_ngo_challenge,
        crate::handlers::challenges::list_user_challenges,
        crate::handlers::challenges::join_ngo_challenge,
        crate::handlers::challenges::record_progress,

        crate::handlers::journey::get_journey,
        crate::handlers::journey::start_journey,
        crate::handlers::journey::points_history,
        crate::handlers::journey::list_avatars,

        crate::handlers::leaderboard::naturalists,

        crate::handlers::observations::create_observation,
        crate::handlers::observations::observation_map,

        crate::handlers::cron::cleanup_guests,
    ),
    components(
        schemas(
            ApiError,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            RefreshResponse,
            AuthResponse,
            UserResponse,

            PaginationMeta,

            crate::handlers::guest_access::ActivateRequest,
            crate::handlers::guest_access::ActivateResponse,
            crate::handlers::guest_access::GuestCredentialsResponse,
            crate::handlers::guest_access::GuestSessionInfo,
            crate::handlers::guest_access::CampaignInfo,
            crate::handlers::guest_access::ClaimRequest,

            crate::models::GuestAccessCode,
            crate::handlers::campaigns::GenerateCampaignRequest,
            crate::handlers::campaigns::CampaignCreatedResponse,
            crate::handlers::campaigns::CampaignStats,
            crate::handlers::campaigns::CampaignWithStats,
            crate::handlers::campaigns::UpdateCampaignRequest,

            crate::models::NgoChallenge,
            crate::models::UnpredictableChallenge,
            crate::handlers::challenges::ChallengeTemplateInfo,
            crate::handlers::challenges::UserChallengeView,
            crate::handlers::challenges::AssignmentResponse,
            crate::handlers::challenges::NgoChallengeView,
            crate::handlers::challenges::CreateNgoChallengeRequest,
            crate::handlers::challenges::JoinNgoChallengeRequest,
            crate::handlers::challenges::ProgressRequest,
            crate::handlers::challenges::ProgressResponse,

            crate::models::SpeciesAvatar,
            crate::models::UserSpeciesJourney,
            crate::models::PointsHistoryEntry,
            crate::journey::EcoStatus,
            crate::handlers::journey::JourneyResponse,
            crate::handlers::journey::StartJourneyRequest,

            crate::leaderboard::LeaderboardEntry,
            crate::handlers::leaderboard::LeaderboardResponse,

            crate::models::Observation,
            crate::clustering::MapPoint,
            crate::clustering::MapCluster,
            crate::clustering::MapFeature,
            crate::handlers::observations::CreateObservationRequest,
            crate::handlers::observations::ObservationResponse,
            crate::handlers::observations::MapResponse,

            crate::handlers::cron::CleanupReport,
            crate::handlers::cron::CleanupFailure,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token from /api/auth/login, /api/auth/register or \
                            /api/guest-access/activate.",
                        ))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cron_secret",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("The configured CRON_SECRET."))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
