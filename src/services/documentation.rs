use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Warden Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::health::list_controllers,
        crate::routes::events::event_stream,
        crate::routes::sessions::start_session,
        crate::routes::sessions::list_sessions,
        crate::routes::sessions::get_session,
        crate::routes::sessions::pause_session,
        crate::routes::sessions::resume_session,
        crate::routes::sessions::halt_session,
        crate::routes::sessions::emergency_stop,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::ControllerSummary,
            crate::dto::session::StartSessionRequest,
            crate::dto::session::SessionSummary,
            crate::dto::session::ActionResponse,
            crate::state::session::SessionStatus,
            crate::state::liveness::ControllerStatus,
        )
    ),
    tags(
        (name = "health", description = "Health and controller liveness endpoints"),
        (name = "sessions", description = "Game session control plane"),
        (name = "events", description = "Domain event feed"),
    )
)]
pub struct ApiDoc;
