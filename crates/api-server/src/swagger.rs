//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Academy Messaging API",
        version = "0.1.0",
        description = "Music-school back office: student directory, message templates and WhatsApp mass messaging with progress tracking.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Operations", description = "Health, readiness, and liveness probes"),
        (name = "Directory", description = "Students and message templates"),
        (name = "Messaging", description = "Recipient preview, template rendering and dispatch jobs"),
    ),
    paths(
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
        // Directory
        crate::directory_rest::list_students,
        crate::directory_rest::get_student,
        crate::directory_rest::list_templates,
        crate::directory_rest::get_template,
        crate::directory_rest::create_template,
        crate::directory_rest::delete_template,
        // Messaging
        crate::messaging_rest::preview_recipients,
        crate::messaging_rest::render_message,
        crate::messaging_rest::start_dispatch,
        crate::messaging_rest::list_dispatches,
        crate::messaging_rest::get_dispatch,
        crate::messaging_rest::cancel_dispatch,
    ),
    components(schemas(
        // Domain types
        academy_core::types::Recipient,
        academy_core::types::StudentStatus,
        academy_core::types::MessageTemplate,
        academy_core::types::TemplateCategory,
        academy_core::types::DispatchState,
        academy_core::types::DispatchProgress,
        academy_messaging::DeliveryRecord,
        academy_store::CreateTemplateRequest,
        // REST types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
        crate::messaging_rest::RecipientPreviewRequest,
        crate::messaging_rest::RecipientPreviewResponse,
        crate::messaging_rest::RenderRequest,
        crate::messaging_rest::RenderResponse,
        crate::messaging_rest::DispatchRequest,
        crate::jobs::DispatchJobView,
    ))
)]
pub struct ApiDoc;
