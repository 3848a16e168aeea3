use crate::models;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(components(schemas(models::PowerUpdate)))]
pub struct ApiDoc;
