use crate::routes::{ai, health, history, modernization};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "lmra-gateway",
    description = "LMRA AI gateway API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(ai::AiApi::openapi());
    root.merge(modernization::ModernizationApi::openapi());
    root.merge(history::HistoryApi::openapi());
    root
}
