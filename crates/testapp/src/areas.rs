//! Area registration adapter
//!
//! Migrated route tables register areas through the same shape they used on
//! the legacy stack: an [`AreaRegistration`] names the area and maps its
//! routes through an [`AreaRegistrationContext`]. Only the members those
//! tables consume exist here.

use axum::{
    extract::MatchedPath,
    routing::{get, MethodRouter},
    Json, Router,
};
use tracing::debug;
use webcompat_harness::TestModel;

use crate::routes::AppState;

/// Marks a trailing route segment as optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlParameter {
    Optional,
}

pub trait AreaRegistration: Send + Sync {
    fn area_name(&self) -> &str;

    fn register_area(&self, context: &mut AreaRegistrationContext);
}

/// Collects the routes of one area, all mounted under `/{area}`.
pub struct AreaRegistrationContext {
    area_name: String,
    router: Router<AppState>,
    route_names: Vec<String>,
}

impl AreaRegistrationContext {
    pub fn new(area_name: &str) -> Self {
        Self {
            area_name: area_name.to_string(),
            router: Router::new(),
            route_names: Vec::new(),
        }
    }

    pub fn area_name(&self) -> &str {
        &self.area_name
    }

    pub fn route_names(&self) -> &[String] {
        &self.route_names
    }

    /// Map `url` (relative to the area) to `handler`. With an optional `id`
    /// the route also matches one extra trailing segment.
    pub fn map_route(
        &mut self,
        name: &str,
        url: &str,
        id: Option<UrlParameter>,
        handler: MethodRouter<AppState>,
    ) {
        let path = format!("/{}/{}", self.area_name, url.trim_matches('/'));
        debug!("Mapping area route {} -> {}", name, path);

        let mut router = std::mem::take(&mut self.router).route(&path, handler.clone());
        if id == Some(UrlParameter::Optional) {
            router = router.route(&format!("{}/:id", path), handler);
        }
        self.router = router;
        self.route_names.push(name.to_string());
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}

/// Every area the application registers at startup.
pub fn registered() -> Vec<Box<dyn AreaRegistration>> {
    vec![Box::new(TestAreaRegistration)]
}

pub struct TestAreaRegistration;

impl AreaRegistration for TestAreaRegistration {
    fn area_name(&self) -> &str {
        "TestArea"
    }

    fn register_area(&self, context: &mut AreaRegistrationContext) {
        context.map_route(
            "TestArea_hello",
            "AreaTest/Hello",
            Some(UrlParameter::Optional),
            get(area_hello),
        );
    }
}

/// Answers with `{controller}.{action}` taken from the matched route.
async fn area_hello(path: MatchedPath) -> Json<TestModel> {
    let segments: Vec<&str> = path.as_str().trim_start_matches('/').split('/').collect();
    let name = match segments.as_slice() {
        [_area, controller, action, ..] => format!("{}.{}", controller, action),
        _ => path.as_str().to_string(),
    };
    Json(TestModel::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_registration_names_routes() {
        let area = TestAreaRegistration;
        let mut context = AreaRegistrationContext::new(area.area_name());
        area.register_area(&mut context);

        assert_eq!(context.area_name(), "TestArea");
        assert_eq!(context.route_names(), ["TestArea_hello"]);
    }
}
