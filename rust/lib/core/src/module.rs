use axum::Router;

/// A department module that contributes HTTP routes.
///
/// Each business module (sales, procurement, manufacturing, ...) implements
/// this trait to register its API endpoints. The server collects all
/// modules and nests their routes under `/{name}`.
pub trait Module: Send + Sync {
    /// Module name, used for logging and route prefixes.
    fn name(&self) -> &str;

    /// Return the module's routes, to be nested under `/{name}`.
    fn routes(&self) -> Router;
}
