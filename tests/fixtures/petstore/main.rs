mod admin;
mod handlers;
mod models;

/// @title Petstore
/// @version 1.0
/// @description Pets and the people who keep them.
/// @host petstore.local
/// @BasePath /v1
/// @schemes https
/// @securityDefinitions.apikey ApiKeyAuth
/// @in header
/// @name Authorization
fn main() {
    let app = Router::new()
        .route("/pets", get(handlers::list_pets).post(handlers::create_pet))
        .route("/pets/:id", get(handlers::show_pet).delete(handlers::delete_pet))
        .route("/hello/:name", get(handlers::greet))
        .route("/admin/stats", get(admin::stats));
    serve(app);
}
