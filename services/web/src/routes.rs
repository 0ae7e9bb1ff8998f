//! Route table and global middleware stack

use axum::{
    Router,
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    http::{HeaderName, HeaderValue, Uri, header},
    middleware::from_fn_with_state,
    routing::{MethodRouter, delete, get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, services::ServeDir, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::handlers::{auth, bookings, factory, reviews, tours, users, views};
use crate::middleware::{is_logged_in, protect, restrict_to, shape_errors};
use crate::models::Role;
use crate::rate_limiter::rate_limit;
use crate::repositories::{BookingRepository, ReviewRepository, TourRepository, UserRepository};
use crate::state::AppState;

const ADMIN: &[Role] = &[Role::Admin];
const ADMIN_LEAD: &[Role] = &[Role::Admin, Role::LeadGuide];
const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
const MEMBERS: &[Role] = &[Role::User];
const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

/// JSON and form bodies
const BODY_LIMIT: usize = 10 * 1024;
/// Multipart image uploads
const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;
/// Payment webhook payloads
const WEBHOOK_LIMIT: usize = 1024 * 1024;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self' data: blob:; \
     base-uri 'self'; \
     connect-src 'self' https://*.stripe.com https://*.tiles.mapbox.com https://api.mapbox.com https://events.mapbox.com ws:; \
     font-src 'self' https: data:; \
     frame-src 'self' https://*.stripe.com; \
     img-src 'self' data: blob: https:; \
     object-src 'none'; \
     script-src 'self' https://unpkg.com https://*.stripe.com https://cdnjs.cloudflare.com https://api.mapbox.com blob:; \
     style-src 'self' https: 'unsafe-inline'; \
     worker-src 'self' blob:; \
     upgrade-insecure-requests";

/// Require a logged in user
fn protected(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), protect))
}

/// Require a logged in user holding one of `roles`
fn restricted(
    state: &AppState,
    roles: &'static [Role],
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    protected(
        state,
        route.route_layer(from_fn_with_state(roles, restrict_to)),
    )
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/top-5-cheap", get(tours::top_5_cheap))
        .route("/tour-stats", get(tours::tour_stats))
        .route(
            "/monthly-plan/:year",
            restricted(state, STAFF, get(tours::monthly_plan)),
        )
        .route(
            "/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours::tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(tours::distances))
        .route(
            "/",
            get(factory::get_all::<TourRepository>).merge(restricted(
                state,
                ADMIN_LEAD,
                post(factory::create_one::<TourRepository>),
            )),
        )
        .route(
            "/:id",
            get(factory::get_one::<TourRepository>).merge(restricted(
                state,
                ADMIN_LEAD,
                patch(tours::update_tour)
                    .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
                    .delete(factory::delete_one::<TourRepository>),
            )),
        )
        .route(
            "/:id/reviews",
            protected(state, get(reviews::get_tour_reviews)).merge(restricted(
                state,
                MEMBERS,
                post(reviews::create_tour_review),
            )),
        )
}

fn review_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            protected(state, get(factory::get_all::<ReviewRepository>)).merge(restricted(
                state,
                MEMBERS,
                post(reviews::create_review),
            )),
        )
        .route(
            "/:id",
            protected(state, get(factory::get_one::<ReviewRepository>)).merge(restricted(
                state,
                REVIEW_EDITORS,
                patch(factory::update_one::<ReviewRepository>)
                    .delete(factory::delete_one::<ReviewRepository>),
            )),
        )
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        .route(
            "/updateMyPassword",
            protected(state, patch(auth::update_password)),
        )
        .route("/me", protected(state, get(users::get_me)))
        .route(
            "/updateMe",
            protected(
                state,
                patch(users::update_me).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
            ),
        )
        .route("/deleteMe", protected(state, delete(users::delete_me)))
        .route(
            "/",
            restricted(
                state,
                ADMIN,
                get(factory::get_all::<UserRepository>).post(users::create_user),
            ),
        )
        .route(
            "/:id",
            restricted(
                state,
                ADMIN,
                get(factory::get_one::<UserRepository>)
                    .patch(factory::update_one::<UserRepository>)
                    .delete(factory::delete_one::<UserRepository>),
            ),
        )
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/checkout-session/:tourId",
            protected(state, get(bookings::get_checkout_session)),
        )
        .route(
            "/",
            restricted(
                state,
                ADMIN_LEAD,
                get(factory::get_all::<BookingRepository>)
                    .post(factory::create_one::<BookingRepository>),
            ),
        )
        .route(
            "/:id",
            restricted(
                state,
                ADMIN_LEAD,
                get(factory::get_one::<BookingRepository>)
                    .patch(factory::update_one::<BookingRepository>)
                    .delete(factory::delete_one::<BookingRepository>),
            ),
        )
}

fn view_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(views::get_overview))
        .route("/tour/:slug", get(views::get_tour))
        .route("/login", get(views::get_login_form))
        .route("/signup", get(views::get_signup_form))
        .route_layer(from_fn_with_state(state.clone(), is_logged_in));

    Router::new()
        .route("/me", protected(state, get(views::get_account)))
        .route("/my-tours", protected(state, get(views::get_my_tours)))
        .route(
            "/submit-user-data",
            protected(state, post(views::update_user_data)),
        )
        .merge(public)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Can't find {} on this server!", uri.path()))
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/tours", tour_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/reviews", review_routes(&state))
        .nest("/bookings", booking_routes(&state))
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit));

    let assets = ServeDir::new(&state.config.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.into_service());

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ));

    Router::new()
        .route(
            "/webhook-checkout",
            post(bookings::webhook_checkout).layer(DefaultBodyLimit::max(WEBHOOK_LIMIT)),
        )
        .nest("/api/v1", api)
        .merge(view_routes(&state))
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn_with_state(state.clone(), shape_errors))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(security_headers),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use common::database::{DatabaseConfig, lazy_pool};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::email::LogMailer;

    fn app_with(config: AppConfig) -> Router {
        let pool = lazy_pool(&DatabaseConfig::new(
            "postgresql://natours@localhost:5432/natours_test",
            "",
        ))
        .unwrap();
        let state = AppState::new(config, pool, Arc::new(LogMailer::new())).unwrap();
        create_router(state)
    }

    fn app() -> Router {
        app_with(AppConfig {
            jwt_secret: "router-test-secret".to_string(),
            ..AppConfig::default()
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_api_route_is_404_json() {
        let response = app().oneshot(get("/api/v1/nothing-here")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(
            body["message"],
            "Can't find /api/v1/nothing-here on this server!"
        );
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = app().oneshot(get("/api/v1/users/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "You are not logged in! Please log in to get access."
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let request = Request::builder()
            .uri("/api/v1/reviews")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid token. Please log in again!");
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let response = app().oneshot(get("/api/v1/tours/not-an-id")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid id: not-an-id");
    }

    #[tokio::test]
    async fn test_bad_coordinates_are_400() {
        let response = app()
            .oneshot(get("/api/v1/tours/distances/nowhere/unit/mi"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "Please provide latitude and longitude in the format lat,lng."
        );
    }

    #[tokio::test]
    async fn test_unknown_page_renders_error_page() {
        let response = app().oneshot(get("/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Something went wrong!"));
        assert!(html.contains("Can&#x27;t find &#x2F;nowhere on this server!"));
    }

    #[tokio::test]
    async fn test_login_page_renders_without_session() {
        let response = app().oneshot(get("/login")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Log into your account"));
    }

    #[tokio::test]
    async fn test_webhook_rejects_unsigned_payload() {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook-checkout")
            .header("stripe-signature", "t=1,v1=deadbeef")
            .body(Body::from("{}"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("Webhook error:"));
    }

    #[tokio::test]
    async fn test_create_user_points_to_signup() {
        let config = AppConfig {
            jwt_secret: "router-test-secret".to_string(),
            ..AppConfig::default()
        };
        // restricted to admins, so an anonymous caller is turned away first
        let response = app_with(config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/users")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_is_rate_limited() {
        let router = app_with(AppConfig {
            jwt_secret: "router-test-secret".to_string(),
            rate_limit_max: 2,
            ..AppConfig::default()
        });

        for _ in 0..2 {
            let response = router.clone().oneshot(get("/api/v1/users/me")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = router.oneshot(get("/api/v1/users/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "Too many requests from this IP, please try again in an hour!"
        );
    }

    #[tokio::test]
    async fn test_production_hides_internal_detail() {
        let router = app_with(AppConfig {
            jwt_secret: "router-test-secret".to_string(),
            app_env: crate::config::Environment::Production,
            ..AppConfig::default()
        });

        let response = router.oneshot(get("/api/v1/users/me")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "fail");
        assert!(body.get("stack").is_none());
    }
}
