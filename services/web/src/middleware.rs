//! Authentication, authorization and error shaping middleware

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{debug, error, warn};

use crate::config::Environment;
use crate::error::{ApiResult, AppError, ErrorReport};
use crate::extractors::{CurrentUser, Json};
use crate::jwt::COOKIE_NAME;
use crate::models::{Role, UserRow};
use crate::password::changed_after;
use crate::state::AppState;

/// Bearer token from the Authorization header, else the `jwt` cookie
fn bearer_or_cookie(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => jar.get(COOKIE_NAME).map(|cookie| cookie.value().to_string()),
    }
}

/// Resolve a token to the active user it was issued for
pub async fn authenticate(state: &AppState, token: &str) -> ApiResult<UserRow> {
    let claims = state.jwt.verify(token)?;

    let user = state.users.find_active(claims.sub).await?.ok_or_else(|| {
        AppError::unauthorized("The user belonging to this token does no longer exist.")
    })?;

    if changed_after(user.password_changed_at, claims.iat) {
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }

    Ok(user)
}

/// Require a valid token and attach the user to the request
pub async fn protect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_or_cookie(req.headers(), &jar).ok_or_else(|| {
        AppError::unauthorized("You are not logged in! Please log in to get access.")
    })?;

    let user = authenticate(&state, &token).await?;
    debug!("Authenticated user {}", user.id);

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Attach the user when the cookie holds a valid token; never rejects
pub async fn is_logged_in(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(COOKIE_NAME) {
        match authenticate(&state, cookie.value()).await {
            Ok(user) => {
                req.extensions_mut().insert(CurrentUser(user));
            }
            Err(e) => debug!("Ignoring session cookie: {}", e),
        }
    }

    next.run(req).await
}

/// Only let users holding one of `roles` through; runs after [`protect`]
pub async fn restrict_to(
    State(roles): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = req
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| roles.contains(&user.role));

    if !allowed {
        return Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ));
    }

    Ok(next.run(req).await)
}

fn is_api(path: &str) -> bool {
    path.starts_with("/api")
}

/// Turn error reports left by handlers into JSON or a rendered page
pub async fn shape_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let api = is_api(req.uri().path());
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let env = state.config.app_env;
    if report.operational {
        if report.status.is_server_error() {
            warn!("{} {}: {}", report.status, path, report.message);
        } else {
            debug!("{} {}: {}", report.status, path, report.message);
        }
    } else {
        error!("ERROR {}: {} {:?}", path, report.detail, report.chain);
    }

    if api {
        (report.public_status(env), Json(report.json_body(env))).into_response()
    } else {
        error_page(&state, &report, env)
    }
}

fn error_page(state: &AppState, report: &ErrorReport, env: Environment) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Something went wrong!");
    context.insert("msg", &report.page_message(env));

    match state.templates.render("error.html", &context) {
        Ok(html) => (report.public_status(env), Html(html)).into_response(),
        Err(e) => {
            error!("Failed to render error page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!").into_response()
        }
    }
}
