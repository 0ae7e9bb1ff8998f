//! End-to-end tests against a real database
//!
//! Each test gets a fresh database with the crate migrations applied. They
//! need `DATABASE_URL` to point at a PostgreSQL server, so they are ignored
//! by default (`cargo test -- --ignored`).

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use sqlx::PgPool;
use tower::ServiceExt;

use web::{
    AppConfig, AppState, create_router,
    email::LogMailer,
    models::{NewUser, Role},
    repositories::UserRepository,
};

const WEBHOOK_SECRET: &str = "whsec_integration";

struct TestApp {
    router: Router,
    mailer: LogMailer,
    pool: PgPool,
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "integration-secret".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn setup(pool: PgPool) -> TestApp {
    setup_with(pool, test_config())
}

fn setup_with(pool: PgPool, config: AppConfig) -> TestApp {
    let mailer = LogMailer::new();
    let state = AppState::new(config, pool.clone(), Arc::new(mailer.clone())).unwrap();

    TestApp {
        router: create_router(state),
        mailer,
        pool,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_user(&self, name: &str, email: &str, role: Role) -> String {
        let user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            photo: "default.jpg".to_string(),
            role,
            password: "test1234".to_string(),
        };
        UserRepository::new(self.pool.clone())
            .insert(None, &user)
            .await
            .unwrap();
        self.login(email, "test1234").await
    }

    async fn user_id(&self, token: &str) -> String {
        let (status, body) = self
            .call("GET", "/api/v1/users/me", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["data"]["id"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_tour(&self, token: &str, name: &str, price: f64) -> Value {
        self.create_tour_with(token, json!({ "name": name, "price": price }))
            .await
    }

    /// Create a tour from a valid base payload overridden by `fields`
    async fn create_tour_with(&self, token: &str, fields: Value) -> Value {
        let mut payload = json!({
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg",
            "startLocation": {
                "type": "Point",
                "coordinates": [-80.185942, 25.774772],
                "description": "Miami, USA"
            },
            "startDates": ["2027-06-19T09:00:00Z"]
        });
        if let (Some(base), Some(fields)) = (payload.as_object_mut(), fields.as_object()) {
            base.extend(fields.clone());
        }

        let (status, body) = self
            .call("POST", "/api/v1/tours", Some(token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["data"].clone()
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_signup_returns_token_and_sends_welcome(pool: PgPool) {
    let app = setup(pool);

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(json!({
                "name": "Laura Wilson",
                "email": "Laura@Example.com",
                "password": "pass1234",
                "passwordConfirm": "pass1234",
                "role": "admin"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].as_str().is_some());
    let user = &body["data"]["user"];
    assert_eq!(user["email"], "laura@example.com");
    assert_eq!(user["role"], "user");
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "laura@example.com");
    assert!(sent[0].text.contains("Hi Laura,"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_login_rejects_wrong_password(pool: PgPool) {
    let app = setup(pool);
    app.create_user("Ben Hadley", "ben@example.com", Role::User)
        .await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "ben@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect email or password");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_tour_listing_filters_sorts_and_projects(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;

    let created = app.create_tour(&admin, "The Sea Explorer", 497.0).await;
    assert_eq!(created["slug"], "the-sea-explorer");
    assert_eq!(created["durationWeeks"], 1.0);
    app.create_tour(&admin, "The City Wanderer", 1197.0).await;
    app.create_tour(&admin, "The Forest Hiker", 397.0).await;

    let (status, body) = app
        .call(
            "GET",
            "/api/v1/tours?price%5Blt%5D=1000&sort=-price&fields=name,price",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);

    let tours = body["data"]["data"].as_array().unwrap();
    assert_eq!(tours[0]["name"], "The Sea Explorer");
    assert_eq!(tours[1]["name"], "The Forest Hiker");
    assert!(tours[0].get("summary").is_none());

    let (_, page) = app
        .call("GET", "/api/v1/tours?sort=price&limit=1&page=2", None, None)
        .await;
    assert_eq!(page["results"], 1);
    assert_eq!(page["data"]["data"][0]["name"], "The Sea Explorer");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_only_staff_manage_tours(pool: PgPool) {
    let app = setup(pool);
    let user = app
        .create_user("Aarav Lynn", "aarav@example.com", Role::User)
        .await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/tours",
            Some(user.as_str()),
            Some(json!({ "name": "The Forbidden Tour" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_reviews_update_tour_ratings(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;
    let laura = app
        .create_user("Laura Wilson", "laura@example.com", Role::User)
        .await;
    let ben = app
        .create_user("Ben Hadley", "ben@example.com", Role::User)
        .await;

    let tour = app.create_tour(&admin, "The Park Camper", 1497.0).await;
    let tour_id = tour["id"].as_str().unwrap();
    let reviews_uri = format!("/api/v1/tours/{}/reviews", tour_id);

    for (token, rating) in [(&laura, 5), (&ben, 4)] {
        let (status, body) = app
            .call(
                "POST",
                &reviews_uri,
                Some(token.as_str()),
                Some(json!({ "review": "Amazing!", "rating": rating })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (_, body) = app
        .call("GET", &format!("/api/v1/tours/{}", tour_id), None, None)
        .await;
    let tour = &body["data"]["data"];
    assert_eq!(tour["ratingsQuantity"], 2);
    assert_eq!(tour["ratingsAverage"], 4.5);
    assert_eq!(tour["reviews"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .call(
            "POST",
            &reviews_uri,
            Some(laura.as_str()),
            Some(json!({ "review": "Again!", "rating": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Duplicate field value")
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_password_reset_flow(pool: PgPool) {
    let app = setup(pool);
    let old_token = app
        .create_user("Kate Morrison", "kate@example.com", Role::User)
        .await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/users/forgotPassword",
            None,
            Some(json!({ "email": "kate@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Token sent to email!");

    let sent = app.mailer.sent().await;
    let email = sent.last().unwrap();
    let reset_token = email
        .text
        .split("resetPassword/")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string();

    // the change is stamped one second back; it must land after the old token's iat
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let reset_uri = format!("/api/v1/users/resetPassword/{}", reset_token);
    let new_password = json!({ "password": "newpass123", "passwordConfirm": "newpass123" });
    let (status, _) = app
        .call("PATCH", &reset_uri, None, Some(new_password.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call("PATCH", &reset_uri, None, Some(new_password))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token is invalid or has expired");

    app.login("kate@example.com", "newpass123").await;

    let (status, body) = app
        .call("GET", "/api/v1/users/me", Some(old_token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "User recently changed password! Please log in again."
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_deleted_account_cannot_log_in(pool: PgPool) {
    let app = setup(pool);
    let token = app
        .create_user("Cristian Vega", "chris@example.com", Role::User)
        .await;

    let (status, _) = app
        .call("DELETE", "/api/v1/users/deleteMe", Some(token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "chris@example.com", "password": "test1234" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_checkout_webhook_books_once(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;
    app.create_user("Laura Wilson", "laura@example.com", Role::User)
        .await;
    let tour = app.create_tour(&admin, "The Snow Adventurer", 997.0).await;

    let payload = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_integration",
            "client_reference_id": tour["id"],
            "customer_email": "laura@example.com",
            "amount_total": 99700
        }}
    })
    .to_string();

    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let signature = format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    );

    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook-checkout")
            .header("stripe-signature", &signature)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.clone()))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let (_, body) = app
        .call("GET", "/api/v1/bookings", Some(admin.as_str()), None)
        .await;
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["data"][0]["price"], 997.0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_second_page_of_five(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;

    for n in 1..=12 {
        app.create_tour(&admin, &format!("Tour Number {:02}", n), 100.0 + n as f64)
            .await;
    }

    let (_, body) = app
        .call("GET", "/api/v1/tours?sort=price&page=2&limit=5", None, None)
        .await;
    let names: Vec<&str> = body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tour| tour["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "Tour Number 06",
            "Tour Number 07",
            "Tour Number 08",
            "Tour Number 09",
            "Tour Number 10"
        ]
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_equality_and_range_filters_combine(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;

    for (name, difficulty, duration) in [
        ("The Forest Hiker", "easy", 5),
        ("The City Wanderer", "easy", 9),
        ("The Quick Stroller", "easy", 2),
        ("The Sea Explorer", "medium", 7),
    ] {
        app.create_tour_with(
            &admin,
            json!({ "name": name, "difficulty": difficulty, "duration": duration }),
        )
        .await;
    }

    let (status, body) = app
        .call(
            "GET",
            "/api/v1/tours?difficulty=easy&duration%5Bgte%5D=5&sort=duration",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
    assert_eq!(body["data"]["data"][0]["name"], "The Forest Hiker");
    assert_eq!(body["data"]["data"][1]["name"], "The City Wanderer");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_removing_last_review_resets_rating(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;
    let laura = app
        .create_user("Laura Wilson", "laura@example.com", Role::User)
        .await;
    let tour = app.create_tour(&admin, "The Northern Lights", 1997.0).await;
    let tour_id = tour["id"].as_str().unwrap();

    let (_, body) = app
        .call(
            "POST",
            &format!("/api/v1/tours/{}/reviews", tour_id),
            Some(laura.as_str()),
            Some(json!({ "review": "Cold but worth it", "rating": 3 })),
        )
        .await;
    let review_id = body["data"]["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/v1/reviews/{}", review_id),
            Some(admin.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .call("GET", &format!("/api/v1/tours/{}", tour_id), None, None)
        .await;
    assert_eq!(body["data"]["data"]["ratingsQuantity"], 0);
    assert_eq!(body["data"]["data"]["ratingsAverage"], 4.5);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_expired_reset_token_changes_nothing(pool: PgPool) {
    let app = setup(pool.clone());
    app.create_user("Miyah Myles", "miyah@example.com", Role::Guide)
        .await;

    app.call(
        "POST",
        "/api/v1/users/forgotPassword",
        None,
        Some(json!({ "email": "miyah@example.com" })),
    )
    .await;
    let sent = app.mailer.sent().await;
    let reset_token = sent
        .last()
        .and_then(|email| email.text.split("resetPassword/").nth(1))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string();

    sqlx::query("UPDATE users SET password_reset_expires = NOW() - INTERVAL '1 minute'")
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = app
        .call(
            "PATCH",
            &format!("/api/v1/users/resetPassword/{}", reset_token),
            None,
            Some(json!({ "password": "newpass123", "passwordConfirm": "newpass123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Token is invalid or has expired");

    app.login("miyah@example.com", "test1234").await;
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_created_tour_and_review_read_back_unchanged(pool: PgPool) {
    let app = setup(pool);
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;
    let guide = app
        .create_user("Steve Guide", "steve@example.com", Role::Guide)
        .await;
    let guide_id = app.user_id(&guide).await;
    let member = app
        .create_user("Sophie User", "sophie@example.com", Role::User)
        .await;
    let member_id = app.user_id(&member).await;

    let payload = json!({
        "name": "The Snow Adventurer",
        "duration": 4,
        "maxGroupSize": 10,
        "difficulty": "difficult",
        "ratingsAverage": 4.8,
        "ratingsQuantity": 0,
        "price": 997.5,
        "priceDiscount": 897.5,
        "summary": "Exciting adventure in the snow with snowboarding and skiing",
        "description": "Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua",
        "imageCover": "tour-3-cover.jpg",
        "images": ["tour-3-1.jpg", "tour-3-2.jpg", "tour-3-3.jpg"],
        "startDates": ["2027-01-05T10:00:00Z", "2027-02-12T10:00:00Z"],
        "startLocation": {
            "type": "Point",
            "coordinates": [-106.822318, 39.190872],
            "address": "419 S Mill St, Aspen, CO 81611, USA",
            "description": "Aspen, USA"
        },
        "locations": [{
            "type": "Point",
            "coordinates": [-106.855385, 39.182677],
            "description": "Aspen Highlands",
            "day": 1
        }],
        "guides": [guide_id]
    });

    let (status, created) = app
        .call("POST", "/api/v1/tours", Some(admin.as_str()), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let tour_id = created["data"]["data"]["id"].as_str().unwrap().to_string();

    let (status, fetched) = app
        .call("GET", &format!("/api/v1/tours/{}", tour_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let tour = &fetched["data"]["data"];

    for field in [
        "name",
        "duration",
        "maxGroupSize",
        "difficulty",
        "ratingsAverage",
        "ratingsQuantity",
        "price",
        "priceDiscount",
        "summary",
        "description",
        "imageCover",
        "images",
        "startDates",
        "startLocation",
        "locations",
    ] {
        assert_eq!(tour[field], payload[field], "field {}", field);
    }
    let guides: Vec<&Value> = tour["guides"]
        .as_array()
        .unwrap()
        .iter()
        .map(|guide| &guide["id"])
        .collect();
    assert_eq!(guides, vec![&payload["guides"][0]]);
    assert_eq!(tour["secretTour"], false);
    assert_eq!(tour["slug"], "the-snow-adventurer");

    let (status, created) = app
        .call(
            "POST",
            &format!("/api/v1/tours/{}/reviews", tour_id),
            Some(member.as_str()),
            Some(json!({ "review": "Best trip of my life", "rating": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let review_id = created["data"]["data"]["id"].as_str().unwrap().to_string();

    let (status, fetched) = app
        .call(
            "GET",
            &format!("/api/v1/reviews/{}", review_id),
            Some(member.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let review = &fetched["data"]["data"];
    assert_eq!(review["review"], "Best trip of my life");
    assert_eq!(review["rating"], 5);
    assert_eq!(review["tour"], tour_id.as_str());
    assert_eq!(review["user"]["id"], member_id.as_str());
    assert_eq!(review["user"]["name"], "Sophie User");
}

fn png() -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(8, 8)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_images_for_unknown_tour_are_not_stored(pool: PgPool) {
    let public_dir = std::env::temp_dir().join(format!("natours-{}", uuid::Uuid::new_v4()));
    let app = setup_with(
        pool,
        AppConfig {
            public_dir: public_dir.to_string_lossy().into_owned(),
            ..test_config()
        },
    );
    let admin = app
        .create_user("Jonas Admin", "admin@example.com", Role::Admin)
        .await;

    let boundary = "tour-images";
    let image = png();
    let mut body = Vec::new();
    for (field, filename) in [("imageCover", "cover.png"), ("images", "one.png")] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&image);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/api/v1/tours/{}", uuid::Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!public_dir.join("img/tours").exists());
}
