use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Claims carried by issued access tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub username: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub secret: String,
    /// Lifetime of issued tokens in seconds. Negative values issue tokens
    /// that are already expired.
    pub token_ttl_secs: i64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            secret: "secret".to_string(),
            token_ttl_secs: 3600,
        }
    }
}

struct Account {
    username: String,
    email: String,
    password: String,
}

struct StoredTodo {
    owner: String,
    todo: Todo,
}

#[derive(Default)]
struct Db {
    accounts: HashMap<String, Account>,
    todos: BTreeMap<i64, StoredTodo>,
    next_id: i64,
}

#[derive(Clone)]
pub struct AppState {
    db: Arc<RwLock<Db>>,
    config: Arc<MockConfig>,
}

/// A failure body in the service's `{success: false, error}` envelope.
pub struct ApiFailure {
    status: StatusCode,
    error: Value,
}

impl ApiFailure {
    fn new(status: StatusCode, error: impl Into<Value>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found.")
    }

    fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    fn bad_body(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "error": self.error }))).into_response()
    }
}

/// Username of the bearer, taken from a valid `Authorization` header.
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiFailure::unauthorized("Authentication credentials were not provided."))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiFailure::unauthorized("Authentication credentials were not provided."))?;
        let claims = validate_token(&state.config, token)
            .map_err(|_| ApiFailure::unauthorized("Given token not valid for any token type"))?;
        Ok(AuthUser(claims.username))
    }
}

pub fn issue_token(config: &MockConfig, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        username: username.to_string(),
        exp: now + config.token_ttl_secs,
        iat: now,
        jti: Uuid::new_v4(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

pub fn validate_token(config: &MockConfig, token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

pub fn app() -> Router {
    app_with_config(MockConfig::default())
}

pub fn app_with_config(config: MockConfig) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Db::default())),
        config: Arc::new(config),
    };
    Router::new()
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .route("/api/v1/todos/", get(list_todos).post(create_todo))
        .route(
            "/api/v1/todos/{id}/",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_config(listener, MockConfig::default()).await
}

pub async fn run_with_config(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_config(config)).await
}

fn valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let len = name.chars().count();
    first_ok && (3..=30).contains(&len) && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn valid_email(email: &str) -> bool {
    let word = |c: char| c.is_alphanumeric() || c == '_';
    let part = |s: &str| !s.is_empty() && s.chars().all(|c| word(c) || c == '.' || c == '-');
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    part(local) && part(host) && !tld.is_empty() && tld.chars().all(word)
}

async fn register(
    State(state): State<AppState>,
    input: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiFailure> {
    let Json(input) = input.map_err(ApiFailure::bad_body)?;
    let mut db = state.db.write().await;

    let mut errors: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    if input.username.is_empty() {
        errors.entry("username").or_default().push("This field may not be blank.".into());
    } else if !valid_username(&input.username) {
        errors.entry("username").or_default().push(
            "Username must be 3–30 characters, start with a letter or underscore, \
             and use only letters, numbers, or underscores."
                .into(),
        );
    } else if db.accounts.contains_key(&input.username.to_lowercase()) {
        errors
            .entry("username")
            .or_default()
            .push("A user with that username already exists.".into());
    }

    if input.email.is_empty() {
        errors.entry("email").or_default().push("This field may not be blank.".into());
    } else if !valid_email(&input.email) {
        errors.entry("email").or_default().push("Invalid email entered.".into());
    } else if db.accounts.values().any(|a| a.email == input.email) {
        errors.entry("email").or_default().push("This email is already in use.".into());
    }

    for (field, value) in [("password1", &input.password1), ("password2", &input.password2)] {
        if value.chars().count() < 8 {
            errors
                .entry(field)
                .or_default()
                .push("Ensure this field has at least 8 characters.".into());
        }
    }

    if !errors.is_empty() {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, json!(errors)));
    }
    if input.password1 != input.password2 {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            json!({ "password": "Passwords do not match." }),
        ));
    }

    tracing::info!(username = %input.username, "account registered");
    db.accounts.insert(
        input.username.to_lowercase(),
        Account {
            username: input.username,
            email: input.email,
            password: input.password1,
        },
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Account created successfully." })),
    ))
}

async fn login(
    State(state): State<AppState>,
    input: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Json(input) = input.map_err(ApiFailure::bad_body)?;
    if !valid_username(&input.username) {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            json!({ "username": "Username must start with a letter or underscore, \
                    and be 3–30 characters long, using only letters, numbers, or underscores." }),
        ));
    }

    let db = state.db.read().await;
    let account = db
        .accounts
        .get(&input.username.to_lowercase())
        .ok_or_else(|| {
            ApiFailure::new(
                StatusCode::BAD_REQUEST,
                json!({ "username": "This username is not registered." }),
            )
        })?;
    if account.password != input.password {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            json!({ "password": "Password is incorrect." }),
        ));
    }

    let token = issue_token(&state.config, &account.username)
        .map_err(|_| ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"))?;
    Ok(Json(json!({ "success": true, "token": token })))
}

async fn list_todos(State(state): State<AppState>, AuthUser(user): AuthUser) -> Json<Vec<Todo>> {
    let db = state.db.read().await;
    Json(
        db.todos
            .values()
            .filter(|stored| stored.owner == user)
            .map(|stored| stored.todo.clone())
            .collect(),
    )
}

async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    input: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiFailure> {
    let Json(input) = input.map_err(ApiFailure::bad_body)?;
    if input.title.trim().is_empty() {
        return Err(ApiFailure::new(
            StatusCode::BAD_REQUEST,
            json!({ "title": ["This field may not be blank."] }),
        ));
    }

    let mut db = state.db.write().await;
    db.next_id += 1;
    let todo = Todo {
        id: db.next_id,
        title: input.title,
        completed: input.completed,
    };
    db.todos.insert(
        todo.id,
        StoredTodo {
            owner: user,
            todo: todo.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Todo>, ApiFailure> {
    let db = state.db.read().await;
    db.todos
        .get(&id)
        .filter(|stored| stored.owner == user)
        .map(|stored| Json(stored.todo.clone()))
        .ok_or_else(ApiFailure::not_found)
}

async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    input: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<Todo>, ApiFailure> {
    let Json(input) = input.map_err(ApiFailure::bad_body)?;
    let mut db = state.db.write().await;
    let stored = db
        .todos
        .get_mut(&id)
        .filter(|stored| stored.owner == user)
        .ok_or_else(ApiFailure::not_found)?;
    if let Some(title) = input.title {
        if title.trim().is_empty() {
            return Err(ApiFailure::new(
                StatusCode::BAD_REQUEST,
                json!({ "title": ["This field may not be blank."] }),
            ));
        }
        stored.todo.title = title;
    }
    if let Some(completed) = input.completed {
        stored.todo.completed = completed;
    }
    Ok(Json(stored.todo.clone()))
}

async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let mut db = state.db.write().await;
    let owned = db.todos.get(&id).is_some_and(|stored| stored.owner == user);
    if !owned {
        return Err(ApiFailure::not_found());
    }
    db.todos.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}
