use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, ProfileResponse, ProfileUser, RefreshRequest, RegisterForm,
            RegisterResponse, TokenPairResponse,
        },
        jwt::{refresh_digest, AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::{RefreshToken, User},
    },
    error::{ApiError, FieldErrors},
    state::AppState,
    storage::{image_extension, random_image_name, ImageUpload},
    validate::required_text,
};

const UPLOAD_LIMIT_BYTES: usize = 5 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/login", post(login))
        .route("/token", post(refresh))
        .route("/profile", get(profile))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let mut form = RegisterForm::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("username") => form.username = field.text().await.ok(),
            Some("email") => form.email = field.text().await.ok(),
            Some("password") => form.password = field.text().await.ok(),
            Some("avatar") => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| anyhow::anyhow!("read avatar upload: {e}"))?;
                if let (Some(filename), Some(content_type)) =
                    (filename.filter(|f| !f.is_empty()), content_type)
                {
                    form.avatar = Some(ImageUpload {
                        filename,
                        content_type,
                        body,
                    });
                }
            }
            _ => {}
        }
    }

    let mut fields = FieldErrors::new();
    let username = required_text(&mut fields, "username", "Username", form.username.as_deref());
    let email = required_text(&mut fields, "email", "Email", form.email.as_deref())
        .map(|e| e.to_lowercase());
    let password = required_text(&mut fields, "password", "Password", form.password.as_deref());
    if let Some(email) = &email {
        if !is_valid_email(email) {
            fields.push("email", "Valid email is required");
        }
    }
    let avatar_ext = match &form.avatar {
        Some(upload) => {
            let ext = image_extension(Some(&upload.filename), Some(&upload.content_type));
            if ext.is_none() {
                fields.push("avatar", "Avatar must be a jpeg, jpg, png or gif image");
            }
            ext
        }
        None => None,
    };
    fields.into_result()?;
    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "validated register fields missing"
        )));
    };

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let avatar_url = match (form.avatar, avatar_ext) {
        (Some(upload), Some(ext)) => {
            let stored = random_image_name(&ext);
            state.uploads.save(&stored, upload.body).await?;
            Some(state.uploads.public_url(&stored))
        }
        _ => None,
    };

    let hash = hash_password(&password)?;
    let user = User::create(&state.db, &username, &email, &hash, avatar_url.as_deref()).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;
    RefreshToken::insert(&state.db, user.id, &refresh_digest(&refresh_token)).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            access_token,
            refresh_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let mut fields = FieldErrors::new();
    let email = required_text(&mut fields, "email", "Email", payload.email.as_deref())
        .map(|e| e.to_lowercase());
    let password = required_text(&mut fields, "password", "Password", payload.password.as_deref());
    fields.into_result()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::Internal(anyhow::anyhow!(
            "validated login fields missing"
        )));
    };

    // Unknown email and wrong password are indistinguishable on purpose.
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthenticated("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;
    RefreshToken::insert(&state.db, user.id, &refresh_digest(&refresh_token)).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let Some(presented) = payload.refresh_token.filter(|t| !t.trim().is_empty()) else {
        return Err(ApiError::unauthenticated("Refresh token is required"));
    };

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&presented)
        .map_err(|_| ApiError::unauthenticated("Invalid or expired refresh token"))?;

    let Some(user) = User::find_by_email(&state.db, &claims.email).await? else {
        warn!(email = %claims.email, "refresh for unknown user");
        return Err(ApiError::unauthenticated("Invalid or expired refresh token"));
    };

    // Rotation: the presented token must still be active, and consuming it is
    // a single conditional delete so a token can never be redeemed twice.
    if !RefreshToken::consume(&state.db, user.id, &refresh_digest(&presented)).await? {
        warn!(user_id = %user.id, "refresh token already consumed or unknown");
        return Err(ApiError::unauthenticated("Invalid or expired refresh token"));
    }

    let access_token = keys.sign_access(user.id, &user.email)?;
    let refresh_token = keys.sign_refresh(user.id, &user.email)?;
    RefreshToken::insert(&state.db, user.id, &refresh_digest(&refresh_token)).await?;

    info!(user_id = %user.id, "refresh token rotated");
    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Some(user) = User::find_by_id(&state.db, user_id).await? else {
        warn!(user_id = %user_id, "profile for deleted user");
        return Err(ApiError::unauthenticated("User not found"));
    };
    let refresh_tokens = RefreshToken::list_for_user(&state.db, user_id).await?;

    Ok(Json(ProfileResponse {
        user: ProfileUser {
            user,
            refresh_tokens,
        },
    }))
}
