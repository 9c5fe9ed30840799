use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    llm::ChatMessage,
    matcher::Restrictions,
    profiles::repo::DietaryProfile,
    settings::resolve_model,
    state::AppState,
};

pub const MAX_HISTORY: usize = 20;
pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

fn system_prompt(restrictions: Restrictions<'_>) -> String {
    let mut prompt = String::from(
        "You are the assistant of \"Can I Eat This?\", an app that checks food against a \
         user's dietary restrictions. Answer questions about food, ingredients, allergens \
         and diets briefly and practically. You are not a doctor; suggest consulting one \
         for medical decisions.",
    );
    if restrictions.is_empty() {
        prompt.push_str("\nThe user has not recorded any dietary restrictions.");
    } else {
        let join = |v: &[String]| if v.is_empty() { "none".to_string() } else { v.join(", ") };
        prompt.push_str(&format!(
            "\nThe user's allergies: {}. Dietary preferences: {}. Health restrictions: {}.",
            join(restrictions.allergies),
            join(restrictions.dietary_preferences),
            join(restrictions.health_restrictions),
        ));
    }
    prompt
}

/// System prompt, the most recent user/assistant turns, then the new message.
pub fn build_messages(
    restrictions: Restrictions<'_>,
    history: &[HistoryTurn],
    message: &str,
) -> Vec<ChatMessage> {
    let turns: Vec<&HistoryTurn> = history
        .iter()
        .filter(|t| (t.role == "user" || t.role == "assistant") && !t.content.trim().is_empty())
        .collect();
    let skip = turns.len().saturating_sub(MAX_HISTORY);

    let mut messages = Vec::with_capacity(turns.len() - skip + 2);
    messages.push(ChatMessage::system(system_prompt(restrictions)));
    for t in turns.into_iter().skip(skip) {
        messages.push(if t.role == "user" {
            ChatMessage::user(t.content.clone())
        } else {
            ChatMessage::assistant(t.content.clone())
        });
    }
    messages.push(ChatMessage::user(message));
    messages
}

#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message is required".into()));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::BadRequest("message too long".into()));
    }

    let profile = DietaryProfile::find_by_user(&state.db, user_id).await?;
    let restrictions = profile.as_ref().map(|p| p.restrictions()).unwrap_or_default();
    let messages = build_messages(restrictions, &payload.history, message);

    let model = resolve_model(&state, user_id).await;
    let reply = state.llm.complete(&model, &messages).await.map_err(|e| {
        error!(error = %e, %user_id, "chat completion failed");
        AppError::Upstream("The assistant is unavailable right now".into())
    })?;

    info!(%user_id, %model, turns = messages.len(), "chat reply");
    Ok(Json(ChatResponse { reply, model }))
}
