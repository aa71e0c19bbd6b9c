//! Voice chat over a WebSocket
//!
//! Clients stream raw audio as binary frames and control the turn with JSON
//! text frames. Each finished utterance produces `audio_segment` events and a
//! closing `conclution` event.

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use voice_companion_data::models::User;
use voice_companion_domain::auth::{authenticate_token, AuthRejection, UserLookup};
use voice_companion_domain::services::{Services, Utterance, VoiceEvent, VoicePipelineError};

/// Close code sent when the connection cannot be authenticated
pub const AUTH_FAILED_CLOSE_CODE: u16 = 4001;
/// Close code sent when no session could be opened
const SESSION_FAILED_CLOSE_CODE: u16 = 1011;
/// Events buffered between the pipeline and the socket
const EVENT_BUFFER: usize = 16;

#[derive(Debug, Deserialize)]
pub struct VoiceChatQuery {
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrentPage {
    pub route: Option<String>,
}

/// JSON control frame sent by the client
#[derive(Debug, Default, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub voice_style: Option<String>,
    #[serde(default)]
    pub end_of_utterance: bool,
    #[serde(default)]
    pub ignore_flag: bool,
    pub current_page: Option<CurrentPage>,
}

/// What a control frame asks for
#[derive(Debug, PartialEq)]
pub enum ClientAction {
    SetVoiceStyle(Option<String>),
    Discard,
    Process { current_route: Option<String> },
    Nothing,
}

impl ClientMessage {
    pub fn action(self) -> ClientAction {
        if self.kind.as_deref() == Some("voice_style") {
            return ClientAction::SetVoiceStyle(self.voice_style);
        }
        if !self.end_of_utterance {
            return ClientAction::Nothing;
        }
        if self.ignore_flag {
            return ClientAction::Discard;
        }
        ClientAction::Process {
            current_route: self.current_page.and_then(|page| page.route),
        }
    }
}

/// Upgrade to a voice chat socket authenticated by `?token=`
#[instrument(skip(services, ws, query))]
pub async fn voice_chat(
    State(services): State<Services>,
    Query(query): Query<VoiceChatQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, services, query.token))
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame { code, reason: Cow::Borrowed(reason) };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {}", e);
    }
}

async fn authenticate(token: Option<&str>, users: &UserLookup) -> Result<User, AuthRejection> {
    let token = token.filter(|t| !t.is_empty()).ok_or(AuthRejection::MissingToken)?;
    let (_, user) = authenticate_token(token, users).await?;
    Ok(user)
}

async fn handle_socket(socket: WebSocket, services: Services, token: Option<String>) {
    let users: UserLookup = services.user_repository.clone();
    let user = match authenticate(token.as_deref(), &users).await {
        Ok(user) => user,
        Err(rejection) => {
            warn!("Voice chat authentication failed: {}", rejection.message());
            close_with(socket, AUTH_FAILED_CLOSE_CODE, rejection.message()).await;
            return;
        }
    };

    let session_id = match services.sessions.create_session(user.id, None).await {
        Ok(id) => id,
        Err(e) => {
            error!(user_id = user.id, "Failed to open voice chat session: {}", e);
            close_with(socket, SESSION_FAILED_CLOSE_CODE, "会话创建失败").await;
            return;
        }
    };
    info!(user_id = user.id, username = %user.username, %session_id, "Voice chat connected");

    run_conversation(socket, &services, &user, &session_id).await;

    if let Err(e) = services.sessions.close_session(&session_id).await {
        error!(%session_id, "Failed to close voice chat session: {}", e);
    }
    info!(user_id = user.id, %session_id, "Voice chat ended");
}

async fn run_conversation(mut socket: WebSocket, services: &Services, user: &User, session_id: &str) {
    let mut audio: Vec<u8> = Vec::new();
    let mut voice_style: Option<String> = None;

    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                debug!(user_id = user.id, "Voice chat receive error: {}", e);
                break;
            }
        };

        match message {
            Message::Binary(chunk) => {
                debug!(user_id = user.id, bytes = chunk.len(), "Audio chunk");
                audio.extend_from_slice(&chunk);
            }
            Message::Text(text) => {
                let control: ClientMessage = match serde_json::from_str(&text) {
                    Ok(control) => control,
                    Err(_) => {
                        debug!(user_id = user.id, "Ignoring invalid JSON frame");
                        continue;
                    }
                };
                match control.action() {
                    ClientAction::SetVoiceStyle(style) => {
                        info!(user_id = user.id, voice_style = ?style, "Voice style selected");
                        voice_style = style;
                    }
                    ClientAction::Discard => {
                        debug!(user_id = user.id, bytes = audio.len(), "Discarding ignored utterance");
                        audio.clear();
                    }
                    ClientAction::Process { current_route } => {
                        let utterance = Utterance {
                            user_id: user.id,
                            username: user.username.clone(),
                            session_id: session_id.to_string(),
                            audio: std::mem::take(&mut audio),
                            voice_style: voice_style.clone(),
                            current_route,
                        };
                        if !process_utterance(&mut socket, services, utterance).await {
                            break;
                        }
                    }
                    ClientAction::Nothing => {}
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Run one turn, forwarding its events; false once the client is gone
async fn process_utterance(socket: &mut WebSocket, services: &Services, utterance: Utterance) -> bool {
    let (tx, mut rx) = mpsc::channel::<VoiceEvent>(EVENT_BUFFER);
    let pipeline = services.pipeline.clone();
    let user_id = utterance.user_id;

    let produce = async move {
        let result = pipeline.process(utterance, &tx).await;
        drop(tx);
        result
    };

    let forward = async {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to encode voice event: {}", e);
                    continue;
                }
            };
            if socket.send(Message::Text(payload)).await.is_err() {
                return false;
            }
        }
        true
    };

    let (result, connected) = tokio::join!(produce, forward);
    match result {
        Ok(()) => connected,
        Err(VoicePipelineError::Disconnected) => false,
        Err(e) => {
            error!(user_id, "Voice turn failed: {}", e);
            connected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ClientAction {
        serde_json::from_str::<ClientMessage>(text).unwrap().action()
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(
            parse(r#"{"type":"voice_style","voice_style":"yunxi"}"#),
            ClientAction::SetVoiceStyle(Some("yunxi".to_string()))
        );
        assert_eq!(parse(r#"{"end_of_utterance":true,"ignore_flag":true}"#), ClientAction::Discard);
        assert_eq!(
            parse(r#"{"end_of_utterance":true,"current_page":{"route":"/health"}}"#),
            ClientAction::Process { current_route: Some("/health".to_string()) }
        );
        assert_eq!(parse(r#"{"end_of_utterance":true}"#), ClientAction::Process { current_route: None });
        assert_eq!(parse(r#"{"hello":"world"}"#), ClientAction::Nothing);
    }

    #[test]
    fn test_non_boolean_flags_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"end_of_utterance":"yes"}"#).is_err());
    }
}
