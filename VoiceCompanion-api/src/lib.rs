// VoiceCompanion-api lib.rs
//
// HTTP and WebSocket surface of the voice companion: router, handlers,
// response entities and the OpenAPI document.

// Public modules
pub mod api;
pub mod entities;
pub mod openapi;
