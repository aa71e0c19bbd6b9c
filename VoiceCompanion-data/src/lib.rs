// VoiceCompanion Data
// Persistence and spreadsheet-backed configuration for the voice assistant

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;

// Spreadsheet configuration tables with hot reload
pub mod config_tables;
