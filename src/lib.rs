//! CompTIA study bot backend.
//!
//! - Adaptive timed quizzes with live countdowns (`quiz`)
//! - Per-topic performance tracking and achievements (`store`, `tracker`, `achievements`)
//! - Optional OpenAI-backed question, flashcard and explanation generation (`openai`)
//! - Axum WebSocket gateway and read-only HTTP API (`routes`)

pub mod achievements;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod flashcards;
pub mod openai;
pub mod pomodoro;
pub mod ports;
pub mod protocol;
pub mod quiz;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod toolkit;
pub mod tracker;
pub mod util;
pub mod view;
