//! Voice Command Gateway - grammar-constrained speech commands over WebSocket
//!
//! This library provides the core functionality for the gateway:
//! - A closed command vocabulary shared by every recognizer
//! - One decode session per client connection, isolated from the others
//! - A WebSocket server that turns streamed PCM audio into command events
//! - An offline sweep that measures command accuracy under background noise
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Clients (game, quiz, eval sweep)            │
//! └────────────────────┬────────────────────────────────┘
//!                      │ PCM16 frames
//! ┌────────────────────▼────────────────────────────────┐
//! │                Session Manager                       │
//! │   Decode Session  │  Decode Session  │  ...          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Recognizer Engine (grammar-constrained)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod grammar;
pub mod session;

pub use config::Config;
pub use engine::{EngineError, EngineFactory, RecognizerEngine};
pub use error::{Error, Result, SessionError, SessionErrorKind};
pub use eval::{SweepDriver, SweepResult};
pub use grammar::CommandGrammar;
pub use session::{CommandEvent, CommandMessage, ConnectionId, DecodeSession, SessionManager};
