//! # LINE document bot
//!
//! A webhook bridge that answers LINE chat messages from a small local
//! document set. At start-up every supported file in the document directory
//! is converted to plain text and folded into one system prompt; each
//! incoming text message is sent, together with that prompt, to an
//! OpenAI-compatible chat completion API and the answer is replied into the
//! same chat.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌────────────┐
//! │  ./data    │──▶│  Loader   │──▶│  Prompt    │──┐
//! │ txt/md/pdf │   │ (extract) │   │  Composer  │  │  Knowledge
//! │ docx/xlsx  │   └───────────┘   └────────────┘  │  snapshot
//! └────────────┘                                   ▼
//!   LINE ──POST /callback──▶ server ──▶ CompletionRelay ──▶ OpenAI
//!    ▲                          │
//!    └──────── reply ───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Documents, knowledge snapshot, chat messages |
//! | [`extract`] | Text extraction for text, DOCX, PDF, XLSX, XLS |
//! | [`loader`] | Document directory scan |
//! | [`prompt`] | System prompt assembly |
//! | [`completion`] | Completion provider and fallback relay |
//! | [`line`] | LINE signature check, webhook parsing, replies |
//! | [`state`] | Shared application state with atomic reload |
//! | [`server`] | Axum HTTP server |

pub mod completion;
pub mod config;
pub mod extract;
pub mod line;
pub mod loader;
pub mod models;
pub mod prompt;
pub mod server;
pub mod state;
