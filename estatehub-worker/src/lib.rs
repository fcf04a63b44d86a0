//! # EstateHub Worker Library
//!
//! Drains the `email_jobs` queue filled by the API: claims pending jobs,
//! renders the message for each and hands it to a mail backend.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `dispatcher`: the poll loop and per-job delivery
//! - `mailer`: mail backends (console, HTTP relay)
//! - `queue`: job claiming and state updates
//! - `templates`: subject and body for each job kind
//!
//! ## Example
//!
//! ```no_run
//! use estatehub_worker::mailer::{console::ConsoleMailer, Mailer};
//!
//! let mailer = ConsoleMailer::new();
//! println!("Mail backend: {}", mailer.name());
//! ```

pub mod config;
pub mod dispatcher;
pub mod mailer;
pub mod queue;
pub mod templates;
