//! # askdesk
//!
//! A small knowledge-assistant service for Slack slash commands.
//!
//! askdesk answers `/ask-it` queries from a cache of local documents: it ranks
//! every cached document by keyword overlap with the query, hands the top
//! matches to an answer generator, and replies with a Block Kit message. Each
//! caller identity is admission-controlled by a token bucket whose state lives
//! either in process memory or in a shared SQLite store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │ /ask-it  │──▶│   Rate    │──▶│ Retriever │──▶│  Answer  │
//! │ (Slack)  │   │  Limiter  │   │ + Scorer  │   │   (mock) │
//! └──────────┘   └─────┬─────┘   └─────┬─────┘   └────┬─────┘
//!                      │               │              │
//!                ┌─────▼─────┐   ┌─────▼─────┐   ┌────▼─────┐
//!                │  Buckets  │   │ Doc cache │   │ Block Kit │
//!                │ mem/SQLite│   │ (lazy fs) │   │  message  │
//!                └───────────┘   └───────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askdesk serve                       # start the HTTP service
//! askdesk search "reset okta mfa"     # rank cached documents from the CLI
//! askdesk docs                        # list what the cache would load
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`docstore`] | In-memory document cache with lazy load and atomic reload |
//! | [`score`] | Keyword relevance scoring |
//! | [`retriever`] | Top-k ranking and context payload assembly |
//! | [`limiter`] | Per-identity token-bucket admission control |
//! | [`verify`] | Slack request signature verification |
//! | [`answer`] | Answer generation seam |
//! | [`message`] | Slack Block Kit reply formatting |
//! | [`metrics`] | Usage counters and latency histogram |
//! | [`server`] | HTTP service surface |

pub mod answer;
pub mod config;
pub mod docstore;
pub mod limiter;
pub mod message;
pub mod metrics;
pub mod retriever;
pub mod score;
pub mod server;
pub mod verify;
