//! # FamilyCircles
//!
//! A small JSON read API over a genealogy host: a capability descriptor,
//! record lookup by xref, and free-text search, each projected into a fixed
//! JSON shape for client-side family-circle views.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────────┐
//! │   HTTP   │──▶│   Handlers   │──▶│        Host        │
//! │  (axum)  │   │ Record/Search│   │ RecordSource       │
//! └──────────┘   └──────────────┘   │ SearchService      │
//!       ▲               ▲           │ AccessPolicy       │
//!       │               │           └─────────┬──────────┘
//! ┌──────────┐          │                     ▼
//! │   CLI    │──────────┘            ┌────────────────┐
//! │  (fc)    │                       │ MemoryHost     │
//! └──────────┘                       │ (JSON snapshot)│
//!                                    └────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Host records and response shapes |
//! | [`traits`] | Collaborator traits and the [`traits::Host`] bundle |
//! | [`access`] | Restriction-based access policy |
//! | [`memory`] | In-memory host over a JSON snapshot |
//! | [`terms`] | Search-term extraction |
//! | [`request_url`] | Public URL of the current request |
//! | [`get`] | Record lookup and projection |
//! | [`search`] | Search and result labelling |
//! | [`server`] | HTTP server |
//! | [`error`] | Error type and JSON error bodies |

pub mod access;
pub mod config;
pub mod error;
pub mod get;
pub mod memory;
pub mod models;
pub mod request_url;
pub mod search;
pub mod server;
pub mod terms;
pub mod traits;
