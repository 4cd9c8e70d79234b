//! Organization-only chat service backed by Google Gemini.
//!
//! The server side lives in [`app`], [`handlers`], [`services`] and
//! [`repositories`]; [`client`] holds the typed API client and the
//! persisted client session used by the `chat` binary.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod jwt;
    pub mod password;
}

pub mod models {
    pub mod api;
    pub mod chat;
    pub mod user;
}

pub mod repositories {
    pub mod chat;
    pub mod memory;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod chat;
    pub mod gemini;
    pub mod identity;
}

pub mod handlers {
    pub mod auth;
    pub mod chat;
    pub mod response;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}

pub mod client {
    pub mod api;
    pub mod session;
}
