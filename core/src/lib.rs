//! Access-control and session-resolution core for the atas minutes manager.
//!
//! A user can belong to several organizational units, each membership carrying
//! its own role and permission set. This crate resolves the current session
//! into a [`domain::SessionPrincipal`], enforces membership uniqueness,
//! answers authorization questions, and performs cascading deletions. All of
//! it runs against either the hosted directory or a local fallback store,
//! selected once at startup.
//!
//! Presentation concerns (forms, layouts, minutes rendering, the hymn catalog
//! content) live outside this crate and consume it through the `domain`
//! services and the [`domain::gate`] predicates.

pub mod config;
pub mod domain;
pub mod outbound;
