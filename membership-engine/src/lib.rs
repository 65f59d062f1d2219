//! Membership stores and workflow state machine for Taskboard Engine
//!
//! This crate owns the two resource trees of the collaboration model and
//! the rules for mutating their membership rows:
//!
//! - **Project**: one immutable owner, membership rows with
//!   `leader`/`editor`/`viewer` roles, at most one explicit leader row.
//! - **Group**: one authoritative leader field, membership rows with
//!   `leader`/`member` roles and an invitation status machine
//!   (`pending_invite`/`pending_approval` -> `accepted`/`rejected`).
//!
//! Storage is behind `ProjectRepository`/`GroupRepository` traits with
//! in-memory implementations for tests and development; the identity store
//! is external and only read through `UserDirectory`. Role resolution and
//! permission checks live in the `auth-roles` crate on top of this one.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use membership_engine::{
//!     GroupService, InMemoryGroupRepository, InMemoryUserDirectory, RandomCodeSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let groups = Arc::new(InMemoryGroupRepository::new());
//!     let users = Arc::new(InMemoryUserDirectory::new());
//!     let service = GroupService::new(groups, users.clone(), Arc::new(RandomCodeSource));
//!
//!     let leader = users.add_user("lea@example.com");
//!     let group = service.create("alpha", None, leader).await?;
//!
//!     let joiner = users.add_user("jo@example.com");
//!     service.join_by_code(joiner, &group.invite_code).await?;
//!     service.approve_join_request(group.id, joiner, leader).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod group_service;
pub mod invite_code;
pub mod models;
pub mod project_service;
pub mod repository;

pub use error::*;
pub use group_service::*;
pub use invite_code::*;
pub use models::*;
pub use project_service::*;
pub use repository::*;
