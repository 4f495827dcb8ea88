//!
//! # etcd member controller
//!
//! Grows the voting membership of an etcd cluster by promoting one ready pod
//! at a time. The pod view comes from a [`pod::PodObserver`], the membership
//! view from a [`member::MemberClient`]; [`controller::Reconciler`] joins the
//! two on every sync.
//!

pub mod cli;
pub mod config;
pub mod controller;
pub mod member;
pub mod pod;

mod error;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use controller::{Reconciler, SyncContext, SyncOutcome};
pub use error::{ConfigError, MemberClientError, ObserveError, ReconcileError};
