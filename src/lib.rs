//! BMS Billing - Payment Webhook Ingestion and Subscription Reconciliation
//!
//! This crate receives webhooks from payment providers (Stripe, Lemon
//! Squeezy, Ko-fi), verifies and normalizes them, and reconciles them into
//! per-user subscriptions and an idempotent billing event history.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
