//! Shared domain types and wire contracts for the relaymon pipeline.
//!
//! Both the agent and the server depend on this crate: the agent builds
//! [`dto::MetricDto`] batches for transport, the server validates them back
//! into [`types::Metric`] domain records before touching storage.

pub mod dto;
pub mod sign;
pub mod types;

pub mod proto {
    #![allow(clippy::pedantic)]
    #![allow(clippy::doc_markdown)]
    #![allow(clippy::default_trait_access)]
    tonic::include_proto!("relaymon");
}
