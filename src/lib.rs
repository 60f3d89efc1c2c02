//! # Mirror Relay
//!
//! Fetches a newline-delimited list of images from a server, mirrors every
//! image left-to-right, and posts each result back, many items at a time.
//!
//! # Architecture: Three Stages per Item
//!
//! ```text
//! 1. Fetch    GET  base_url + id  →  raw bytes        (exactly 200 = success)
//! 2. Mirror   raw bytes           →  flipped pixels   (rayon pool)
//! 3. Upload   POST base_url       ←  flipped bytes    (any 2xx = success)
//! ```
//!
//! Stages hand buffers on by value, so a payload is owned by exactly one unit
//! of work at a time. A failure at any stage is counted and ends that item's
//! run without touching its siblings. Only a failed listing aborts the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`listing`] | Fetches and parses the identifier list |
//! | [`transport`] | HTTP seam: [`transport::Transport`] trait + `reqwest` implementation |
//! | [`fetch`] | Stage 1 — permit-bounded download of one item |
//! | [`imaging`] | Stage 2 — decode, mirror, re-encode |
//! | [`upload`] | Stage 3 — permit-bounded post of one item |
//! | [`pipeline`] | Orchestrator: fused and staged topologies, work queue, limits |
//! | [`status`] | Per-run outcome counters and the final report |
//! | [`config`] | Run configuration and validation |
//! | [`output`] | Progress and report formatting |
//! | [`types`] | Identifiers and payloads shared between stages |
//!
//! # Design Decisions
//!
//! ## Two Topologies, One Entry Point
//!
//! [`pipeline::Topology::Fused`] runs each item end to end in one task, so the
//! first upload can start while most fetches are still pending.
//! [`pipeline::Topology::Staged`] finishes every fetch before the first upload,
//! joined by a [`pipeline::WorkQueue`]. Fused is the default; both are reached
//! through [`pipeline::Pipeline::run`].
//!
//! ## Permits Around Network Calls Only
//!
//! A tokio semaphore permit is taken immediately before each GET or POST and
//! dropped as soon as the call completes. The mirror step never holds one, so
//! a slow decode cannot starve the network stages.
//!
//! ## Decode Failures Are Counted
//!
//! Bytes that fetched fine but do not decode as an image are counted as
//! `decode_failure`. Every fetched item therefore ends in exactly one of
//! decode failure, upload success, or upload failure.
//!
//! ## No Globals
//!
//! Counters, permit pools, and the queue are created per run and passed by
//! `Arc`. Two pipelines in one process never share state.

pub mod config;
pub mod fetch;
pub mod imaging;
pub mod listing;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod transport;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
