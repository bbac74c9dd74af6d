//! Paper map client: fetches reading history and recommendations laid out
//! by t-SNE, builds a directed graph model from them and keeps exactly one
//! renderer alive for it.

pub mod api;
pub mod graph_utils;
pub mod gui;
pub mod persistence;
pub mod render;
pub mod upload;
