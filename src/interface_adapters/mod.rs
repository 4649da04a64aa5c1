// Interface adapters: concrete ports, wire protocol and network handling.

pub mod canvas;
pub mod clients;
pub mod handlers;
pub mod http;
pub mod navigator;
pub mod net;
pub mod protocol;
pub mod routes;
pub mod scorer;
pub mod state;
pub mod store;
